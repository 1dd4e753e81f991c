//! The host-facing bank abstraction.

use std::sync::Arc;

use crate::cache::SampleUseGuard;
use crate::error::Result;
use crate::gen::GEN_COUNT;
use crate::modulator::Modulator;
use crate::types::Sample;

/// Loader behavior knobs, passed to the format loaders at load time.
#[derive(Clone, Copy, Debug)]
pub struct LoaderSettings {
    /// Defer sample data until a preset using it is selected, and drop
    /// it again when the last selection goes away.
    pub dynamic_sample_loading: bool,
    /// Pin loaded sample blocks into physical memory.
    pub lock_memory: bool,
    /// Output sample rate of the host, in Hz. Conditional-load
    /// expressions in Format B banks can query it.
    pub sample_rate: u32,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        LoaderSettings {
            dynamic_sample_loading: false,
            lock_memory: false,
            sample_rate: 44100,
        }
    }
}

/// Identity of one preset in a bank's catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetHeader {
    pub bank: u32,
    pub program: u32,
    pub name: String,
}

/// Everything a renderer needs to start one voice.
pub struct VoiceInit {
    /// Flat generator array, indexed by [`crate::gen::GenId`].
    pub gens: [f32; GEN_COUNT],
    /// Merged modulator list; replaces identical renderer defaults.
    pub mods: Vec<Modulator>,
    pub sample: Arc<Sample>,
    /// Sample block the sample's offsets index into.
    pub data: Arc<[i16]>,
    /// Must be held for as long as the voice reads `data`; dropping it
    /// tells the bank the voice is finished with the sample.
    pub guard: SampleUseGuard,
}

/// A loaded instrument bank, whatever its on-disk format.
pub trait SoundFont: Send + Sync {
    /// Display name of the bank.
    fn name(&self) -> &str;

    /// The catalog, sorted by (bank, program).
    fn presets(&self) -> Vec<PresetHeader>;

    /// Resolve a note-on against one preset. An empty vector means no
    /// zone matched; `None`-like lookups of unknown (bank, program)
    /// pairs also yield an empty vector.
    fn note_on(&self, bank: u32, program: u32, key: u8, vel: u8) -> Result<Vec<VoiceInit>>;

    /// A host channel starts using this preset. Banks loaded with
    /// dynamic sample loading materialize sample data here.
    fn preset_selected(&self, bank: u32, program: u32) -> Result<()> {
        let _ = (bank, program);
        Ok(())
    }

    /// A host channel stops using this preset. The dynamic-loading
    /// counterpart of [`SoundFont::preset_selected`]; sample data is
    /// released once no selection and no sounding voice needs it.
    fn preset_deselected(&self, bank: u32, program: u32) -> Result<()> {
        let _ = (bank, program);
        Ok(())
    }
}
