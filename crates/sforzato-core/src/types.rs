//! The normalized synthesis data model.
//!
//! Both bank formats resolve into this shape: presets, each holding
//! zones that link to instruments, which hold zones that link to
//! samples. All cross-references are direct `Arc` links; the loaders
//! validate and resolve the file's index-based references before
//! anything escapes them.

use std::sync::{Arc, RwLock};

use crate::gen::GenId;
use crate::modulator::Modulator;

/// Key/velocity window of a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyVelRange {
    pub key_lo: u8,
    pub key_hi: u8,
    pub vel_lo: u8,
    pub vel_hi: u8,
}

impl Default for KeyVelRange {
    fn default() -> Self {
        KeyVelRange {
            key_lo: 0,
            key_hi: 127,
            vel_lo: 0,
            vel_hi: 127,
        }
    }
}

impl KeyVelRange {
    pub fn contains(&self, key: u8, vel: u8) -> bool {
        self.key_lo <= key && key <= self.key_hi && self.vel_lo <= vel && vel <= self.vel_hi
    }
}

/// Sample type flag bits, as stored in Format A sample headers.
pub mod sample_type {
    pub const MONO: u16 = 1;
    pub const RIGHT: u16 = 2;
    pub const LEFT: u16 = 4;
    pub const LINKED: u16 = 8;
    /// Compressed sample data (not decoded by this engine).
    pub const COMPRESSED: u16 = 0x10;
    /// Sample lives in hardware ROM, unreachable for us.
    pub const ROM: u16 = 0x8000;
}

/// One sample: header metadata plus (possibly deferred) 16-bit data.
///
/// Offsets index data points in the shared sample block the owning bank
/// loaded. `end` is exclusive; loop points are already validated and
/// clamped by the loader.
#[derive(Debug)]
pub struct Sample {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub root_key: u8,
    pub pitch_correction: i8,
    pub sample_type: u16,
    /// Cleared when validation disabled the sample; zones referencing
    /// an invalid sample never sound.
    pub valid: bool,
    data: RwLock<Option<Arc<[i16]>>>,
}

impl Sample {
    pub fn new(name: String) -> Sample {
        Sample {
            name,
            start: 0,
            end: 0,
            loop_start: 0,
            loop_end: 0,
            sample_rate: 44100,
            root_key: 60,
            pitch_correction: 0,
            sample_type: sample_type::MONO,
            valid: true,
            data: RwLock::new(None),
        }
    }

    /// The sample block this sample indexes into, if currently loaded.
    pub fn data(&self) -> Option<Arc<[i16]>> {
        self.data.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Attach or detach the sample block (dynamic loading).
    pub fn set_data(&self, data: Option<Arc<[i16]>>) {
        *self.data.write().unwrap_or_else(|e| e.into_inner()) = data;
    }

    /// Number of data points between start and end.
    pub fn frames(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// Generator and modulator payload shared by zones at all levels.
#[derive(Clone, Debug, Default)]
pub struct Zone {
    pub range: KeyVelRange,
    /// Explicitly set generators, one entry per id, in bank order.
    pub gens: Vec<(GenId, f32)>,
    pub mods: Vec<Modulator>,
}

impl Zone {
    /// Value of `id` if this zone sets it.
    pub fn gen(&self, id: GenId) -> Option<f32> {
        self.gens.iter().find(|(g, _)| *g == id).map(|&(_, v)| v)
    }

    /// Set `id`, replacing an earlier entry for the same id.
    pub fn set_gen(&mut self, id: GenId, value: f32) {
        if let Some(slot) = self.gens.iter_mut().find(|(g, _)| *g == id) {
            slot.1 = value;
        } else {
            self.gens.push((id, value));
        }
    }
}

/// An instrument zone: a window plus the sample it plays.
#[derive(Clone, Debug)]
pub struct InstZone {
    pub zone: Zone,
    pub sample: Arc<Sample>,
}

/// An instrument: the per-sample layer presets link to.
#[derive(Clone, Debug, Default)]
pub struct Instrument {
    pub name: String,
    /// Global zone: defaults for every zone of this instrument.
    pub global: Option<Zone>,
    pub zones: Vec<InstZone>,
}

/// A preset zone: a window plus the instrument it layers.
#[derive(Clone, Debug)]
pub struct PresetZone {
    pub zone: Zone,
    pub instrument: Arc<Instrument>,
}

/// A preset, addressable by (bank, program).
#[derive(Clone, Debug, Default)]
pub struct Preset {
    pub name: String,
    pub bank: u32,
    pub program: u32,
    pub global: Option<Zone>,
    pub zones: Vec<PresetZone>,
}
