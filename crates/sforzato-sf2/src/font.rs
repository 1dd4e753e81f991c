//! Format A bank import and the host-facing font.
//!
//! [`Sf2Font::load`] parses and validates the bank structure, converts
//! it into the shared data model, and either reads the sample block
//! right away or defers it until a preset is selected. Sample blocks
//! always go through the shared [`SampleCache`], so the same bank
//! loaded twice holds its data once.

use std::io::{Read, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use sforzato_core::cache::{CacheKey, CachedSample, SampleCache, SampleUse};
use sforzato_core::error::Result;
use sforzato_core::font::{LoaderSettings, PresetHeader, SoundFont, VoiceInit};
use sforzato_core::gen::GenId;
use sforzato_core::io::IoProvider;
use sforzato_core::resolve;
use sforzato_core::riff::Reader;
use sforzato_core::types::{sample_type, InstZone, Instrument, Preset, PresetZone, Sample, Zone};

use crate::fixup;
use crate::hydra::{self, SfSample, SfZone};

/// Attenuation correction inherited from the hardware the format was
/// designed around: attenuation generators are stored stronger than
/// they should sound and are scaled down on import.
const EMU_ATTENUATION_FACTOR: f32 = 0.4;

/// A loaded Format A bank.
pub struct Sf2Font {
    name: String,
    path: PathBuf,
    io: Arc<dyn IoProvider>,
    settings: LoaderSettings,
    cache: Arc<SampleCache>,
    sample_pos: u64,
    sample_size: u32,
    presets: Vec<Preset>,
    samples: Vec<Arc<Sample>>,
    in_use: SampleUse,
    state: Mutex<LoadState>,
}

#[derive(Default)]
struct LoadState {
    /// Number of presets currently selected on some host channel.
    /// With dynamic sample loading the sample block lives exactly as
    /// long as this is nonzero (plus any still-sounding voices).
    selected: usize,
    block: Option<CachedSample>,
}

impl Sf2Font {
    /// Load the bank at `path` through `io`.
    pub fn load(
        io: Arc<dyn IoProvider>,
        path: &Path,
        settings: LoaderSettings,
        cache: Arc<SampleCache>,
    ) -> Result<Sf2Font> {
        let mut handle = io.open(path)?;
        let mut sf = hydra::load(&mut *handle)?;
        drop(handle);
        fixup::finish(&mut sf)?;

        let samples: Vec<Arc<Sample>> = sf
            .samples
            .iter()
            .map(|raw| Arc::new(import_sample(raw)))
            .collect();

        let insts: Vec<Arc<Instrument>> = sf
            .insts
            .iter()
            .map(|raw| {
                let mut global = None;
                let mut zones = Vec::new();
                for z in &raw.zones {
                    match z.link {
                        None => global = Some(import_zone(z)),
                        Some(link) => zones.push(InstZone {
                            zone: import_zone(z),
                            sample: samples[usize::from(link)].clone(),
                        }),
                    }
                }
                Arc::new(Instrument {
                    name: raw.name.clone(),
                    global,
                    zones,
                })
            })
            .collect();

        let presets: Vec<Preset> = sf
            .presets
            .iter()
            .map(|raw| {
                let mut global = None;
                let mut zones = Vec::new();
                for z in &raw.zones {
                    match z.link {
                        None => global = Some(import_zone(z)),
                        Some(link) => zones.push(PresetZone {
                            zone: import_zone(z),
                            instrument: insts[usize::from(link)].clone(),
                        }),
                    }
                }
                Preset {
                    name: raw.name.clone(),
                    bank: u32::from(raw.bank),
                    program: u32::from(raw.program),
                    global,
                    zones,
                }
            })
            .collect();

        let name = sf
            .bank_name()
            .map(str::to_owned)
            .unwrap_or_else(|| path.display().to_string());

        let font = Sf2Font {
            name,
            path: path.to_path_buf(),
            io,
            settings,
            cache,
            sample_pos: sf.sample_pos,
            sample_size: sf.sample_size,
            presets,
            samples,
            in_use: SampleUse::new(),
            state: Mutex::new(LoadState::default()),
        };

        if !settings.dynamic_sample_loading {
            let block = font.acquire_block()?;
            font.attach(&block);
            font.lock_state().block = Some(block);
        }

        Ok(font)
    }

    fn acquire_block(&self) -> Result<CachedSample> {
        let key = CacheKey::for_file(&self.path, u64::from(self.sample_size));
        let io = self.io.clone();
        let path = self.path.clone();
        let pos = self.sample_pos;
        let size = self.sample_size as usize;
        let mut read = move || -> Result<Vec<i16>> {
            let mut handle = io.open(&path)?;
            handle.seek(SeekFrom::Start(pos))?;
            let mut bytes = vec![0u8; size];
            Reader::new(&mut *handle).read_exact(&mut bytes)?;
            let mut data = vec![0i16; size / 2];
            LittleEndian::read_i16_into(&bytes[..size / 2 * 2], &mut data);
            Ok(data)
        };
        self.cache
            .acquire(key, self.settings.lock_memory, &mut read)
    }

    fn attach(&self, block: &CachedSample) {
        for sample in &self.samples {
            sample.set_data(Some(block.data().clone()));
        }
    }

    fn detach(&self) {
        for sample in &self.samples {
            sample.set_data(None);
        }
    }

    fn has_preset(&self, bank: u32, program: u32) -> bool {
        self.presets
            .iter()
            .any(|p| p.bank == bank && p.program == program)
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SoundFont for Sf2Font {
    fn name(&self) -> &str {
        &self.name
    }

    fn presets(&self) -> Vec<PresetHeader> {
        self.presets
            .iter()
            .map(|p| PresetHeader {
                bank: p.bank,
                program: p.program,
                name: p.name.clone(),
            })
            .collect()
    }

    fn note_on(&self, bank: u32, program: u32, key: u8, vel: u8) -> Result<Vec<VoiceInit>> {
        let preset = match self.presets.iter().find(|p| p.bank == bank && p.program == program) {
            Some(p) => p,
            None => return Ok(Vec::new()),
        };

        let mut voices = Vec::new();
        for spec in resolve::preset_noteon(preset, key, vel) {
            let data = match spec.sample.data() {
                Some(data) => data,
                None => {
                    warn!(
                        "sample '{}' has no data loaded, was the preset selected?",
                        spec.sample.name
                    );
                    continue;
                }
            };
            voices.push(VoiceInit {
                gens: spec.gens,
                mods: spec.mods,
                sample: spec.sample,
                data,
                guard: self.in_use.begin(),
            });
        }
        Ok(voices)
    }

    fn preset_selected(&self, bank: u32, program: u32) -> Result<()> {
        if !self.settings.dynamic_sample_loading || !self.has_preset(bank, program) {
            return Ok(());
        }
        let mut state = self.lock_state();
        // count only successful selections, so a failed load can be retried
        if state.selected == 0 {
            let block = self.acquire_block()?;
            self.attach(&block);
            state.block = Some(block);
        }
        state.selected += 1;
        Ok(())
    }

    fn preset_deselected(&self, bank: u32, program: u32) -> Result<()> {
        if !self.settings.dynamic_sample_loading || !self.has_preset(bank, program) {
            return Ok(());
        }
        let mut state = self.lock_state();
        let block = match state.selected {
            0 => None,
            1 => {
                state.selected = 0;
                self.detach();
                state.block.take()
            }
            _ => {
                state.selected -= 1;
                None
            }
        };
        drop(state);
        if let Some(block) = block {
            // voices still sounding keep the block alive through their
            // guards; idle fonts release it right away
            self.in_use.defer_release(block);
        }
        Ok(())
    }
}

fn import_sample(raw: &SfSample) -> Sample {
    let mut s = Sample::new(raw.name.clone());
    s.start = raw.start;
    s.end = raw.end;
    s.loop_start = raw.loop_start;
    s.loop_end = raw.loop_end;
    s.sample_rate = raw.sample_rate;
    s.root_key = raw.orig_pitch;
    s.pitch_correction = raw.pitch_adj;
    s.sample_type = raw.sample_type;
    s.valid = raw.valid;

    if !s.valid {
        // already disabled during fixup
    } else if raw.sample_type & sample_type::ROM != 0 {
        warn!("ignoring sample '{}': can't use ROM samples", s.name);
        s.valid = false;
    } else if raw.sample_type & sample_type::COMPRESSED != 0 {
        warn!("ignoring sample '{}': compressed sample data is not supported", s.name);
        s.valid = false;
    } else if s.frames() < 8 {
        warn!("ignoring sample '{}': too few sample data points", s.name);
        s.valid = false;
    }
    s
}

fn import_zone(z: &SfZone) -> Zone {
    let mut gens = Vec::with_capacity(z.gens.len());
    for &(id, value) in &z.gens {
        let mut value = f32::from(value);
        if id == GenId::Attenuation {
            value *= EMU_ATTENUATION_FACTOR;
        }
        gens.push((id, value));
    }
    Zone {
        range: z.range,
        gens,
        mods: z.mods.clone(),
    }
}
