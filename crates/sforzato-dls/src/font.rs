//! DLS bank import and the host-facing font.
//!
//! [`DlsFont::load`] walks the container's top-level chunks, reads the
//! pool table, parses the wave pool and the instrument collection, and
//! converts everything into the shared data model. What a preset and
//! an instrument are in Format A is a single "instrument" here: one
//! catalog entry with regions that link straight to wave pool samples
//! and carry a converted [`Articulation`].

use std::io::{Read, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};

use sforzato_core::cache::{CacheKey, CachedSample, SampleCache, SampleUse};
use sforzato_core::error::{LoadError, Result};
use sforzato_core::font::{LoaderSettings, PresetHeader, SoundFont, VoiceInit};
use sforzato_core::gen::{GenId, GEN_COUNT};
use sforzato_core::io::IoProvider;
use sforzato_core::riff::{ChunkKind, Reader};
use sforzato_core::types::{sample_type, KeyVelRange, Sample};

use crate::art::{self, Articulation};
use crate::cdl;
use crate::chunks;
use crate::wave::{self, WaveFormat, WaveInfo, Wsmp};

/// Catalog bank number assigned to drum kits.
const DRUM_BANK: u32 = 128 * 128;

/// A loaded DLS bank.
pub struct DlsFont {
    name: String,
    path: PathBuf,
    io: Arc<dyn IoProvider>,
    settings: LoaderSettings,
    cache: Arc<SampleCache>,
    /// Decode plan for the pooled sample block, one entry per wave.
    segments: Vec<Segment>,
    total_frames: u32,
    instruments: Vec<DlsInstrument>,
    articulations: Vec<Articulation>,
    samples: Vec<Arc<Sample>>,
    in_use: SampleUse,
    state: Mutex<LoadState>,
}

#[derive(Clone, Copy)]
struct Segment {
    data_pos: u64,
    data_len: u32,
    format: WaveFormat,
}

#[derive(Default)]
struct LoadState {
    selected: usize,
    block: Option<CachedSample>,
}

struct DlsInstrument {
    name: String,
    bank: u32,
    program: u32,
    regions: Vec<DlsRegion>,
}

struct DlsRegion {
    range: KeyVelRange,
    /// Region-level pitch/gain/loop override; absent regions inherit
    /// from the linked wave's own parameters.
    wsmp: Option<Wsmp>,
    exclusive_class: u16,
    art: Option<usize>,
    sample: usize,
    /// Loop mode and gain taken from the wave's parameters, applied
    /// when the region has no `wsmp` of its own.
    inherited_mode: f32,
    inherited_gain: f64,
}

impl DlsFont {
    /// Load the bank at `path` through `io`.
    pub fn load(
        io: Arc<dyn IoProvider>,
        path: &Path,
        settings: LoaderSettings,
        cache: Arc<SampleCache>,
    ) -> Result<DlsFont> {
        let mut handle = io.open(path)?;
        let file_size = handle.seek(SeekFrom::End(0))?;
        handle.seek(SeekFrom::Start(0))?;

        let mut parser = Parser {
            sample_rate: settings.sample_rate,
            name: None,
            pool_cues: Vec::new(),
            waves: Vec::new(),
            articulations: Vec::new(),
            instruments: Vec::new(),
        };
        let mut reader = Reader::new(&mut *handle);
        parser.parse(&mut reader, file_size)?;
        drop(handle);

        let Parser {
            name,
            waves,
            articulations,
            mut instruments,
            ..
        } = parser;

        debug!("read {} waves and {} instruments", waves.len(), instruments.len());

        let samples: Vec<Arc<Sample>> = waves.iter().map(|w| Arc::new(import_sample(w))).collect();
        let segments: Vec<Segment> = waves
            .iter()
            .map(|w| Segment {
                data_pos: w.data_pos,
                data_len: w.data_len,
                format: w.format,
            })
            .collect();
        let total_frames = waves.last().map_or(0, |w| w.end);

        // regions without their own wave-sample chunk fall back to the
        // linked wave's loop mode and gain
        for instrument in &mut instruments {
            for region in &mut instrument.regions {
                if let Some(wsmp) = &waves[region.sample].wsmp {
                    region.inherited_mode = loop_mode(wsmp);
                    region.inherited_gain = f64::from(wsmp.gain) / 65536.0;
                }
            }
        }

        instruments.sort_by_key(|i| (i.bank, i.program));

        let name = name.unwrap_or_else(|| path.display().to_string());

        let font = DlsFont {
            name,
            path: path.to_path_buf(),
            io,
            settings,
            cache,
            segments,
            total_frames,
            instruments,
            articulations,
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
        let key = CacheKey::for_file(&self.path, u64::from(self.total_frames) * 2);
        let io = self.io.clone();
        let path = self.path.clone();
        let segments = self.segments.clone();
        let total = self.total_frames as usize;
        let mut read = move || -> Result<Vec<i16>> {
            let mut handle = io.open(&path)?;
            let mut data = Vec::with_capacity(total);
            for seg in &segments {
                handle.seek(SeekFrom::Start(seg.data_pos))?;
                let mut bytes = vec![0u8; seg.data_len as usize];
                Reader::new(&mut *handle).read_exact(&mut bytes)?;
                seg.format.decode_into(&bytes, &mut data);
            }
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
        self.instruments
            .iter()
            .any(|i| i.bank == bank && i.program == program)
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn region_voice(&self, region: &DlsRegion) -> Option<VoiceInit> {
        let sample = &self.samples[region.sample];
        let data = match sample.data() {
            Some(data) => data,
            None => {
                warn!(
                    "sample '{}' has no data loaded, was the preset selected?",
                    sample.name
                );
                return None;
            }
        };

        let mut gens = [0f32; GEN_COUNT];
        for id in GenId::all() {
            gens[id.index()] = id.default_value();
        }
        let mut mods = Vec::new();
        if let Some(index) = region.art {
            let art = &self.articulations[index];
            for id in GenId::all() {
                if let Some(value) = art.gens[id.index()] {
                    gens[id.index()] = value as f32;
                }
            }
            mods = art.mods.clone();
        }

        match &region.wsmp {
            Some(wsmp) => {
                gens[GenId::OverrideRootKey.index()] = f32::from(wsmp.unity_note);
                gens[GenId::FineTune.index()] +=
                    f32::from(wsmp.fine_tune) - f32::from(sample.pitch_correction);
                gens[GenId::Attenuation.index()] += -(wsmp.gain as f32) / 65536.0;
                gens[GenId::SampleMode.index()] = loop_mode(wsmp);
                let loop_start = u64::from(sample.start) + u64::from(wsmp.loop_start);
                let loop_end = loop_start + u64::from(wsmp.loop_length);
                gens[GenId::StartLoopAddrOfs.index()] =
                    (loop_start as i64 - i64::from(sample.loop_start)) as f32;
                gens[GenId::EndLoopAddrOfs.index()] =
                    (loop_end as i64 - i64::from(sample.loop_end)) as f32;
            }
            None => {
                gens[GenId::Attenuation.index()] += -region.inherited_gain as f32;
                gens[GenId::SampleMode.index()] = region.inherited_mode;
            }
        }

        gens[GenId::ExclusiveClass.index()] = f32::from(region.exclusive_class);

        Some(VoiceInit {
            gens,
            mods,
            sample: sample.clone(),
            data,
            guard: self.in_use.begin(),
        })
    }
}

impl SoundFont for DlsFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn presets(&self) -> Vec<PresetHeader> {
        self.instruments
            .iter()
            .map(|i| PresetHeader {
                bank: i.bank,
                program: i.program,
                name: i.name.clone(),
            })
            .collect()
    }

    fn note_on(&self, bank: u32, program: u32, key: u8, vel: u8) -> Result<Vec<VoiceInit>> {
        let instrument = match self
            .instruments
            .iter()
            .find(|i| i.bank == bank && i.program == program)
        {
            Some(i) => i,
            None => return Ok(Vec::new()),
        };

        let mut voices = Vec::new();
        for region in &instrument.regions {
            if !region.range.contains(key, vel) {
                continue;
            }
            if let Some(voice) = self.region_voice(region) {
                voices.push(voice);
            }
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
            self.in_use.defer_release(block);
        }
        Ok(())
    }
}

/// Loop-mode generator value for a wave-sample chunk.
fn loop_mode(wsmp: &Wsmp) -> f32 {
    if wsmp.loop_length == 0 {
        return 0.0;
    }
    match wsmp.loop_type {
        0 => 1.0,
        1 => 3.0,
        other => {
            warn!("invalid loop type {other}, defaulting to loop during release");
            3.0
        }
    }
}

fn import_sample(wave: &WaveInfo) -> Sample {
    let mut s = Sample::new(wave.name.clone());
    s.start = wave.start;
    s.end = wave.end;
    s.sample_rate = wave.sample_rate;
    s.sample_type = sample_type::MONO;
    if let Some(wsmp) = &wave.wsmp {
        s.loop_start = wave.start + wsmp.loop_start;
        s.loop_end = wave.start + wsmp.loop_start + wsmp.loop_length;
        s.root_key = wsmp.unity_note as u8;
        s.pitch_correction = wsmp.fine_tune as i8;
    }
    s
}

/// Transient parse state; its vectors move into the font when done.
struct Parser {
    sample_rate: u32,
    name: Option<String>,
    pool_cues: Vec<u32>,
    waves: Vec<WaveInfo>,
    articulations: Vec<Articulation>,
    instruments: Vec<DlsInstrument>,
}

impl Parser {
    fn parse(&mut self, reader: &mut Reader<'_>, file_size: u64) -> Result<()> {
        let top = reader.chunk()?;
        if top.kind != ChunkKind::Riff {
            return Err(LoadError::NotRiff);
        }
        if top.id != chunks::DLS {
            return Err(LoadError::WrongFormType {
                expected: chunks::DLS,
                found: top.id,
            });
        }
        let declared = u64::from(top.size) + 12;
        if declared > file_size {
            return Err(LoadError::Corrupt(
                "file is shorter than its container declares".into(),
            ));
        }
        if declared < file_size {
            warn!("file has extra data after the container");
        }

        let mut lins: Option<(u64, u32)> = None;
        let mut wvpl: Option<(u64, u32)> = None;

        let rate = self.sample_rate;
        reader.each_subchunk(top.size, &mut |reader, chunk| {
            match chunk.id {
                chunks::DLID | chunks::VERS => {}
                chunks::CDL => {
                    if !cdl::execute(reader, chunk.size, rate)? {
                        return Err(LoadError::Corrupt(
                            "bank is disabled by its conditional-load expression".into(),
                        ));
                    }
                }
                chunks::COLH => {
                    if chunk.size != 4 {
                        return Err(LoadError::BadChunkSize(chunks::COLH));
                    }
                    let count = reader.read_u32::<LittleEndian>()?;
                    self.instruments.reserve(count as usize);
                }
                chunks::PTBL => {
                    let cbsize = reader.read_u32::<LittleEndian>()?;
                    if cbsize < 8 {
                        return Err(LoadError::BadChunkSize(chunks::PTBL));
                    }
                    let cues = reader.read_u32::<LittleEndian>()?;
                    if u64::from(cues) * 4 + u64::from(cbsize) != u64::from(chunk.size) {
                        return Err(LoadError::BadChunkSize(chunks::PTBL));
                    }
                    reader.skip(u64::from(cbsize) - 8)?;
                    self.pool_cues = Vec::with_capacity(cues as usize);
                    for _ in 0..cues {
                        self.pool_cues.push(reader.read_u32::<LittleEndian>()?);
                    }
                }
                chunks::INFO if chunk.is_list() => {
                    if let Some(name) = wave::info_name(reader, chunk.size)? {
                        self.name = Some(name);
                    }
                }
                chunks::LINS if chunk.is_list() => {
                    lins = Some((reader.tell()?, chunk.size));
                }
                chunks::WVPL if chunk.is_list() => {
                    wvpl = Some((reader.tell()?, chunk.size));
                }
                other => {
                    warn!("ignoring unknown top-level chunk '{other}'");
                }
            }
            Ok(())
        })?;

        let (wvpl_pos, _) = wvpl.ok_or_else(|| {
            LoadError::Corrupt("bank contains no wave pool list".into())
        })?;
        self.parse_wvpl(reader, wvpl_pos)?;

        let (lins_pos, lins_size) = lins.ok_or_else(|| {
            LoadError::Corrupt("bank contains no instrument list".into())
        })?;
        reader.seek_to(lins_pos)?;
        self.parse_lins(reader, lins_size)?;

        Ok(())
    }

    fn parse_wvpl(&mut self, reader: &mut Reader<'_>, base: u64) -> Result<()> {
        self.waves.reserve(self.pool_cues.len());
        let mut next_frame = 0u32;
        for (index, &cue) in self.pool_cues.iter().enumerate() {
            reader.seek_to(base + u64::from(cue))?;
            let chunk = reader.expect_list(chunks::WAVE).map_err(|e| {
                warn!("wave pool entry {index} does not point at a wave list");
                e
            })?;
            let wave = wave::parse_wave(reader, chunk.size, next_frame)?;
            next_frame = wave.end;
            self.waves.push(wave);
        }
        Ok(())
    }

    fn parse_lins(&mut self, reader: &mut Reader<'_>, size: u32) -> Result<()> {
        reader.each_subchunk(size, &mut |reader, chunk| {
            if chunk.id != chunks::INS || !chunk.is_list() {
                warn!("ignoring unexpected chunk '{}' in the instrument list", chunk.id);
                return Ok(());
            }
            let instrument = self.parse_ins(reader, chunk.size)?;
            self.instruments.push(instrument);
            Ok(())
        })
    }

    fn parse_ins(&mut self, reader: &mut Reader<'_>, size: u32) -> Result<DlsInstrument> {
        let mut name = String::new();
        let mut bank = 0u32;
        let mut program = 0u32;
        let mut art_index: Option<usize> = None;
        let mut regions = Vec::new();

        reader.each_subchunk(size, &mut |reader, chunk| {
            match chunk.id {
                chunks::DLID => {}
                chunks::INFO => {
                    if let Some(inam) = wave::info_name(reader, chunk.size)? {
                        name = inam;
                    }
                }
                chunks::INSH => {
                    if chunk.size != 12 {
                        return Err(LoadError::BadChunkSize(chunks::INSH));
                    }
                    let region_count = reader.read_u32::<LittleEndian>()?;
                    regions.reserve(region_count as usize);
                    let bank_dword = reader.read_u32::<LittleEndian>()?;
                    bank = if bank_dword & 0x8000_0000 != 0 {
                        DRUM_BANK
                    } else {
                        ((bank_dword >> 8) & 0x7f) * 128 + (bank_dword & 0x7f)
                    };
                    program = reader.read_u32::<LittleEndian>()? & 0x7f;
                }
                chunks::LART | chunks::LAR2 => match art_index {
                    None => {
                        let index = self.articulations.len();
                        self.articulations.push(Articulation::default());
                        if self.parse_lart(reader, chunk.size, index)? {
                            art_index = Some(index);
                        } else {
                            debug!("instrument articulation list bypassed by its conditional");
                            self.articulations.pop();
                        }
                    }
                    Some(index) => {
                        self.parse_lart(reader, chunk.size, index)?;
                    }
                },
                chunks::LRGN => {
                    self.parse_lrgn(reader, chunk.size, &mut regions)?;
                }
                other => {
                    warn!("ignoring unexpected chunk '{other}' in an instrument");
                }
            }
            Ok(())
        })?;

        for region in &mut regions {
            if region.art.is_none() {
                region.art = art_index;
            }
        }

        Ok(DlsInstrument {
            name,
            bank,
            program,
            regions,
        })
    }

    /// Merge an articulation list into `self.articulations[index]`.
    /// Returns false when a conditional bypasses the whole list.
    fn parse_lart(&mut self, reader: &mut Reader<'_>, size: u32, index: usize) -> Result<bool> {
        let mut bypassed = false;
        let rate = self.sample_rate;
        reader.each_subchunk(size, &mut |reader, chunk| {
            if bypassed {
                return Ok(());
            }
            if chunk.id == chunks::CDL {
                if !cdl::execute(reader, chunk.size, rate)? {
                    bypassed = true;
                }
                return Ok(());
            }
            if chunk.id != chunks::ART1 && chunk.id != chunks::ART2 {
                warn!("ignoring unexpected chunk '{}' in an articulation list", chunk.id);
                return Ok(());
            }
            parse_art(reader, chunk.id == chunks::ART1, chunk.size, &mut self.articulations[index])
        })?;
        Ok(!bypassed)
    }

    fn parse_lrgn(&mut self, reader: &mut Reader<'_>, size: u32, regions: &mut Vec<DlsRegion>) -> Result<()> {
        reader.each_subchunk(size, &mut |reader, chunk| {
            if chunk.id != chunks::RGN && chunk.id != chunks::RGN2 {
                warn!("ignoring unexpected chunk '{}' in a region list", chunk.id);
                return Ok(());
            }
            match self.parse_rgn(reader, chunk.size)? {
                Some(region) => regions.push(region),
                None => debug!("region bypassed by its conditional"),
            }
            Ok(())
        })
    }

    /// Parse one region; `None` means a conditional bypassed it.
    fn parse_rgn(&mut self, reader: &mut Reader<'_>, size: u32) -> Result<Option<DlsRegion>> {
        let mut region = DlsRegion {
            range: KeyVelRange::default(),
            wsmp: None,
            exclusive_class: 0,
            art: None,
            sample: 0,
            inherited_mode: 0.0,
            inherited_gain: 0.0,
        };
        let mut bypassed = false;
        let rate = self.sample_rate;
        let wave_count = self.waves.len();

        reader.each_subchunk(size, &mut |reader, chunk| {
            if bypassed {
                return Ok(());
            }
            match chunk.id {
                chunks::INFO => {}
                chunks::CDL => {
                    if !cdl::execute(reader, chunk.size, rate)? {
                        bypassed = true;
                    }
                }
                chunks::RGNH => {
                    let key_lo = reader.read_u16::<LittleEndian>()?;
                    let key_hi = reader.read_u16::<LittleEndian>()?;
                    let vel_lo = reader.read_u16::<LittleEndian>()?;
                    let vel_hi = reader.read_u16::<LittleEndian>()?;
                    region.range = KeyVelRange {
                        key_lo: key_lo.min(127) as u8,
                        key_hi: key_hi.min(127) as u8,
                        vel_lo: vel_lo.min(127) as u8,
                        vel_hi: vel_hi.min(127) as u8,
                    };
                    reader.skip(2)?; // options
                    let key_group = reader.read_u16::<LittleEndian>()?;
                    if key_group != 0 {
                        region.exclusive_class = key_group;
                    }
                }
                chunks::WLNK => {
                    reader.skip(8)?; // phase group and channel placement
                    let index = reader.read_u32::<LittleEndian>()? as usize;
                    if index >= wave_count {
                        return Err(LoadError::InvalidReference {
                            what: "wave pool",
                            index,
                            len: wave_count,
                        });
                    }
                    region.sample = index;
                }
                chunks::WSMP => {
                    let (wsmp, _) = wave::parse_wsmp(reader)?;
                    region.wsmp = Some(wsmp);
                }
                chunks::LART | chunks::LAR2 => match region.art {
                    None => {
                        let index = self.articulations.len();
                        self.articulations.push(Articulation::default());
                        if self.parse_lart(reader, chunk.size, index)? {
                            region.art = Some(index);
                        } else {
                            debug!("region articulation list bypassed by its conditional");
                            self.articulations.pop();
                        }
                    }
                    Some(index) => {
                        self.parse_lart(reader, chunk.size, index)?;
                    }
                },
                other => {
                    warn!("ignoring unexpected chunk '{other}' in a region");
                }
            }
            Ok(())
        })?;

        Ok(if bypassed { None } else { Some(region) })
    }
}

/// Parse one `art1`/`art2` chunk's connection blocks into `art`.
fn parse_art(reader: &mut Reader<'_>, level1: bool, size: u32, art: &mut Articulation) -> Result<()> {
    let cbsize = reader.read_u32::<LittleEndian>()?;
    if cbsize < 8 {
        return Err(LoadError::Corrupt("articulator header too small".into()));
    }
    let blocks = reader.read_u32::<LittleEndian>()?;
    if u64::from(cbsize) + u64::from(blocks) * 12 != u64::from(size) {
        return Err(LoadError::BadChunkSize(if level1 { chunks::ART1 } else { chunks::ART2 }));
    }
    reader.skip(u64::from(cbsize) - 8)?;

    for _ in 0..blocks {
        let source = reader.read_u16::<LittleEndian>()?;
        let control = reader.read_u16::<LittleEndian>()?;
        let destination = reader.read_u16::<LittleEndian>()?;
        let mut transform = reader.read_u16::<LittleEndian>()?;
        if level1 {
            transform = art::promote_level1(source, control, transform);
        }
        let scale = reader.read_i32::<LittleEndian>()?;
        art.add_block(source, control, destination, transform, scale);
    }
    Ok(())
}
