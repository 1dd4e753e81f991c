//! Format A structure loader.
//!
//! Reads the three top-level lists of a bank file: the INFO list with
//! version metadata, the sample-data list whose file position is
//! recorded for later reads, and the hydra: nine fixed-size record
//! tables that describe presets, instruments and samples through index
//! chains. Header records point into the bag table, bag records point
//! into the generator and modulator tables, and the differences
//! between consecutive indices are the record counts. The output is
//! the raw structure tree; reference resolution and sample validation
//! happen in [`crate::fixup`].

use std::io::SeekFrom;

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};

use sforzato_core::error::{LoadError, Result};
use sforzato_core::gen::{valid_instrument_gen, valid_preset_gen, GenId};
use sforzato_core::io::IoHandle;
use sforzato_core::modulator::Modulator;
use sforzato_core::riff::{Chunk, FourCc, Reader};
use sforzato_core::types::KeyVelRange;

const SFBK: FourCc = FourCc::new(b"sfbk");
const INFO: FourCc = FourCc::new(b"INFO");
const SDTA: FourCc = FourCc::new(b"sdta");
const PDTA: FourCc = FourCc::new(b"pdta");

const IFIL: FourCc = FourCc::new(b"ifil");
const IVER: FourCc = FourCc::new(b"iver");
const ICMT: FourCc = FourCc::new(b"ICMT");

/// INFO string chunks a bank may carry besides the two version chunks.
const INFO_STRINGS: [FourCc; 9] = [
    FourCc::new(b"isng"),
    FourCc::new(b"INAM"),
    FourCc::new(b"irom"),
    FourCc::new(b"ICRD"),
    FourCc::new(b"IENG"),
    FourCc::new(b"IPRD"),
    FourCc::new(b"ICOP"),
    ICMT,
    FourCc::new(b"ISFT"),
];

const SMPL: FourCc = FourCc::new(b"smpl");
const SM24: FourCc = FourCc::new(b"sm24");

const PHDR: FourCc = FourCc::new(b"phdr");
const PBAG: FourCc = FourCc::new(b"pbag");
const PMOD: FourCc = FourCc::new(b"pmod");
const PGEN: FourCc = FourCc::new(b"pgen");
const INST: FourCc = FourCc::new(b"inst");
const IBAG: FourCc = FourCc::new(b"ibag");
const IMOD: FourCc = FourCc::new(b"imod");
const IGEN: FourCc = FourCc::new(b"igen");
const SHDR: FourCc = FourCc::new(b"shdr");

const PHDR_SIZE: i64 = 38;
const BAG_SIZE: i64 = 4;
const MOD_SIZE: i64 = 10;
const GEN_SIZE: i64 = 4;
const IHDR_SIZE: i64 = 22;
const SHDR_SIZE: i64 = 46;

/// Bank format version from the INFO list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SfVersion {
    pub major: u16,
    pub minor: u16,
}

/// A raw zone: its window, the generators it sets (still integer
/// scaled), its modulators, and the index of the instrument or sample
/// it links to. `None` marks a global zone.
#[derive(Clone, Debug, Default)]
pub struct SfZone {
    pub range: KeyVelRange,
    pub gens: Vec<(GenId, i16)>,
    pub mods: Vec<Modulator>,
    pub link: Option<u16>,
}

#[derive(Clone, Debug)]
pub struct SfPreset {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub zones: Vec<SfZone>,
}

#[derive(Clone, Debug)]
pub struct SfInst {
    pub name: String,
    pub zones: Vec<SfZone>,
}

/// A raw sample header. Positions are data-point indices into the
/// sample block; `end` is exclusive. They are raw file values until
/// [`crate::fixup`] validates them.
#[derive(Clone, Debug)]
pub struct SfSample {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub orig_pitch: u8,
    pub pitch_adj: i8,
    pub sample_type: u16,
    /// Cleared by [`crate::fixup`] when the header is unusable.
    pub valid: bool,
}

/// A parsed bank file before reference fixup.
#[derive(Debug, Default)]
pub struct SfFile {
    pub version: SfVersion,
    pub rom_version: Option<SfVersion>,
    /// INFO string chunks, in file order.
    pub info: Vec<(FourCc, String)>,
    /// File offset of the 16-bit sample block.
    pub sample_pos: u64,
    /// Size of the sample block in bytes.
    pub sample_size: u32,
    pub presets: Vec<SfPreset>,
    pub insts: Vec<SfInst>,
    pub samples: Vec<SfSample>,
}

impl SfFile {
    /// Bank display name from the INFO list, if present.
    pub fn bank_name(&self) -> Option<&str> {
        self.info
            .iter()
            .find(|(id, _)| *id == FourCc::new(b"INAM"))
            .map(|(_, s)| s.as_str())
    }
}

/// Parse the structure of a Format A bank file. Sample data is not
/// read, only located.
pub fn load(file: &mut dyn IoHandle) -> Result<SfFile> {
    let file_size = file.seek(SeekFrom::Start(0)).and_then(|_| file.seek(SeekFrom::End(0)))?;
    file.seek(SeekFrom::Start(0))?;

    let mut r = Reader::new(file);
    let top = r.chunk()?;
    if top.kind != sforzato_core::riff::ChunkKind::Riff {
        return Err(LoadError::NotRiff);
    }
    if top.id != SFBK {
        return Err(LoadError::WrongFormType {
            expected: SFBK,
            found: top.id,
        });
    }
    if u64::from(top.size) + 12 != file_size {
        return Err(LoadError::Corrupt(format!(
            "declared size plus header is {} but the file has {} bytes",
            u64::from(top.size) + 12,
            file_size
        )));
    }

    let mut sf = SfFile::default();

    let info = r.expect_list(INFO)?;
    let info_end = r.tell()? + u64::from(info.padded_size());
    process_info(&mut r, info.size, &mut sf)?;
    r.seek_to(info_end)?;

    let sdta = r.expect_list(SDTA)?;
    let sdta_end = r.tell()? + u64::from(sdta.padded_size());
    process_sdta(&mut r, sdta.size, &mut sf)?;
    r.seek_to(sdta_end)?;

    let pdta = r.expect_list(PDTA)?;
    process_pdta(&mut r, pdta.size, &mut sf)?;

    Ok(sf)
}

fn process_info(r: &mut Reader<'_>, size: u32, sf: &mut SfFile) -> Result<()> {
    let mut remaining = i64::from(size);
    let mut have_version = false;

    while remaining > 0 {
        let chunk = r.chunk()?;
        remaining -= 8 + i64::from(chunk.size);

        if chunk.id == IFIL {
            if chunk.size != 4 {
                return Err(LoadError::BadChunkSize(IFIL));
            }
            sf.version.major = r.read_u16::<LittleEndian>()?;
            sf.version.minor = r.read_u16::<LittleEndian>()?;
            have_version = true;
            check_version(sf.version)?;
        } else if chunk.id == IVER {
            if chunk.size != 4 {
                return Err(LoadError::BadChunkSize(IVER));
            }
            let major = r.read_u16::<LittleEndian>()?;
            let minor = r.read_u16::<LittleEndian>()?;
            sf.rom_version = Some(SfVersion { major, minor });
        } else if INFO_STRINGS.contains(&chunk.id) {
            let limit = if chunk.id == ICMT { 65536 } else { 256 };
            if chunk.size > limit || chunk.size % 2 != 0 {
                return Err(LoadError::BadChunkSize(chunk.id));
            }
            let text = r.read_fixed_str(chunk.size as usize)?;
            sf.info.push((chunk.id, text));
        } else {
            return Err(LoadError::UnexpectedChunk {
                expected: IFIL,
                found: chunk.id,
            });
        }
    }

    if remaining < 0 {
        return Err(LoadError::Corrupt("INFO list size mismatch".into()));
    }
    if !have_version {
        return Err(LoadError::Corrupt("INFO list carries no version chunk".into()));
    }
    Ok(())
}

/// Only plain 2.x banks are loadable. 3.x banks hold compressed sample
/// data this engine does not decode.
fn check_version(version: SfVersion) -> Result<()> {
    if version.major == 2 {
        Ok(())
    } else {
        Err(LoadError::UnsupportedVersion {
            major: version.major,
            minor: version.minor,
        })
    }
}

fn process_sdta(r: &mut Reader<'_>, size: u32, sf: &mut SfFile) -> Result<()> {
    if size == 0 {
        return Ok(());
    }
    let mut remaining = size;

    let chunk = r.expect_chunk(SMPL)?;
    remaining -= 8;
    if chunk.size > remaining {
        return Err(LoadError::BadChunkSize(SMPL));
    }

    sf.sample_pos = r.tell()?;
    sf.sample_size = chunk.size;
    r.skip(u64::from(chunk.size))?;
    remaining -= chunk.size;

    // A 2.4 bank may carry a second block with the low bytes of 24-bit
    // samples. It is recognized and skipped; playback stays 16-bit.
    if sf.version.major >= 2 && sf.version.minor >= 4 && remaining > 8 {
        let chunk = r.chunk()?;
        remaining -= 8;
        if chunk.id == SM24 {
            if chunk.size > remaining {
                warn!("extension sample block exceeds its list, ignoring it");
                return Ok(());
            }
            let mut half = sf.sample_size / 2;
            half += half % 2;
            if chunk.size != half {
                warn!(
                    "extension sample block is {} bytes, expected {}, ignoring it",
                    chunk.size, half
                );
                return Ok(());
            }
            debug!("bank has a 24-bit extension sample block, using 16-bit data only");
        }
    }

    Ok(())
}

/// Read the next hydra table header, checking the record size and the
/// running size of the enclosing list.
fn table_chunk(r: &mut Reader<'_>, remaining: &mut i64, id: FourCc, recsize: i64) -> Result<Chunk> {
    let chunk = r.expect_chunk(id)?;
    *remaining -= 8;
    if i64::from(chunk.size) % recsize != 0 {
        return Err(LoadError::BadTableSize(id));
    }
    *remaining -= i64::from(chunk.size);
    if *remaining < 0 {
        return Err(LoadError::Corrupt(format!(
            "'{}' table exceeds the remaining structure list",
            id
        )));
    }
    Ok(chunk)
}

fn process_pdta(r: &mut Reader<'_>, size: u32, sf: &mut SfFile) -> Result<()> {
    let mut remaining = i64::from(size);

    let chunk = table_chunk(r, &mut remaining, PHDR, PHDR_SIZE)?;
    let mut presets = load_phdr(r, chunk.size)?;
    let chunk = table_chunk(r, &mut remaining, PBAG, BAG_SIZE)?;
    load_bag(r, chunk.size, zones_mut(&mut presets), "preset")?;
    let chunk = table_chunk(r, &mut remaining, PMOD, MOD_SIZE)?;
    load_mods(r, chunk.size, zones_mut(&mut presets), "preset")?;
    let chunk = table_chunk(r, &mut remaining, PGEN, GEN_SIZE)?;
    load_gens(r, chunk.size, &mut presets, Level::Preset)?;

    let chunk = table_chunk(r, &mut remaining, INST, IHDR_SIZE)?;
    let mut insts = load_ihdr(r, chunk.size)?;
    let chunk = table_chunk(r, &mut remaining, IBAG, BAG_SIZE)?;
    load_bag(r, chunk.size, zones_mut(&mut insts), "instrument")?;
    let chunk = table_chunk(r, &mut remaining, IMOD, MOD_SIZE)?;
    load_mods(r, chunk.size, zones_mut(&mut insts), "instrument")?;
    let chunk = table_chunk(r, &mut remaining, IGEN, GEN_SIZE)?;
    load_gens(r, chunk.size, &mut insts, Level::Instrument)?;

    let chunk = table_chunk(r, &mut remaining, SHDR, SHDR_SIZE)?;
    sf.samples = load_shdr(r, chunk.size)?;

    sf.presets = presets
        .into_iter()
        .map(|item| SfPreset {
            name: item.name,
            program: item.program,
            bank: item.bank,
            zones: item.zones.into_iter().map(|z| z.zone).collect(),
        })
        .collect();
    sf.insts = insts
        .into_iter()
        .map(|item| SfInst {
            name: item.name,
            zones: item.zones.into_iter().map(|z| z.zone).collect(),
        })
        .collect();

    Ok(())
}

/// A zone while the record counts from the bag table are still known.
#[derive(Debug, Default)]
struct RawZone {
    gen_count: u32,
    mod_count: u32,
    zone: SfZone,
}

#[derive(Debug)]
struct RawItem {
    name: String,
    program: u16,
    bank: u16,
    zones: Vec<RawZone>,
}

fn zones_mut(items: &mut [RawItem]) -> impl Iterator<Item = &mut RawZone> {
    items.iter_mut().flat_map(|item| item.zones.iter_mut())
}

fn push_zones(item: &mut RawItem, count: u16) {
    for _ in 0..count {
        item.zones.push(RawZone::default());
    }
}

fn load_phdr(r: &mut Reader<'_>, size: u32) -> Result<Vec<RawItem>> {
    if size == 0 {
        return Err(LoadError::Corrupt("preset header table is empty".into()));
    }
    let count = size as i64 / PHDR_SIZE - 1;
    if count == 0 {
        warn!("bank contains no presets");
        r.skip(PHDR_SIZE as u64)?;
        return Ok(Vec::new());
    }

    let mut items: Vec<RawItem> = Vec::with_capacity(count as usize);
    let mut prev_bag = 0u16;
    for i in 0..count {
        let name = r.read_fixed_str(20)?;
        let program = r.read_u16::<LittleEndian>()?;
        let bank = r.read_u16::<LittleEndian>()?;
        let bag = r.read_u16::<LittleEndian>()?;
        r.skip(12)?; // library, genre, morphology

        if i == 0 {
            if bag > 0 {
                warn!("{} preset zones not referenced, discarding", bag);
            }
        } else {
            if bag < prev_bag {
                return Err(LoadError::NonMonotonic("preset header"));
            }
            let last = items.len() - 1;
            push_zones(&mut items[last], bag - prev_bag);
        }
        items.push(RawItem {
            name,
            program,
            bank,
            zones: Vec::new(),
        });
        prev_bag = bag;
    }

    // terminal record: only its bag index matters
    r.skip(24)?;
    let bag = r.read_u16::<LittleEndian>()?;
    r.skip(12)?;
    if bag < prev_bag {
        return Err(LoadError::NonMonotonic("preset header"));
    }
    let last = items.len() - 1;
    push_zones(&mut items[last], bag - prev_bag);

    Ok(items)
}

fn load_ihdr(r: &mut Reader<'_>, size: u32) -> Result<Vec<RawItem>> {
    if size == 0 {
        return Err(LoadError::Corrupt("instrument header table is empty".into()));
    }
    let count = size as i64 / IHDR_SIZE - 1;
    if count == 0 {
        warn!("bank contains no instruments");
        r.skip(IHDR_SIZE as u64)?;
        return Ok(Vec::new());
    }

    let mut items: Vec<RawItem> = Vec::with_capacity(count as usize);
    let mut prev_bag = 0u16;
    for i in 0..count {
        let name = r.read_fixed_str(20)?;
        let bag = r.read_u16::<LittleEndian>()?;

        if i == 0 {
            if bag > 0 {
                warn!("{} instrument zones not referenced, discarding", bag);
            }
        } else {
            if bag < prev_bag {
                return Err(LoadError::NonMonotonic("instrument header"));
            }
            let last = items.len() - 1;
            push_zones(&mut items[last], bag - prev_bag);
        }
        items.push(RawItem {
            name,
            program: 0,
            bank: 0,
            zones: Vec::new(),
        });
        prev_bag = bag;
    }

    r.skip(20)?;
    let bag = r.read_u16::<LittleEndian>()?;
    if bag < prev_bag {
        return Err(LoadError::NonMonotonic("instrument header"));
    }
    let last = items.len() - 1;
    push_zones(&mut items[last], bag - prev_bag);

    Ok(items)
}

/// Load the bag table: per-zone generator and modulator counts, as
/// differences of consecutive start indices. The table must close with
/// exactly one terminal record.
fn load_bag<'z>(
    r: &mut Reader<'_>,
    size: u32,
    zones: impl Iterator<Item = &'z mut RawZone>,
    label: &'static str,
) -> Result<()> {
    let mut remaining = i64::from(size);
    let mut prev: Option<&mut RawZone> = None;
    let mut prev_gen = 0u16;
    let mut prev_mod = 0u16;
    let gen_label: &'static str = if label == "preset" {
        "preset bag generator"
    } else {
        "instrument bag generator"
    };
    let mod_label: &'static str = if label == "preset" {
        "preset bag modulator"
    } else {
        "instrument bag modulator"
    };

    for zone in zones {
        remaining -= BAG_SIZE;
        if remaining < 0 {
            return Err(LoadError::Corrupt(format!("{} bag table size mismatch", label)));
        }
        let gen = r.read_u16::<LittleEndian>()?;
        let modndx = r.read_u16::<LittleEndian>()?;

        if let Some(pz) = prev {
            if gen < prev_gen {
                return Err(LoadError::NonMonotonic(gen_label));
            }
            if modndx < prev_mod {
                return Err(LoadError::NonMonotonic(mod_label));
            }
            pz.gen_count = u32::from(gen - prev_gen);
            pz.mod_count = u32::from(modndx - prev_mod);
        }
        prev = Some(zone);
        prev_gen = gen;
        prev_mod = modndx;
    }

    remaining -= BAG_SIZE;
    if remaining != 0 {
        return Err(LoadError::Corrupt(format!("{} bag table size mismatch", label)));
    }
    let gen = r.read_u16::<LittleEndian>()?;
    let modndx = r.read_u16::<LittleEndian>()?;

    match prev {
        None => {
            if gen > 0 {
                warn!("no {} zones but the terminal generator index is {}", label, gen);
            }
            if modndx > 0 {
                warn!("no {} zones but the terminal modulator index is {}", label, modndx);
            }
        }
        Some(pz) => {
            if gen < prev_gen {
                return Err(LoadError::NonMonotonic(gen_label));
            }
            if modndx < prev_mod {
                return Err(LoadError::NonMonotonic(mod_label));
            }
            pz.gen_count = u32::from(gen - prev_gen);
            pz.mod_count = u32::from(modndx - prev_mod);
        }
    }

    Ok(())
}

/// Load the modulator table and distribute records over the zones. A
/// terminal record is skipped if present; some writers omit it.
fn load_mods<'z>(
    r: &mut Reader<'_>,
    size: u32,
    zones: impl Iterator<Item = &'z mut RawZone>,
    label: &'static str,
) -> Result<()> {
    let mut remaining = i64::from(size);
    for zone in zones {
        for _ in 0..zone.mod_count {
            remaining -= MOD_SIZE;
            if remaining < 0 {
                return Err(LoadError::Corrupt(format!(
                    "{} modulator table size mismatch",
                    label
                )));
            }
            if let Some(m) = Modulator::read_record(r)? {
                zone.zone.mods.push(m);
            }
        }
    }

    if remaining == 0 {
        return Ok(());
    }
    remaining -= MOD_SIZE;
    if remaining != 0 {
        return Err(LoadError::Corrupt(format!(
            "{} modulator table size mismatch",
            label
        )));
    }
    r.skip(MOD_SIZE as u64)?;
    Ok(())
}

/// Which structure level a generator table belongs to. The two levels
/// accept different generator ids and link through a different id.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Level {
    Preset,
    Instrument,
}

impl Level {
    fn link_gen(self) -> u16 {
        match self {
            Level::Preset => GenId::Instrument as u16,
            Level::Instrument => GenId::SampleId as u16,
        }
    }

    fn valid_gen(self, id: u16) -> bool {
        match self {
            Level::Preset => valid_preset_gen(id),
            Level::Instrument => valid_instrument_gen(id),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Level::Preset => "preset",
            Level::Instrument => "instrument",
        }
    }
}

/// Load a generator table and distribute records over the zones.
///
/// Within a zone the record stream is ordered: an optional key range
/// first, then an optional velocity range, then plain generators, then
/// the link to an instrument or sample. Records out of order, records
/// with ids invalid at this level, and records after the link are
/// discarded; a duplicate id overwrites the earlier value. A zone that
/// never links is a global-zone candidate: the first one per item is
/// kept (moved to the front if needed), the rest are dropped.
fn load_gens(r: &mut Reader<'_>, size: u32, items: &mut [RawItem], level: Level) -> Result<()> {
    let mut remaining = i64::from(size);
    let mismatch = || LoadError::Corrupt(format!("{} generator table size mismatch", level.label()));

    for item in items.iter_mut() {
        let mut discarded = false;
        let mut global_seen = false;
        let mut kept: Vec<SfZone> = Vec::with_capacity(item.zones.len());

        for raw in item.zones.drain(..) {
            let RawZone { gen_count, mut zone, .. } = raw;
            let mut stage = 0u8;
            let mut read = 0u32;

            for _ in 0..gen_count {
                remaining -= GEN_SIZE;
                if remaining < 0 {
                    return Err(mismatch());
                }
                read += 1;
                let genid = r.read_u16::<LittleEndian>()?;

                if genid == GenId::KeyRange as u16 {
                    if stage == 0 {
                        stage = 1;
                        zone.range.key_lo = r.read_u8()?;
                        zone.range.key_hi = r.read_u8()?;
                    } else {
                        r.skip(2)?;
                        discarded = true;
                    }
                } else if genid == GenId::VelRange as u16 {
                    if stage <= 1 {
                        stage = 2;
                        zone.range.vel_lo = r.read_u8()?;
                        zone.range.vel_hi = r.read_u8()?;
                    } else {
                        r.skip(2)?;
                        discarded = true;
                    }
                } else if genid == level.link_gen() {
                    stage = 3;
                    zone.link = Some(r.read_u16::<LittleEndian>()?);
                    break;
                } else {
                    stage = 2;
                    if level.valid_gen(genid) {
                        let value = r.read_i16::<LittleEndian>()?;
                        // id validity implies a known GenId
                        if let Some(id) = GenId::from_u16(genid) {
                            if let Some(slot) = zone.gens.iter_mut().find(|(g, _)| *g == id) {
                                slot.1 = value;
                            } else {
                                zone.gens.push((id, value));
                            }
                        }
                    } else {
                        r.skip(2)?;
                        discarded = true;
                    }
                }
            }

            if stage == 3 {
                // records after the link belong to no zone
                for _ in read..gen_count {
                    remaining -= GEN_SIZE;
                    if remaining < 0 {
                        return Err(mismatch());
                    }
                    r.skip(GEN_SIZE as u64)?;
                    discarded = true;
                }
                kept.push(zone);
            } else if !global_seen {
                global_seen = true;
                if kept.is_empty() {
                    kept.push(zone);
                } else {
                    warn!(
                        "{} \"{}\": global zone is not the first zone",
                        level.label(),
                        item.name
                    );
                    kept.insert(0, zone);
                }
            } else {
                warn!(
                    "{} \"{}\": discarding extra global zone",
                    level.label(),
                    item.name
                );
            }
        }

        if discarded {
            warn!(
                "{} \"{}\": some invalid generators were discarded",
                level.label(),
                item.name
            );
        }
        item.zones = kept
            .into_iter()
            .map(|zone| RawZone {
                gen_count: 0,
                mod_count: 0,
                zone,
            })
            .collect();
    }

    if remaining == 0 {
        return Ok(());
    }
    remaining -= GEN_SIZE;
    if remaining != 0 {
        return Err(mismatch());
    }
    r.skip(GEN_SIZE as u64)?;
    Ok(())
}

fn load_shdr(r: &mut Reader<'_>, size: u32) -> Result<Vec<SfSample>> {
    if size == 0 {
        return Err(LoadError::Corrupt("sample header table is empty".into()));
    }
    let count = size as i64 / SHDR_SIZE - 1;
    if count == 0 {
        warn!("bank contains no samples");
        r.skip(SHDR_SIZE as u64)?;
        return Ok(Vec::new());
    }

    let mut samples = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = r.read_fixed_str(20)?;
        let start = r.read_u32::<LittleEndian>()?;
        let end = r.read_u32::<LittleEndian>()?;
        let loop_start = r.read_u32::<LittleEndian>()?;
        let loop_end = r.read_u32::<LittleEndian>()?;
        let sample_rate = r.read_u32::<LittleEndian>()?;
        let orig_pitch = r.read_u8()?;
        let pitch_adj = r.read_i8()?;
        r.skip(2)?; // stereo link, unused here
        let sample_type = r.read_u16::<LittleEndian>()?;
        samples.push(SfSample {
            name,
            start,
            end,
            loop_start,
            loop_end,
            sample_rate,
            orig_pitch,
            pitch_adj,
            sample_type,
            valid: true,
        });
    }
    r.skip(SHDR_SIZE as u64)?;

    Ok(samples)
}
