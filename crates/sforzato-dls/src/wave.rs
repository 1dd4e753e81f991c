//! Wave pool parsing.
//!
//! The wave pool is a list of `LIST[wave]` chunks addressed through the
//! pool table's byte offsets. Parsing records where each wave's data
//! payload sits and how to decode it; the actual decode happens when
//! the font reads its sample block (possibly much later, with dynamic
//! sample loading). Mono PCM at 8 or 16 bits is supported, plus the
//! two G.711 companded layouts expanded inline.

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;

use sforzato_core::error::{LoadError, Result};
use sforzato_core::riff::{Chunk, Reader};

use crate::chunks;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_ALAW: u16 = 0x0006;
const FORMAT_ULAW: u16 = 0x0007;

/// Storage layout of one wave's data payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveFormat {
    Pcm8,
    Pcm16,
    ALaw,
    ULaw,
}

impl WaveFormat {
    pub fn bytes_per_frame(self) -> u32 {
        match self {
            WaveFormat::Pcm16 => 2,
            _ => 1,
        }
    }

    /// Decode a raw payload into 16-bit frames, appending to `out`.
    pub fn decode_into(self, bytes: &[u8], out: &mut Vec<i16>) {
        match self {
            WaveFormat::Pcm16 => {
                out.extend(bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])));
            }
            WaveFormat::Pcm8 => {
                out.extend(bytes.iter().map(|&b| (i16::from(b) - 128) << 8));
            }
            WaveFormat::ALaw => {
                out.extend(bytes.iter().map(|&b| alaw_to_linear(b)));
            }
            WaveFormat::ULaw => {
                out.extend(bytes.iter().map(|&b| ulaw_to_linear(b)));
            }
        }
    }
}

fn alaw_to_linear(value: u8) -> i16 {
    let a = value ^ 0x55;
    let mut t = i32::from(a & 0x0f) << 4;
    let seg = (a & 0x70) >> 4;
    match seg {
        0 => t += 8,
        1 => t += 0x108,
        _ => {
            t += 0x108;
            t <<= seg - 1;
        }
    }
    (if a & 0x80 != 0 { t } else { -t }) as i16
}

fn ulaw_to_linear(value: u8) -> i16 {
    let u = !value;
    let mut t = (i32::from(u & 0x0f) << 3) + 0x84;
    t <<= (u & 0x70) >> 4;
    (if u & 0x80 != 0 { 0x84 - t } else { t - 0x84 }) as i16
}

/// Pitch, gain and loop parameters of a `wsmp` chunk.
#[derive(Clone, Copy, Debug, Default)]
pub struct Wsmp {
    pub unity_note: u16,
    /// Cents.
    pub fine_tune: i16,
    /// Centibels scaled by 65536.
    pub gain: i32,
    pub loop_type: u32,
    pub loop_start: u32,
    pub loop_length: u32,
}

/// Read a `wsmp` payload, returning it with the byte count the
/// declared header sizes account for.
pub fn parse_wsmp(reader: &mut Reader<'_>) -> Result<(Wsmp, u32)> {
    let mut cbsize = reader.read_u32::<LittleEndian>()?;
    if cbsize < 20 {
        // one vendor writes a short header; the fields still follow
        warn!("wave sample header declares less than 20 bytes, reading it anyway");
        cbsize = 20;
    }
    let mut wsmp = Wsmp {
        unity_note: reader.read_u16::<LittleEndian>()?,
        fine_tune: reader.read_i16::<LittleEndian>()?,
        gain: reader.read_i32::<LittleEndian>()?,
        ..Wsmp::default()
    };
    reader.skip(4)?; // options
    let loops = reader.read_u32::<LittleEndian>()?;
    if loops > 1 {
        return Err(LoadError::Corrupt(
            "wave sample chunk declares more than one loop".into(),
        ));
    }
    if loops == 0 {
        return Ok((wsmp, cbsize));
    }

    let mut loop_cbsize = reader.read_u32::<LittleEndian>()?;
    if loop_cbsize < 16 {
        warn!("wave sample loop declares less than 16 bytes, reading it anyway");
        loop_cbsize = 16;
    }
    wsmp.loop_type = reader.read_u32::<LittleEndian>()?;
    wsmp.loop_start = reader.read_u32::<LittleEndian>()?;
    wsmp.loop_length = reader.read_u32::<LittleEndian>()?;
    Ok((wsmp, cbsize + loop_cbsize))
}

/// One parsed wave pool entry.
#[derive(Clone, Debug)]
pub struct WaveInfo {
    pub name: String,
    pub sample_rate: u32,
    /// Frame range in the decoded pool block; `end` is past the end.
    pub start: u32,
    pub end: u32,
    /// File position and byte length of the raw data payload.
    pub data_pos: u64,
    pub data_len: u32,
    pub format: WaveFormat,
    pub wsmp: Option<Wsmp>,
}

impl WaveInfo {
    pub fn frames(&self) -> u32 {
        self.end - self.start
    }
}

/// Parse one `LIST[wave]` whose header the caller just consumed.
/// `start_frame` is where its frames will land in the pool block.
pub fn parse_wave(reader: &mut Reader<'_>, size: u32, start_frame: u32) -> Result<WaveInfo> {
    let mut name = String::new();
    let mut sample_rate = 0u32;
    let mut format: Option<(u16, u16)> = None;
    let mut data: Option<(u64, u32, WaveFormat)> = None;
    let mut wsmp = None;

    reader.each_subchunk(size, &mut |reader, chunk| {
        match chunk.id {
            chunks::INFO => {
                if let Some(inam) = info_name(reader, chunk.size)? {
                    name = inam;
                }
            }
            chunks::DLID | chunks::GUID | chunks::FACT | chunks::CUE => {}
            chunks::FMT => {
                let tag = reader.read_u16::<LittleEndian>()?;
                let channels = reader.read_u16::<LittleEndian>()?;
                if channels != 1 {
                    return Err(LoadError::Corrupt(format!(
                        "unsupported wave channel count {channels}"
                    )));
                }
                sample_rate = reader.read_u32::<LittleEndian>()?;
                reader.skip(6)?; // byte rate, block alignment
                let bits = reader.read_u16::<LittleEndian>()?;
                format = Some((tag, bits));
            }
            chunks::DATA => {
                let layout = match format {
                    Some((FORMAT_PCM, 8)) => WaveFormat::Pcm8,
                    Some((FORMAT_PCM, 16)) => WaveFormat::Pcm16,
                    Some((FORMAT_ALAW, 8)) => WaveFormat::ALaw,
                    Some((FORMAT_ULAW, 8)) => WaveFormat::ULaw,
                    Some((tag, bits)) => {
                        return Err(LoadError::Corrupt(format!(
                            "unsupported wave format {tag} at {bits} bits per sample"
                        )));
                    }
                    None => {
                        return Err(LoadError::Corrupt(
                            "wave data chunk appears before its format chunk".into(),
                        ));
                    }
                };
                if chunk.size % layout.bytes_per_frame() != 0 {
                    return Err(LoadError::BadChunkSize(chunks::DATA));
                }
                data = Some((reader.tell()?, chunk.size, layout));
            }
            chunks::WSMP => {
                let (parsed, consumed) = parse_wsmp(reader)?;
                if consumed != chunk.size {
                    return Err(LoadError::BadChunkSize(chunks::WSMP));
                }
                wsmp = Some(parsed);
            }
            other => {
                warn!("ignoring unexpected chunk '{other}' in a wave list");
            }
        }
        Ok(())
    })?;

    let (data_pos, data_len, format) = data.ok_or_else(|| {
        LoadError::Corrupt("wave list contains no data chunk".into())
    })?;

    let frames = data_len / format.bytes_per_frame();
    Ok(WaveInfo {
        name,
        sample_rate,
        start: start_frame,
        end: start_frame + frames,
        data_pos,
        data_len,
        format,
        wsmp,
    })
}

/// Scan a `LIST[INFO]` payload for the name entry.
pub(crate) fn info_name(reader: &mut Reader<'_>, size: u32) -> Result<Option<String>> {
    let mut name = None;
    reader.each_subchunk(size, &mut |reader, chunk: &Chunk| {
        if chunk.id == chunks::INAM && name.is_none() {
            name = Some(reader.read_fixed_str(chunk.size as usize)?);
        }
        Ok(())
    })?;
    Ok(name)
}
