//! In-memory DLS images for tests.
//!
//! Chunks are serialized bottom-up: helper functions build leaf and
//! list chunk byte strings, [`DlsImage`] collects waves and
//! instruments and assembles the container with a consistent pool
//! table in `build`.

use std::sync::Arc;

use sforzato_core::io::MemoryIo;

pub const BANK_PATH: &str = "/bank.dls";

pub fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len() + 1);
    out.extend_from_slice(id);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 != 0 {
        out.push(0);
    }
    out
}

pub fn list(form: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut inner = form.to_vec();
    inner.extend_from_slice(body);
    chunk(b"LIST", &inner)
}

pub fn info_list(name: &str) -> Vec<u8> {
    let mut inam = name.as_bytes().to_vec();
    inam.push(0);
    list(b"INFO", &chunk(b"INAM", &inam))
}

// --- wave pool ------------------------------------------------------

pub fn fmt_chunk(tag: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&tag.to_le_bytes());
    body.extend_from_slice(&channels.to_le_bytes());
    body.extend_from_slice(&rate.to_le_bytes());
    body.extend_from_slice(&(rate * u32::from(bits / 8)).to_le_bytes());
    body.extend_from_slice(&(bits / 8).to_le_bytes());
    body.extend_from_slice(&bits.to_le_bytes());
    chunk(b"fmt ", &body)
}

pub fn wsmp_chunk(unity_note: u16, fine_tune: i16, gain: i32, looped: Option<(u32, u32, u32)>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&20u32.to_le_bytes());
    body.extend_from_slice(&unity_note.to_le_bytes());
    body.extend_from_slice(&fine_tune.to_le_bytes());
    body.extend_from_slice(&gain.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // options
    match looped {
        None => body.extend_from_slice(&0u32.to_le_bytes()),
        Some((loop_type, start, length)) => {
            body.extend_from_slice(&1u32.to_le_bytes());
            body.extend_from_slice(&16u32.to_le_bytes());
            body.extend_from_slice(&loop_type.to_le_bytes());
            body.extend_from_slice(&start.to_le_bytes());
            body.extend_from_slice(&length.to_le_bytes());
        }
    }
    chunk(b"wsmp", &body)
}

pub fn pcm16_wave(name: &str, rate: u32, frames: &[i16], wsmp: Option<Vec<u8>>) -> Vec<u8> {
    let data: Vec<u8> = frames.iter().flat_map(|s| s.to_le_bytes()).collect();
    raw_wave(name, 1, 16, rate, &data, wsmp)
}

pub fn raw_wave(name: &str, tag: u16, bits: u16, rate: u32, data: &[u8], wsmp: Option<Vec<u8>>) -> Vec<u8> {
    let mut body = fmt_chunk(tag, 1, rate, bits);
    if let Some(wsmp) = wsmp {
        body.extend_from_slice(&wsmp);
    }
    body.extend_from_slice(&chunk(b"data", data));
    body.extend_from_slice(&info_list(name));
    list(b"wave", &body)
}

// --- instruments ----------------------------------------------------

pub fn insh_chunk(regions: u32, bank: u32, program: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&regions.to_le_bytes());
    body.extend_from_slice(&bank.to_le_bytes());
    body.extend_from_slice(&program.to_le_bytes());
    chunk(b"insh", &body)
}

/// Pack a bank dword from MSB/LSB, optionally flagging a drum kit.
pub fn bank_dword(msb: u32, lsb: u32, drums: bool) -> u32 {
    (msb << 8) | lsb | if drums { 0x8000_0000 } else { 0 }
}

pub fn rgnh_chunk(key_lo: u16, key_hi: u16, vel_lo: u16, vel_hi: u16, key_group: u16) -> Vec<u8> {
    let mut body = Vec::new();
    for v in [key_lo, key_hi, vel_lo, vel_hi, 0, key_group] {
        body.extend_from_slice(&v.to_le_bytes());
    }
    chunk(b"rgnh", &body)
}

pub fn wlnk_chunk(sample_index: u32) -> Vec<u8> {
    let mut body = vec![0u8; 8];
    body.extend_from_slice(&sample_index.to_le_bytes());
    chunk(b"wlnk", &body)
}

pub fn art2_chunk(blocks: &[(u16, u16, u16, u16, i32)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&8u32.to_le_bytes());
    body.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
    for &(source, control, destination, transform, scale) in blocks {
        body.extend_from_slice(&source.to_le_bytes());
        body.extend_from_slice(&control.to_le_bytes());
        body.extend_from_slice(&destination.to_le_bytes());
        body.extend_from_slice(&transform.to_le_bytes());
        body.extend_from_slice(&scale.to_le_bytes());
    }
    chunk(b"art2", &body)
}

pub fn lart_list(children: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = children.iter().flatten().copied().collect();
    list(b"lart", &body)
}

pub fn cdl_chunk(program: &[u8]) -> Vec<u8> {
    chunk(b"cdl ", program)
}

/// A CDL program evaluating to a constant.
pub fn cdl_const(value: u32) -> Vec<u8> {
    let mut program = 0x0010u16.to_le_bytes().to_vec();
    program.extend_from_slice(&value.to_le_bytes());
    cdl_chunk(&program)
}

pub fn rgn_list(children: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = children.iter().flatten().copied().collect();
    list(b"rgn ", &body)
}

pub fn ins_list(children: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = children.iter().flatten().copied().collect();
    list(b"ins ", &body)
}

/// One full-range region linked to `sample_index`.
pub fn simple_region(sample_index: u32) -> Vec<u8> {
    rgn_list(&[rgnh_chunk(0, 127, 0, 127, 0), wlnk_chunk(sample_index)])
}

pub struct DlsImage {
    pub name: Option<String>,
    /// Extra chunks spliced in at top level, before the wave pool.
    pub extra_top_level: Vec<Vec<u8>>,
    waves: Vec<Vec<u8>>,
    instruments: Vec<Vec<u8>>,
}

impl DlsImage {
    pub fn new() -> DlsImage {
        DlsImage {
            name: None,
            extra_top_level: Vec::new(),
            waves: Vec::new(),
            instruments: Vec::new(),
        }
    }

    /// Add a serialized `LIST[wave]`, returning its pool index.
    pub fn add_wave(&mut self, wave: Vec<u8>) -> u32 {
        self.waves.push(wave);
        (self.waves.len() - 1) as u32
    }

    /// Add a serialized `LIST[ins ]`.
    pub fn add_instrument(&mut self, ins: Vec<u8>) {
        self.instruments.push(ins);
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();

        let mut colh = Vec::new();
        colh.extend_from_slice(&(self.instruments.len() as u32).to_le_bytes());
        body.extend_from_slice(&chunk(b"colh", &colh));

        let mut ptbl = Vec::new();
        ptbl.extend_from_slice(&8u32.to_le_bytes());
        ptbl.extend_from_slice(&(self.waves.len() as u32).to_le_bytes());
        let mut offset = 0u32;
        for wave in &self.waves {
            ptbl.extend_from_slice(&offset.to_le_bytes());
            offset += wave.len() as u32;
        }
        body.extend_from_slice(&chunk(b"ptbl", &ptbl));

        if let Some(name) = &self.name {
            body.extend_from_slice(&info_list(name));
        }
        for extra in &self.extra_top_level {
            body.extend_from_slice(extra);
        }

        let wvpl: Vec<u8> = self.waves.iter().flatten().copied().collect();
        body.extend_from_slice(&list(b"wvpl", &wvpl));

        let lins: Vec<u8> = self.instruments.iter().flatten().copied().collect();
        body.extend_from_slice(&list(b"lins", &lins));

        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        out.extend_from_slice(b"DLS ");
        out.extend_from_slice(&body);
        out
    }
}

pub fn image_provider(image: &[u8]) -> Arc<MemoryIo> {
    let mut io = MemoryIo::new();
    io.insert(BANK_PATH, image.to_vec());
    Arc::new(io)
}
