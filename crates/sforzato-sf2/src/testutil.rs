//! In-memory Format A bank images for tests.
//!
//! Hydra tables are buffered separately and assembled in `build`, so
//! tests can push records in any order and splice in malformed ones.

use std::path::Path;
use std::sync::Arc;

use sforzato_core::gen::GenId;
use sforzato_core::io::{IoHandle, IoProvider, MemoryIo};

pub const BANK_PATH: &str = "/bank.sf2";

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len() + 1);
    out.extend_from_slice(id);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 != 0 {
        out.push(0);
    }
    out
}

fn list(form: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut inner = form.to_vec();
    inner.extend_from_slice(body);
    chunk(b"LIST", &inner)
}

fn fixed_str(name: &str, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let bytes = name.as_bytes();
    let n = bytes.len().min(len - 1);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

pub struct BankImage {
    pub version: (u16, u16),
    pub name: Option<String>,
    samples: Vec<i16>,
    phdr: Vec<u8>,
    pbag: Vec<u8>,
    pmod: Vec<u8>,
    pgen: Vec<u8>,
    inst: Vec<u8>,
    ibag: Vec<u8>,
    imod: Vec<u8>,
    igen: Vec<u8>,
    shdr: Vec<u8>,
    preset_terminated: bool,
    inst_terminated: bool,
}

impl BankImage {
    pub fn new() -> BankImage {
        BankImage {
            version: (2, 1),
            name: None,
            samples: Vec::new(),
            phdr: Vec::new(),
            pbag: Vec::new(),
            pmod: Vec::new(),
            pgen: Vec::new(),
            inst: Vec::new(),
            ibag: Vec::new(),
            imod: Vec::new(),
            igen: Vec::new(),
            shdr: Vec::new(),
            preset_terminated: false,
            inst_terminated: false,
        }
    }

    // --- sample block -------------------------------------------------

    pub fn append_samples(&mut self, data: &[i16]) -> u32 {
        let start = self.samples.len() as u32;
        self.samples.extend_from_slice(data);
        start
    }

    #[allow(clippy::too_many_arguments)]
    pub fn shdr(
        &mut self,
        name: &str,
        start: u32,
        end: u32,
        loop_start: u32,
        loop_end: u32,
        rate: u32,
        pitch: u8,
        adj: i8,
        typ: u16,
    ) {
        self.shdr.extend_from_slice(&fixed_str(name, 20));
        self.shdr.extend_from_slice(&start.to_le_bytes());
        self.shdr.extend_from_slice(&end.to_le_bytes());
        self.shdr.extend_from_slice(&loop_start.to_le_bytes());
        self.shdr.extend_from_slice(&loop_end.to_le_bytes());
        self.shdr.extend_from_slice(&rate.to_le_bytes());
        self.shdr.push(pitch);
        self.shdr.push(adj as u8);
        self.shdr.extend_from_slice(&0u16.to_le_bytes()); // link
        self.shdr.extend_from_slice(&typ.to_le_bytes());
    }

    /// Append `frames` points of a sine wave and register a valid
    /// header over them, with a loop pulled in 8 points on each side.
    pub fn add_sine_sample(&mut self, name: &str, frames: u32) -> u16 {
        let data: Vec<i16> = (0..frames)
            .map(|i| ((i as f32 * 0.3).sin() * 8000.0) as i16)
            .collect();
        let start = self.append_samples(&data);
        let index = (self.shdr.len() / 46) as u16;
        self.shdr(
            name,
            start,
            start + frames,
            start + 8,
            start + frames - 8,
            44100,
            60,
            0,
            1,
        );
        index
    }

    // --- preset tables ------------------------------------------------

    pub fn phdr(&mut self, name: &str, program: u16, bank: u16, bagndx: u16) {
        self.phdr.extend_from_slice(&fixed_str(name, 20));
        self.phdr.extend_from_slice(&program.to_le_bytes());
        self.phdr.extend_from_slice(&bank.to_le_bytes());
        self.phdr.extend_from_slice(&bagndx.to_le_bytes());
        self.phdr.extend_from_slice(&[0u8; 12]); // library, genre, morphology
    }

    pub fn pbag(&mut self, genndx: u16, modndx: u16) {
        self.pbag.extend_from_slice(&genndx.to_le_bytes());
        self.pbag.extend_from_slice(&modndx.to_le_bytes());
    }

    pub fn pmod(&mut self, src: u16, dest: u16, amount: i16, amtsrc: u16, trans: u16) {
        for w in [src, dest, amount as u16, amtsrc, trans] {
            self.pmod.extend_from_slice(&w.to_le_bytes());
        }
    }

    pub fn pgen_i16(&mut self, id: GenId, value: i16) {
        self.pgen.extend_from_slice(&(id as u16).to_le_bytes());
        self.pgen.extend_from_slice(&value.to_le_bytes());
    }

    pub fn pgen_range(&mut self, id: GenId, lo: u8, hi: u8) {
        self.pgen.extend_from_slice(&(id as u16).to_le_bytes());
        self.pgen.push(lo);
        self.pgen.push(hi);
    }

    pub fn pgen_link(&mut self, id: GenId, index: u16) {
        self.pgen.extend_from_slice(&(id as u16).to_le_bytes());
        self.pgen.extend_from_slice(&index.to_le_bytes());
    }

    /// Terminal preset records with an explicit terminal bag entry.
    pub fn terminate_preset(&mut self, genndx: u16, modndx: u16) {
        let bags = (self.pbag.len() / 4) as u16;
        self.phdr(&String::new(), 0, 0, bags);
        self.pbag(genndx, modndx);
        self.pmod(0, 0, 0, 0, 0);
        self.pgen_i16(GenId::StartAddrOfs, 0);
        self.preset_terminated = true;
    }

    /// One preset with a single zone linking `inst`, full range.
    pub fn add_simple_preset(&mut self, name: &str, program: u16, bank: u16, inst: u16) {
        let bags = (self.pbag.len() / 4) as u16;
        let gens = (self.pgen.len() / 4) as u16;
        let mods = (self.pmod.len() / 10) as u16;
        self.phdr(name, program, bank, bags);
        self.pbag(gens, mods);
        self.pgen_link(GenId::Instrument, inst);
    }

    // --- instrument tables --------------------------------------------

    pub fn ihdr(&mut self, name: &str, bagndx: u16) {
        self.inst.extend_from_slice(&fixed_str(name, 20));
        self.inst.extend_from_slice(&bagndx.to_le_bytes());
    }

    pub fn ibag(&mut self, genndx: u16, modndx: u16) {
        self.ibag.extend_from_slice(&genndx.to_le_bytes());
        self.ibag.extend_from_slice(&modndx.to_le_bytes());
    }

    pub fn imod(&mut self, src: u16, dest: u16, amount: i16, amtsrc: u16, trans: u16) {
        for w in [src, dest, amount as u16, amtsrc, trans] {
            self.imod.extend_from_slice(&w.to_le_bytes());
        }
    }

    pub fn igen_i16(&mut self, id: GenId, value: i16) {
        self.igen.extend_from_slice(&(id as u16).to_le_bytes());
        self.igen.extend_from_slice(&value.to_le_bytes());
    }

    pub fn igen_range(&mut self, id: GenId, lo: u8, hi: u8) {
        self.igen.extend_from_slice(&(id as u16).to_le_bytes());
        self.igen.push(lo);
        self.igen.push(hi);
    }

    pub fn igen_link(&mut self, id: GenId, index: u16) {
        self.igen.extend_from_slice(&(id as u16).to_le_bytes());
        self.igen.extend_from_slice(&index.to_le_bytes());
    }

    pub fn terminate_inst(&mut self, genndx: u16, modndx: u16) {
        self.terminate_inst_without_gen_terminal(genndx, modndx);
        self.igen_i16(GenId::StartAddrOfs, 0);
    }

    /// Terminal instrument records, but no terminal generator record.
    /// Some bank writers omit it.
    pub fn terminate_inst_without_gen_terminal(&mut self, genndx: u16, modndx: u16) {
        let bags = (self.ibag.len() / 4) as u16;
        self.ihdr(&String::new(), bags);
        self.ibag(genndx, modndx);
        self.imod(0, 0, 0, 0, 0);
        self.inst_terminated = true;
    }

    /// One instrument with a single zone playing `sample`, full range.
    pub fn add_simple_inst(&mut self, name: &str, sample: u16) {
        let bags = (self.ibag.len() / 4) as u16;
        let gens = (self.igen.len() / 4) as u16;
        let mods = (self.imod.len() / 10) as u16;
        self.ihdr(name, bags);
        self.ibag(gens, mods);
        self.igen_link(GenId::SampleId, sample);
    }

    // --- assembly -----------------------------------------------------

    pub fn build(&mut self) -> Vec<u8> {
        if !self.preset_terminated {
            let gens = (self.pgen.len() / 4) as u16;
            let mods = (self.pmod.len() / 10) as u16;
            self.terminate_preset(gens, mods);
        }
        if !self.inst_terminated {
            let gens = (self.igen.len() / 4) as u16;
            let mods = (self.imod.len() / 10) as u16;
            self.terminate_inst(gens, mods);
        }
        let shdr_terminal = fixed_str("EOS", 20)
            .into_iter()
            .chain([0u8; 26])
            .collect::<Vec<u8>>();

        let mut info = Vec::new();
        let mut ifil = Vec::new();
        ifil.extend_from_slice(&self.version.0.to_le_bytes());
        ifil.extend_from_slice(&self.version.1.to_le_bytes());
        info.extend_from_slice(&chunk(b"ifil", &ifil));
        if let Some(name) = &self.name {
            let mut text = name.as_bytes().to_vec();
            text.push(0);
            if text.len() % 2 != 0 {
                text.push(0);
            }
            info.extend_from_slice(&chunk(b"INAM", &text));
        }

        let sample_bytes: Vec<u8> = self
            .samples
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let sdta = chunk(b"smpl", &sample_bytes);

        let mut pdta = Vec::new();
        pdta.extend_from_slice(&chunk(b"phdr", &self.phdr));
        pdta.extend_from_slice(&chunk(b"pbag", &self.pbag));
        pdta.extend_from_slice(&chunk(b"pmod", &self.pmod));
        pdta.extend_from_slice(&chunk(b"pgen", &self.pgen));
        pdta.extend_from_slice(&chunk(b"inst", &self.inst));
        pdta.extend_from_slice(&chunk(b"ibag", &self.ibag));
        pdta.extend_from_slice(&chunk(b"imod", &self.imod));
        pdta.extend_from_slice(&chunk(b"igen", &self.igen));
        let mut shdr = self.shdr.clone();
        shdr.extend_from_slice(&shdr_terminal);
        pdta.extend_from_slice(&chunk(b"shdr", &shdr));

        let mut body = Vec::new();
        body.extend_from_slice(&list(b"INFO", &info));
        body.extend_from_slice(&list(b"sdta", &sdta));
        body.extend_from_slice(&list(b"pdta", &pdta));

        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
        out.extend_from_slice(b"sfbk");
        out.extend_from_slice(&body);
        out
    }
}

/// An open handle over a bank image.
pub fn open_image(data: &[u8]) -> Box<dyn IoHandle> {
    let mut io = MemoryIo::new();
    io.insert(BANK_PATH, data.to_vec());
    io.open(Path::new(BANK_PATH)).unwrap()
}

/// A provider holding a bank image under [`BANK_PATH`].
pub fn image_provider(data: &[u8]) -> Arc<MemoryIo> {
    let mut io = MemoryIo::new();
    io.insert(BANK_PATH, data.to_vec());
    Arc::new(io)
}
