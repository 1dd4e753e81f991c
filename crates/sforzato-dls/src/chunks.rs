//! Chunk ids used by the DLS container.

use sforzato_core::riff::FourCc;

pub const DLS: FourCc = FourCc::new(b"DLS ");

// leaf chunks
pub const DLID: FourCc = FourCc::new(b"dlid");
pub const CDL: FourCc = FourCc::new(b"cdl ");
pub const PTBL: FourCc = FourCc::new(b"ptbl");
pub const VERS: FourCc = FourCc::new(b"vers");
pub const COLH: FourCc = FourCc::new(b"colh");
pub const INSH: FourCc = FourCc::new(b"insh");
pub const WSMP: FourCc = FourCc::new(b"wsmp");
pub const FMT: FourCc = FourCc::new(b"fmt ");
pub const DATA: FourCc = FourCc::new(b"data");
pub const ART1: FourCc = FourCc::new(b"art1");
pub const ART2: FourCc = FourCc::new(b"art2");
pub const RGNH: FourCc = FourCc::new(b"rgnh");
pub const WLNK: FourCc = FourCc::new(b"wlnk");

// list forms
pub const INFO: FourCc = FourCc::new(b"INFO");
pub const LINS: FourCc = FourCc::new(b"lins");
pub const WVPL: FourCc = FourCc::new(b"wvpl");
pub const INS: FourCc = FourCc::new(b"ins ");
pub const WAVE: FourCc = FourCc::new(b"wave");
pub const LART: FourCc = FourCc::new(b"lart");
pub const LRGN: FourCc = FourCc::new(b"lrgn");
pub const LAR2: FourCc = FourCc::new(b"lar2");
pub const RGN: FourCc = FourCc::new(b"rgn ");
pub const RGN2: FourCc = FourCc::new(b"rgn2");

// recognized but not interpreted
pub const FACT: FourCc = FourCc::new(b"fact");
pub const CUE: FourCc = FourCc::new(b"cue ");
// a second spelling of 'dlid' seen inside LIST[wave]
pub const GUID: FourCc = FourCc::new(b"guid");

pub const INAM: FourCc = FourCc::new(b"INAM");
