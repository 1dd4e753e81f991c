//! Real-time modulators.
//!
//! A modulator routes one or two controller sources, each shaped by a
//! mapping curve, into a generator destination with a scaling amount.
//! Banks declare them per zone; note-on resolution merges the levels
//! (see [`crate::resolve`]).

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;

use crate::error::Result;
use crate::gen::GenId;
use crate::riff::Reader;

/// Mapping curve applied to a modulator source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModCurve {
    Linear,
    Concave,
    Convex,
    Switch,
}

/// General (non-CC) controller indices.
pub mod ctrl {
    pub const NONE: u8 = 0;
    pub const VELOCITY: u8 = 2;
    pub const KEY: u8 = 3;
    pub const KEY_PRESSURE: u8 = 10;
    pub const CHANNEL_PRESSURE: u8 = 13;
    pub const PITCH_WHEEL: u8 = 14;
    pub const PITCH_WHEEL_SENS: u8 = 16;
}

/// One shaped controller input of a modulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModSource {
    /// Controller index: a MIDI CC number when `is_cc`, else one of the
    /// general controllers in [`ctrl`].
    pub index: u8,
    pub is_cc: bool,
    /// Map the controller range downwards (max..min).
    pub negative: bool,
    /// Map to -1..1 instead of 0..1.
    pub bipolar: bool,
    pub curve: ModCurve,
}

impl ModSource {
    /// A source that contributes the constant 1 (no controller).
    pub fn none() -> Self {
        ModSource {
            index: ctrl::NONE,
            is_cc: false,
            negative: false,
            bipolar: false,
            curve: ModCurve::Linear,
        }
    }

    pub fn general(index: u8) -> Self {
        ModSource {
            index,
            ..ModSource::none()
        }
    }

    pub fn cc(index: u8) -> Self {
        ModSource {
            index,
            is_cc: true,
            ..ModSource::none()
        }
    }

    pub fn bipolar(mut self) -> Self {
        self.bipolar = true;
        self
    }

    pub fn negative(mut self) -> Self {
        self.negative = true;
        self
    }

    pub fn curve(mut self, curve: ModCurve) -> Self {
        self.curve = curve;
        self
    }
}

/// A modulator routing, normalized from either bank format.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Modulator {
    pub src1: ModSource,
    pub src2: ModSource,
    pub dest: GenId,
    pub amount: f64,
}

impl Modulator {
    /// Structural identity: everything but the amount. Merging replaces
    /// or sums amounts of structurally identical modulators.
    pub fn same_identity(&self, other: &Modulator) -> bool {
        self.src1 == other.src1 && self.src2 == other.src2 && self.dest == other.dest
    }

    /// Read one 10-byte Format A modulator record.
    ///
    /// Returns `None` for records this engine cannot route: linked
    /// destinations (bit 15 of the destination word) and unknown
    /// destination ids. Records with an out-of-range mapping curve or a
    /// nonzero transform word keep their routing but are neutralized
    /// with a zero amount, matching how a renderer treats them.
    pub fn read_record(reader: &mut Reader<'_>) -> Result<Option<Modulator>> {
        let src1_word = reader.read_u16::<LittleEndian>()?;
        let dest_word = reader.read_u16::<LittleEndian>()?;
        let amount = reader.read_i16::<LittleEndian>()?;
        let src2_word = reader.read_u16::<LittleEndian>()?;
        let trans_word = reader.read_u16::<LittleEndian>()?;

        if dest_word & 0x8000 != 0 {
            warn!("ignoring modulator with linked destination {:#06x}", dest_word);
            return Ok(None);
        }
        let dest = match GenId::from_u16(dest_word) {
            Some(dest) => dest,
            None => {
                warn!("ignoring modulator with unknown destination {}", dest_word);
                return Ok(None);
            }
        };

        let (src1, ok1) = decode_source(src1_word);
        let (src2, ok2) = decode_source(src2_word);
        let mut amount = f64::from(amount);
        if !ok1 || !ok2 {
            // unknown curve type, neutralize
            amount = 0.0;
        }
        if trans_word != 0 {
            // only the linear output transform is defined
            amount = 0.0;
        }

        Ok(Some(Modulator {
            src1,
            src2,
            dest,
            amount,
        }))
    }
}

/// Decode a Format A source descriptor word. The second value is false
/// when the curve-type bits name an undefined curve.
fn decode_source(word: u16) -> (ModSource, bool) {
    let (curve, known) = match (word >> 10) & 0x3f {
        0 => (ModCurve::Linear, true),
        1 => (ModCurve::Concave, true),
        2 => (ModCurve::Convex, true),
        3 => (ModCurve::Switch, true),
        _ => (ModCurve::Linear, false),
    };
    (
        ModSource {
            index: (word & 0x7f) as u8,
            is_cc: word & 0x80 != 0,
            negative: word & 0x100 != 0,
            bipolar: word & 0x200 != 0,
            curve,
        },
        known,
    )
}
