//! Connection-block conversion into the shared generator/modulator model.
//!
//! A DLS articulation is a list of connection blocks, each routing a
//! source (shaped by a packed transform word) into a destination
//! parameter. Blocks with no live source become generator values;
//! blocks whose source has no modulator equivalent (the LFOs and the
//! modulation envelope) are rewritten onto the dedicated "to pitch" /
//! "to filter" / "to volume" generators; everything else becomes a
//! [`Modulator`].

use log::{debug, warn};

use sforzato_core::gen::{GenId, GEN_COUNT};
use sforzato_core::modulator::{ctrl, ModCurve, ModSource, Modulator};

/// Connection-block source identifiers.
pub mod src {
    pub const NONE: u16 = 0x0000;
    pub const LFO: u16 = 0x0001;
    pub const KEY_ON_VELOCITY: u16 = 0x0002;
    pub const KEY_NUMBER: u16 = 0x0003;
    pub const EG1: u16 = 0x0004;
    pub const EG2: u16 = 0x0005;
    pub const PITCH_WHEEL: u16 = 0x0006;
    pub const POLY_PRESSURE: u16 = 0x0007;
    pub const CHANNEL_PRESSURE: u16 = 0x0008;
    pub const VIBRATO: u16 = 0x0009;

    pub const CC1: u16 = 0x0081;
    pub const CC7: u16 = 0x0087;
    pub const CC10: u16 = 0x008a;
    pub const CC11: u16 = 0x008b;
    pub const CC91: u16 = 0x00db;
    pub const CC93: u16 = 0x00dd;

    pub const RPN0: u16 = 0x0100;
    pub const RPN1: u16 = 0x0101;
    pub const RPN2: u16 = 0x0102;
}

/// Connection-block destination identifiers.
pub mod dst {
    pub const NONE: u16 = 0x0000;
    pub const GAIN: u16 = 0x0001;
    pub const RESERVED: u16 = 0x0002;
    pub const PITCH: u16 = 0x0003;
    pub const PAN: u16 = 0x0004;
    pub const KEY_NUMBER: u16 = 0x0005;

    pub const LEFT: u16 = 0x0010;
    pub const RIGHT_REAR: u16 = 0x0015;
    pub const CHORUS: u16 = 0x0080;
    pub const REVERB: u16 = 0x0081;

    pub const LFO_FREQUENCY: u16 = 0x0104;
    pub const LFO_START_DELAY: u16 = 0x0105;
    pub const VIB_FREQUENCY: u16 = 0x0114;
    pub const VIB_START_DELAY: u16 = 0x0115;

    pub const EG1_ATTACK_TIME: u16 = 0x0206;
    pub const EG1_DECAY_TIME: u16 = 0x0207;
    pub const EG1_RESERVED: u16 = 0x0208;
    pub const EG1_RELEASE_TIME: u16 = 0x0209;
    pub const EG1_SUSTAIN_LEVEL: u16 = 0x020a;
    pub const EG1_DELAY_TIME: u16 = 0x020b;
    pub const EG1_HOLD_TIME: u16 = 0x020c;
    pub const EG1_SHUTDOWN_TIME: u16 = 0x020d;

    pub const EG2_ATTACK_TIME: u16 = 0x030a;
    pub const EG2_DECAY_TIME: u16 = 0x030b;
    pub const EG2_RESERVED: u16 = 0x030c;
    pub const EG2_RELEASE_TIME: u16 = 0x030d;
    pub const EG2_SUSTAIN_LEVEL: u16 = 0x030e;
    pub const EG2_DELAY_TIME: u16 = 0x030f;
    pub const EG2_HOLD_TIME: u16 = 0x0310;

    pub const FILTER_CUTOFF: u16 = 0x0500;
    pub const FILTER_Q: u16 = 0x0501;
}

const TRN_NONE: u16 = 0;

// transform word layout: ssssss'cccccc'oooo
const SRC_INV_MASK: u16 = 0b100000_000000_0000;
const SRC_BIP_MASK: u16 = 0b010000_000000_0000;
const SRC_TRN_MASK: u16 = 0b001111_000000_0000;
const CTL_INV_MASK: u16 = 0b000000_100000_0000;
const CTL_BIP_MASK: u16 = 0b000000_010000_0000;
const CTL_TRN_MASK: u16 = 0b000000_001111_0000;
const OUT_TRN_MASK: u16 = 0b000000_000000_1111;

/// The unpacked sub-fields of a connection block's transform word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Transform {
    pub src_curve: u16,
    pub ctl_curve: u16,
    pub out_curve: u16,
    pub src_invert: bool,
    pub ctl_invert: bool,
    pub src_bipolar: bool,
    pub ctl_bipolar: bool,
}

impl Transform {
    pub fn unpack(word: u16) -> Transform {
        Transform {
            src_curve: (word & SRC_TRN_MASK) >> 10,
            ctl_curve: (word & CTL_TRN_MASK) >> 4,
            out_curve: word & OUT_TRN_MASK,
            src_invert: word & SRC_INV_MASK != 0,
            ctl_invert: word & CTL_INV_MASK != 0,
            src_bipolar: word & SRC_BIP_MASK != 0,
            ctl_bipolar: word & CTL_BIP_MASK != 0,
        }
    }

    pub fn pack(self) -> u16 {
        (self.src_curve << 10)
            | (self.ctl_curve << 4)
            | self.out_curve
            | if self.src_invert { SRC_INV_MASK } else { 0 }
            | if self.ctl_invert { CTL_INV_MASK } else { 0 }
            | if self.src_bipolar { SRC_BIP_MASK } else { 0 }
            | if self.ctl_bipolar { CTL_BIP_MASK } else { 0 }
    }
}

/// Move the control sub-fields of a transform word onto the source.
fn ctl_to_src(word: u16) -> u16 {
    ((word << 6) & (SRC_INV_MASK | SRC_BIP_MASK | SRC_TRN_MASK)) | (word & OUT_TRN_MASK)
}

/// Promote a level-1 articulator transform word to the level-2 layout.
///
/// Level 1 carries one 4-bit curve that applies to both inputs, and
/// has no polarity bits; its LFO sources are implicitly bipolar.
pub fn promote_level1(source: u16, control: u16, word: u16) -> u16 {
    let mut t = Transform::unpack((word << 10) | (word << 4));
    if source == src::LFO || source == src::VIBRATO {
        t.src_bipolar = true;
    }
    if control == src::LFO || control == src::VIBRATO {
        t.ctl_bipolar = true;
    }
    t.pack()
}

fn curve(mode: u16) -> Option<ModCurve> {
    match mode {
        0 => Some(ModCurve::Linear),
        1 => Some(ModCurve::Concave),
        2 => Some(ModCurve::Convex),
        3 => Some(ModCurve::Switch),
        _ => None,
    }
}

/// Map a connection-block source onto a general controller index.
fn general_source(source: u16) -> Option<u8> {
    match source {
        src::NONE => Some(ctrl::NONE),
        src::KEY_ON_VELOCITY => Some(ctrl::VELOCITY),
        src::KEY_NUMBER => Some(ctrl::KEY),
        src::POLY_PRESSURE => Some(ctrl::KEY_PRESSURE),
        src::CHANNEL_PRESSURE => Some(ctrl::CHANNEL_PRESSURE),
        src::PITCH_WHEEL => Some(ctrl::PITCH_WHEEL),
        src::RPN0 => Some(ctrl::PITCH_WHEEL_SENS),
        _ => None,
    }
}

/// Map a connection-block source onto a MIDI CC number.
fn cc_source(source: u16) -> Option<u8> {
    match source {
        src::CC1 => Some(1),
        src::CC7 => Some(7),
        src::CC10 => Some(10),
        src::CC11 => Some(11),
        src::CC91 => Some(91),
        src::CC93 => Some(93),
        _ => None,
    }
}

fn dest_gen(dest: u16) -> Option<GenId> {
    if (dst::LEFT..=dst::RIGHT_REAR).contains(&dest) {
        return None;
    }
    match dest {
        // attenuation = -gain; the caller negates the scale
        dst::GAIN => Some(GenId::Attenuation),
        dst::EG1_SUSTAIN_LEVEL => Some(GenId::VolEnvSustain),
        dst::EG2_SUSTAIN_LEVEL => Some(GenId::ModEnvSustain),
        dst::PITCH => Some(GenId::FineTune),
        dst::PAN => Some(GenId::Pan),
        dst::CHORUS => Some(GenId::ChorusSend),
        dst::REVERB => Some(GenId::ReverbSend),
        dst::LFO_FREQUENCY => Some(GenId::ModLfoFreq),
        dst::LFO_START_DELAY => Some(GenId::ModLfoDelay),
        dst::VIB_FREQUENCY => Some(GenId::VibLfoFreq),
        dst::VIB_START_DELAY => Some(GenId::VibLfoDelay),
        dst::EG1_ATTACK_TIME => Some(GenId::VolEnvAttack),
        dst::EG1_DECAY_TIME => Some(GenId::VolEnvDecay),
        dst::EG1_RELEASE_TIME => Some(GenId::VolEnvRelease),
        dst::EG1_DELAY_TIME => Some(GenId::VolEnvDelay),
        dst::EG1_HOLD_TIME => Some(GenId::VolEnvHold),
        dst::EG2_ATTACK_TIME => Some(GenId::ModEnvAttack),
        dst::EG2_DECAY_TIME => Some(GenId::ModEnvDecay),
        dst::EG2_RELEASE_TIME => Some(GenId::ModEnvRelease),
        dst::EG2_DELAY_TIME => Some(GenId::ModEnvDelay),
        dst::EG2_HOLD_TIME => Some(GenId::ModEnvHold),
        dst::FILTER_CUTOFF => Some(GenId::FilterFc),
        dst::FILTER_Q => Some(GenId::FilterQ),
        _ => None,
    }
}

/// One instrument's or region's converted articulation.
///
/// Generator slots hold absolute values that override the renderer
/// defaults at note-on; unset slots leave the default in place.
#[derive(Clone, Debug)]
pub struct Articulation {
    pub gens: [Option<f64>; GEN_COUNT],
    pub mods: Vec<Modulator>,
}

impl Default for Articulation {
    /// The format's specified defaults: both LFOs at 5 Hz with a
    /// 10 ms delay, and the five standard connections every bank is
    /// entitled to assume.
    fn default() -> Articulation {
        let mut gens: [Option<f64>; GEN_COUNT] = [None; GEN_COUNT];
        gens[GenId::ModLfoFreq.index()] = Some(-851.3179423647571);
        gens[GenId::ModLfoDelay.index()] = Some(-7972.627427729669);
        gens[GenId::VibLfoFreq.index()] = Some(-851.3179423647571);
        gens[GenId::VibLfoDelay.index()] = Some(-7972.627427729669);

        let mods = vec![
            // CC 91 -> reverb send 100%
            Modulator {
                src1: ModSource::cc(91),
                src2: ModSource::none(),
                dest: GenId::ReverbSend,
                amount: 1000.0,
            },
            // CC 93 -> chorus send 100%
            Modulator {
                src1: ModSource::cc(93),
                src2: ModSource::none(),
                dest: GenId::ChorusSend,
                amount: 1000.0,
            },
            // velocity -> filter cutoff, disabled
            Modulator {
                src1: ModSource::general(ctrl::VELOCITY),
                src2: ModSource::none(),
                dest: GenId::FilterFc,
                amount: 0.0,
            },
            // channel pressure -> vibrato depth, disabled
            Modulator {
                src1: ModSource::general(ctrl::CHANNEL_PRESSURE),
                src2: ModSource::none(),
                dest: GenId::VibLfoToPitch,
                amount: 0.0,
            },
            // pitch wheel scaled by RPN 0 -> pitch
            Modulator {
                src1: ModSource::general(ctrl::PITCH_WHEEL).bipolar(),
                src2: ModSource::general(ctrl::PITCH_WHEEL_SENS),
                dest: GenId::FineTune,
                amount: 12800.0,
            },
        ];

        Articulation { gens, mods }
    }
}

impl Articulation {
    /// Convert one connection block and merge it in.
    pub fn add_block(&mut self, source: u16, control: u16, destination: u16, transform: u16, scale_16: i32) {
        match destination {
            // the reserved destinations show up in real banks
            dst::NONE | dst::RESERVED | dst::EG1_RESERVED | dst::EG2_RESERVED => return,
            _ => {}
        }

        let (source, control, transform) = if source == src::NONE && control != src::NONE {
            (control, src::NONE, ctl_to_src(transform))
        } else {
            (source, control, transform)
        };

        match source {
            src::RPN1 => {
                warn!("ignoring connection block with RPN 1 source");
                return;
            }
            src::RPN2 => {
                warn!("ignoring connection block with RPN 2 source");
                return;
            }
            src::EG1 => {
                warn!("ignoring connection block with volume envelope source");
                return;
            }
            _ => {}
        }

        let trans = Transform::unpack(transform);
        let mut scale = f64::from(scale_16) / 65536.0;

        // key number -> key number, linear: this is key scaling, which
        // the generator model expresses in cents per key
        if source == src::KEY_NUMBER && control == src::NONE && destination == dst::KEY_NUMBER && transform == 0 {
            self.gens[GenId::ScaleTune.index()] = Some(scale / 128.0);
            return;
        }

        // LFO and envelope sources have no controller equivalent; route
        // them onto the dedicated generators instead
        if source == src::LFO {
            if !trans.src_bipolar {
                debug!("non-bipolar LFO source is not supported, treating as bipolar");
            }
            if trans.src_invert || trans.src_curve != TRN_NONE {
                warn!("LFO source is inverted or transformed, ignoring the transform");
            }
            match destination {
                dst::PITCH => {
                    return self.add_modulator(GenId::ModLfoToPitch, control, scale, Transform::unpack(ctl_to_src(transform)), src::NONE);
                }
                dst::FILTER_CUTOFF => {
                    return self.add_modulator(GenId::ModLfoToFilterFc, control, scale, Transform::unpack(ctl_to_src(transform)), src::NONE);
                }
                dst::GAIN => {
                    return self.add_modulator(GenId::ModLfoToVol, control, scale, Transform::unpack(ctl_to_src(transform)), src::NONE);
                }
                _ => {}
            }
        } else if source == src::VIBRATO {
            if !trans.src_bipolar {
                debug!("non-bipolar vibrato source is not supported, treating as bipolar");
            }
            if trans.src_invert || trans.src_curve != TRN_NONE {
                warn!("inverted or transformed vibrato source is not supported, ignoring the transform");
            }
            if destination == dst::PITCH {
                return self.add_modulator(GenId::VibLfoToPitch, control, scale, Transform::unpack(ctl_to_src(transform)), src::NONE);
            }
        } else if source == src::EG2 {
            if trans.src_invert || trans.src_bipolar || trans.src_curve != TRN_NONE {
                warn!("modulation envelope source is transformed, ignoring the transform");
            }
            match destination {
                dst::PITCH => {
                    return self.add_modulator(GenId::ModEnvToPitch, control, scale, Transform::unpack(ctl_to_src(transform)), src::NONE);
                }
                dst::FILTER_CUTOFF => {
                    return self.add_modulator(GenId::ModEnvToFilterFc, control, scale, Transform::unpack(ctl_to_src(transform)), src::NONE);
                }
                _ => {}
            }
        }

        if destination == dst::GAIN {
            scale = -scale;
        }

        if destination == dst::EG1_SUSTAIN_LEVEL {
            // generator sustain is attenuation from full level
            let slot = &mut self.gens[GenId::VolEnvSustain.index()];
            *slot = Some(slot.unwrap_or(0.0) + 960.0);
            scale = -scale * 960.0 / 1000.0;
        }

        if destination == dst::EG2_SUSTAIN_LEVEL {
            let slot = &mut self.gens[GenId::ModEnvSustain.index()];
            *slot = Some(slot.unwrap_or(0.0) + 1000.0);
            scale = -scale;
        }

        match dest_gen(destination) {
            Some(gen) => self.add_modulator(gen, source, scale, trans, control),
            None => {
                debug!("ignoring connection block with unsupported destination {destination:#06x}");
            }
        }
    }

    fn add_modulator(&mut self, dest: GenId, source: u16, scale: f64, mut trans: Transform, control: u16) {
        if source == src::NONE && control == src::NONE {
            let slot = &mut self.gens[dest.index()];
            *slot = Some(slot.unwrap_or(0.0) + scale);
            return;
        }

        // output transforms are reserved; when one is set on a block
        // with a plain source and no control, read it as the source
        // transform, otherwise drop it
        if trans.out_curve != TRN_NONE && trans.src_curve == TRN_NONE && control == src::NONE {
            trans.src_curve = trans.out_curve;
            trans.out_curve = TRN_NONE;
        }
        if trans.out_curve != TRN_NONE {
            warn!("output transform in connection block is not supported, treating as linear");
        }

        let mut src1 = match general_source(source).map(ModSource::general).or_else(|| cc_source(source).map(ModSource::cc)) {
            Some(s) => s,
            None => {
                warn!("ignoring connection block with unsupported source {source:#06x}");
                return;
            }
        };
        let mut src2 = match general_source(control).map(ModSource::general).or_else(|| cc_source(control).map(ModSource::cc)) {
            Some(s) => s,
            None => {
                warn!("ignoring connection block with unsupported control source {control:#06x}");
                return;
            }
        };

        if src1.index != ctrl::NONE {
            src1.bipolar = trans.src_bipolar;
            src1.negative = trans.src_invert;
            src1.curve = match curve(trans.src_curve) {
                Some(c) => c,
                None => {
                    warn!("invalid transform curve in connection block, ignoring it");
                    return;
                }
            };
        }
        if src2.index != ctrl::NONE {
            src2.bipolar = trans.ctl_bipolar;
            src2.negative = trans.ctl_invert;
            src2.curve = match curve(trans.ctl_curve) {
                Some(c) => c,
                None => {
                    warn!("invalid transform curve in connection block, ignoring it");
                    return;
                }
            };
        }

        let new = Modulator {
            src1,
            src2,
            dest,
            amount: scale,
        };
        for existing in &mut self.mods {
            if existing.same_identity(&new) {
                existing.amount += new.amount;
                return;
            }
        }
        self.mods.push(new);
    }
}
