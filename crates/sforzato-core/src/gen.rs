//! Synthesis generators.
//!
//! A generator is one scalar knob of the synthesis model (filter cutoff,
//! envelope times, tuning, sample offsets...). Both bank formats resolve
//! into values for this single set of ids at note-on.

/// Generator identifiers, numbered as in SoundFont 2 banks.
///
/// `Pitch` is an engine-internal destination used by pitch-bend style
/// modulators; it never appears in bank files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum GenId {
    StartAddrOfs = 0,
    EndAddrOfs = 1,
    StartLoopAddrOfs = 2,
    EndLoopAddrOfs = 3,
    StartAddrCoarseOfs = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    FilterFc = 8,
    FilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrCoarseOfs = 12,
    ModLfoToVol = 13,
    Unused1 = 14,
    ChorusSend = 15,
    ReverbSend = 16,
    Pan = 17,
    Unused2 = 18,
    Unused3 = 19,
    Unused4 = 20,
    ModLfoDelay = 21,
    ModLfoFreq = 22,
    VibLfoDelay = 23,
    VibLfoFreq = 24,
    ModEnvDelay = 25,
    ModEnvAttack = 26,
    ModEnvHold = 27,
    ModEnvDecay = 28,
    ModEnvSustain = 29,
    ModEnvRelease = 30,
    KeyToModEnvHold = 31,
    KeyToModEnvDecay = 32,
    VolEnvDelay = 33,
    VolEnvAttack = 34,
    VolEnvHold = 35,
    VolEnvDecay = 36,
    VolEnvSustain = 37,
    VolEnvRelease = 38,
    KeyToVolEnvHold = 39,
    KeyToVolEnvDecay = 40,
    Instrument = 41,
    Reserved1 = 42,
    KeyRange = 43,
    VelRange = 44,
    StartLoopAddrCoarseOfs = 45,
    Keynum = 46,
    Velocity = 47,
    Attenuation = 48,
    Reserved2 = 49,
    EndLoopAddrCoarseOfs = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleMode = 54,
    Reserved3 = 55,
    ScaleTune = 56,
    ExclusiveClass = 57,
    OverrideRootKey = 58,
    Pitch = 59,
}

/// Number of generator slots, including the internal `Pitch`.
pub const GEN_COUNT: usize = 60;

/// Highest generator id that may appear in a bank file.
const MAX_BANK_GEN: u16 = GenId::OverrideRootKey as u16;

/// Every generator id in numeric order.
const ALL_GENS: [GenId; GEN_COUNT] = {
    use GenId::*;
    [
        StartAddrOfs,
        EndAddrOfs,
        StartLoopAddrOfs,
        EndLoopAddrOfs,
        StartAddrCoarseOfs,
        ModLfoToPitch,
        VibLfoToPitch,
        ModEnvToPitch,
        FilterFc,
        FilterQ,
        ModLfoToFilterFc,
        ModEnvToFilterFc,
        EndAddrCoarseOfs,
        ModLfoToVol,
        Unused1,
        ChorusSend,
        ReverbSend,
        Pan,
        Unused2,
        Unused3,
        Unused4,
        ModLfoDelay,
        ModLfoFreq,
        VibLfoDelay,
        VibLfoFreq,
        ModEnvDelay,
        ModEnvAttack,
        ModEnvHold,
        ModEnvDecay,
        ModEnvSustain,
        ModEnvRelease,
        KeyToModEnvHold,
        KeyToModEnvDecay,
        VolEnvDelay,
        VolEnvAttack,
        VolEnvHold,
        VolEnvDecay,
        VolEnvSustain,
        VolEnvRelease,
        KeyToVolEnvHold,
        KeyToVolEnvDecay,
        Instrument,
        Reserved1,
        KeyRange,
        VelRange,
        StartLoopAddrCoarseOfs,
        Keynum,
        Velocity,
        Attenuation,
        Reserved2,
        EndLoopAddrCoarseOfs,
        CoarseTune,
        FineTune,
        SampleId,
        SampleMode,
        Reserved3,
        ScaleTune,
        ExclusiveClass,
        OverrideRootKey,
        Pitch,
    ]
};

impl GenId {
    /// Map a raw bank-file id, if it names a generator at all.
    pub fn from_u16(id: u16) -> Option<GenId> {
        ALL_GENS.get(id as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// All generator ids in numeric order.
    pub fn all() -> impl Iterator<Item = GenId> {
        ALL_GENS.iter().copied()
    }

    /// Engine default value, used where neither bank level sets one.
    pub fn default_value(self) -> f32 {
        use GenId::*;
        match self {
            FilterFc => 13500.0,
            ModLfoDelay | VibLfoDelay => -12000.0,
            ModEnvDelay | ModEnvAttack | ModEnvHold | ModEnvDecay | ModEnvRelease => -12000.0,
            VolEnvDelay | VolEnvAttack | VolEnvHold | VolEnvDecay | VolEnvRelease => -12000.0,
            Keynum | Velocity | OverrideRootKey => -1.0,
            ScaleTune => 100.0,
            _ => 0.0,
        }
    }
}

/// Raw generator id acceptance at instrument level. The unused/reserved
/// slots and anything past the bank-file range are rejected; the loaders
/// skip such generators with a warning rather than failing the bank.
pub fn valid_instrument_gen(id: u16) -> bool {
    use GenId::*;
    if id > MAX_BANK_GEN {
        return false;
    }
    !matches!(
        GenId::from_u16(id),
        Some(Unused1 | Unused2 | Unused3 | Unused4 | Reserved1 | Reserved2 | Reserved3)
    )
}

/// Raw generator id acceptance at preset level: everything instrument
/// level rejects, plus the ids that only make sense per instrument
/// (sample offsets, key/velocity overrides, sample mode, exclusive
/// class, root key).
pub fn valid_preset_gen(id: u16) -> bool {
    use GenId::*;
    if !valid_instrument_gen(id) {
        return false;
    }
    !matches!(
        GenId::from_u16(id),
        Some(
            StartAddrOfs
                | EndAddrOfs
                | StartLoopAddrOfs
                | EndLoopAddrOfs
                | StartAddrCoarseOfs
                | EndAddrCoarseOfs
                | StartLoopAddrCoarseOfs
                | EndLoopAddrCoarseOfs
                | Keynum
                | Velocity
                | SampleMode
                | ExclusiveClass
                | OverrideRootKey
        )
    )
}
