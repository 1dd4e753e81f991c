//! Note-on parameter resolution.
//!
//! At note-on every matching instrument zone becomes one voice. Its
//! flat generator array is built by a strict precedence law:
//!
//! - instrument level *overrides*: local zone value, else the
//!   instrument's global zone value, else the engine default
//! - preset level *adds*: local preset zone value, else the preset's
//!   global zone value, contributed as a relative offset
//!
//! Modulators merge by structural identity instead: at each level a
//! local modulator replaces an identical global one, and a preset
//! modulator folds into an identical instrument one by summing amounts.

use std::sync::Arc;

use log::warn;

use crate::gen::{GenId, GEN_COUNT};
use crate::modulator::Modulator;
use crate::types::{Preset, Sample, Zone};

/// Most modulators one voice can carry; merging drops the excess.
pub const MAX_VOICE_MODS: usize = 64;

/// Everything a renderer needs to start one voice, minus sample data.
#[derive(Clone, Debug)]
pub struct VoiceSpec {
    pub gens: [f32; GEN_COUNT],
    pub mods: Vec<Modulator>,
    pub sample: Arc<Sample>,
}

/// Resolve a note-on against a preset. Voices are produced for every
/// instrument zone whose window matches, gated also by the enclosing
/// preset zone's window. Zones over invalid samples stay silent.
pub fn preset_noteon(preset: &Preset, key: u8, vel: u8) -> Vec<VoiceSpec> {
    let mut voices = Vec::new();

    for pzone in &preset.zones {
        if !pzone.zone.range.contains(key, vel) {
            continue;
        }
        let inst = &pzone.instrument;
        for izone in &inst.zones {
            if !izone.sample.valid || !izone.zone.range.contains(key, vel) {
                continue;
            }
            let gens = resolve_gens(
                inst.global.as_ref(),
                &izone.zone,
                preset.global.as_ref(),
                &pzone.zone,
            );
            let inst_mods = merge_zone_mods(inst.global.as_ref(), &izone.zone);
            let preset_mods = merge_zone_mods(preset.global.as_ref(), &pzone.zone);
            let mods = merge_voice_mods(inst_mods, &preset_mods);
            voices.push(VoiceSpec {
                gens,
                mods,
                sample: izone.sample.clone(),
            });
        }
    }

    voices
}

/// Build the flat generator array for one instrument zone under one
/// preset zone.
pub fn resolve_gens(
    inst_global: Option<&Zone>,
    inst_zone: &Zone,
    preset_global: Option<&Zone>,
    preset_zone: &Zone,
) -> [f32; GEN_COUNT] {
    let mut gens = [0.0f32; GEN_COUNT];

    for id in GenId::all() {
        let base = inst_zone
            .gen(id)
            .or_else(|| inst_global.and_then(|z| z.gen(id)))
            .unwrap_or_else(|| id.default_value());
        let offset = preset_zone
            .gen(id)
            .or_else(|| preset_global.and_then(|z| z.gen(id)))
            .unwrap_or(0.0);
        gens[id.index()] = base + offset;
    }

    gens
}

/// Merge one level's global and local modulator lists. Locals replace
/// structurally identical globals in place; the rest append.
pub fn merge_zone_mods(global: Option<&Zone>, local: &Zone) -> Vec<Modulator> {
    let mut list: Vec<Modulator> = Vec::new();
    if let Some(g) = global {
        for m in &g.mods {
            push_capped(&mut list, *m);
        }
    }
    for m in &local.mods {
        if let Some(slot) = list.iter_mut().find(|x| x.same_identity(m)) {
            *slot = *m;
        } else {
            push_capped(&mut list, *m);
        }
    }
    list
}

/// Fold preset-level modulators into the instrument-level list. A
/// preset modulator with zero amount contributes nothing; one identical
/// to an instrument modulator adds its amount; the rest append.
pub fn merge_voice_mods(inst: Vec<Modulator>, preset: &[Modulator]) -> Vec<Modulator> {
    let mut list = inst;
    for m in preset {
        if m.amount == 0.0 {
            continue;
        }
        if let Some(slot) = list.iter_mut().find(|x| x.same_identity(m)) {
            slot.amount += m.amount;
        } else {
            push_capped(&mut list, *m);
        }
    }
    list
}

fn push_capped(list: &mut Vec<Modulator>, m: Modulator) {
    if list.len() >= MAX_VOICE_MODS {
        warn!("voice modulator list full, dropping modulator for {:?}", m.dest);
        return;
    }
    list.push(m);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulator::{ctrl, ModSource};
    use crate::types::{InstZone, Instrument, KeyVelRange, PresetZone};

    fn sample() -> Arc<Sample> {
        let mut s = Sample::new("s".into());
        s.end = 1000;
        s.loop_end = 1000;
        Arc::new(s)
    }

    fn zone_with(gens: &[(GenId, f32)]) -> Zone {
        Zone {
            gens: gens.to_vec(),
            ..Zone::default()
        }
    }

    fn one_zone_preset(
        inst_global: Option<Zone>,
        inst_zone: Zone,
        preset_global: Option<Zone>,
        preset_zone: Zone,
    ) -> Preset {
        let inst = Arc::new(Instrument {
            name: "i".into(),
            global: inst_global,
            zones: vec![InstZone {
                zone: inst_zone,
                sample: sample(),
            }],
        });
        Preset {
            name: "p".into(),
            bank: 0,
            program: 0,
            global: preset_global,
            zones: vec![PresetZone {
                zone: preset_zone,
                instrument: inst,
            }],
        }
    }

    #[test]
    fn test_instrument_local_overrides_global_overrides_default() {
        let p = one_zone_preset(
            Some(zone_with(&[(GenId::FilterFc, 9000.0), (GenId::Pan, 50.0)])),
            zone_with(&[(GenId::FilterFc, 5000.0)]),
            None,
            Zone::default(),
        );
        let v = preset_noteon(&p, 60, 100);
        assert_eq!(v.len(), 1);
        // local beats global
        assert_eq!(v[0].gens[GenId::FilterFc.index()], 5000.0);
        // global beats default
        assert_eq!(v[0].gens[GenId::Pan.index()], 50.0);
        // untouched ids keep the engine default
        assert_eq!(v[0].gens[GenId::ScaleTune.index()], 100.0);
    }

    #[test]
    fn test_preset_level_adds() {
        let p = one_zone_preset(
            None,
            zone_with(&[(GenId::Attenuation, 100.0)]),
            Some(zone_with(&[(GenId::FineTune, 7.0)])),
            zone_with(&[(GenId::Attenuation, 25.0)]),
        );
        let v = preset_noteon(&p, 60, 100);
        assert_eq!(v[0].gens[GenId::Attenuation.index()], 125.0);
        // preset global adds onto the instrument-level result too
        assert_eq!(v[0].gens[GenId::FineTune.index()], 7.0);
        // preset offsets stack on the engine default
        assert_eq!(v[0].gens[GenId::FilterFc.index()], 13500.0);
    }

    #[test]
    fn test_zone_windows_gate_voices() {
        let mut inst_zone = Zone::default();
        inst_zone.range = KeyVelRange {
            key_lo: 0,
            key_hi: 60,
            vel_lo: 0,
            vel_hi: 127,
        };
        let mut preset_zone = Zone::default();
        preset_zone.range = KeyVelRange {
            key_lo: 50,
            key_hi: 127,
            vel_lo: 0,
            vel_hi: 127,
        };
        let p = one_zone_preset(None, inst_zone, None, preset_zone);
        assert_eq!(preset_noteon(&p, 55, 64).len(), 1);
        // inside the preset window but outside the instrument window
        assert_eq!(preset_noteon(&p, 70, 64).len(), 0);
        // inside the instrument window but outside the preset window
        assert_eq!(preset_noteon(&p, 40, 64).len(), 0);
    }

    #[test]
    fn test_invalid_sample_is_silent() {
        let mut s = Sample::new("s".into());
        s.valid = false;
        let inst = Arc::new(Instrument {
            name: "i".into(),
            global: None,
            zones: vec![InstZone {
                zone: Zone::default(),
                sample: Arc::new(s),
            }],
        });
        let p = Preset {
            zones: vec![PresetZone {
                zone: Zone::default(),
                instrument: inst,
            }],
            ..Preset::default()
        };
        assert!(preset_noteon(&p, 60, 100).is_empty());
    }

    fn vel_mod(amount: f64) -> Modulator {
        Modulator {
            src1: ModSource::general(ctrl::VELOCITY).negative(),
            src2: ModSource::none(),
            dest: GenId::Attenuation,
            amount,
        }
    }

    #[test]
    fn test_local_mod_replaces_identical_global() {
        let global = Zone {
            mods: vec![vel_mod(960.0)],
            ..Zone::default()
        };
        let local = Zone {
            mods: vec![vel_mod(100.0)],
            ..Zone::default()
        };
        let merged = merge_zone_mods(Some(&global), &local);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].amount, 100.0);
    }

    #[test]
    fn test_preset_mod_amount_adds() {
        let inst = vec![vel_mod(100.0)];
        let preset = [vel_mod(50.0)];
        let merged = merge_voice_mods(inst, &preset);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].amount, 150.0);
    }

    #[test]
    fn test_zero_amount_preset_mod_is_skipped() {
        let mut other = vel_mod(0.0);
        other.dest = GenId::FilterFc;
        let merged = merge_voice_mods(Vec::new(), &[other]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_mod_list_is_capped() {
        let mut local = Zone::default();
        for i in 0..(MAX_VOICE_MODS + 10) {
            let mut m = vel_mod(1.0);
            m.src2 = ModSource::cc(i as u8); // distinct identities
            local.mods.push(m);
        }
        let merged = merge_zone_mods(None, &local);
        assert_eq!(merged.len(), MAX_VOICE_MODS);
    }
}
