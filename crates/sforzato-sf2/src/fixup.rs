//! Post-parse validation of a raw bank structure.
//!
//! Runs after [`crate::hydra`] has the whole tree in memory: zone links
//! are bounds-checked against their target tables, sample headers are
//! validated against the sample block and repaired or disabled, and the
//! preset list is brought into catalog order.

use log::{debug, warn};

use sforzato_core::error::{LoadError, Result};
use sforzato_core::types::sample_type;

use crate::hydra::{SfFile, SfSample};

/// Validate and repair a freshly parsed bank in place.
pub fn finish(sf: &mut SfFile) -> Result<()> {
    check_links(sf)?;
    fixup_samples(&mut sf.samples, sf.sample_size);
    sf.presets
        .sort_by_key(|p| (u32::from(p.bank) << 16) | u32::from(p.program));
    Ok(())
}

/// Every zone link must point inside its target table. A dangling link
/// rejects the bank; there is no instrument or sample to fall back to.
fn check_links(sf: &SfFile) -> Result<()> {
    for preset in &sf.presets {
        for zone in &preset.zones {
            if let Some(link) = zone.link {
                if usize::from(link) >= sf.insts.len() {
                    return Err(LoadError::InvalidReference {
                        what: "instrument",
                        index: usize::from(link),
                        len: sf.insts.len(),
                    });
                }
            }
        }
    }
    for inst in &sf.insts {
        for zone in &inst.zones {
            if let Some(link) = zone.link {
                if usize::from(link) >= sf.samples.len() {
                    return Err(LoadError::InvalidReference {
                        what: "sample",
                        index: usize::from(link),
                        len: sf.samples.len(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Check sample positions against the sample block and force loop
/// points into the playable range. Samples whose start/end make no
/// sense are disabled rather than failing the bank; mangled loops are
/// clamped, since a disabled loop would change more than the repair.
fn fixup_samples(samples: &mut [SfSample], sample_size: u32) {
    let total_points = sample_size / 2;
    let mut invalid_loops = false;

    for sam in samples.iter_mut() {
        // ROM samples are unreachable for us by definition
        if sam.sample_type & sample_type::ROM != 0 {
            sam.start = 0;
            sam.end = 0;
            sam.loop_start = 0;
            sam.loop_end = 0;
            sam.valid = false;
            continue;
        }

        if sam.end > total_points || sam.start > sam.end.wrapping_sub(4) {
            warn!(
                "sample '{}' start/end positions are invalid, disabling",
                sam.name
            );
            sam.start = 0;
            sam.end = 0;
            sam.loop_start = 0;
            sam.loop_end = 0;
            sam.valid = false;
            continue;
        }

        if sam.sample_type & sample_type::COMPRESSED != 0 {
            // no point checking loops we will never play
            continue;
        }

        let bad_start = sam.loop_start < sam.start || sam.loop_start >= sam.loop_end;
        let bad_end = sam.loop_end > total_points || sam.loop_start >= sam.loop_end;
        let past_end = sam.loop_end > sam.end;

        if bad_start || bad_end || past_end {
            // a loop collapsed to one point is a legal way to disable it
            invalid_loops |= sam.loop_end != sam.loop_start;

            if bad_start {
                debug!(
                    "sample '{}' has unusable loop start {}, setting to sample start {}",
                    sam.name, sam.loop_start, sam.start
                );
                sam.loop_start = sam.start;
            }
            if bad_end {
                debug!(
                    "sample '{}' has unusable loop end {}, setting to sample end {}",
                    sam.name, sam.loop_end, sam.end
                );
                sam.loop_end = sam.end;
            } else if past_end {
                debug!(
                    "sample '{}' loop end {} is past sample end {}, using it anyway",
                    sam.name, sam.loop_end, sam.end
                );
            }
        }
    }

    if invalid_loops {
        warn!("found samples with invalid loops, audible glitches possible");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydra;
    use crate::testutil::{open_image, BankImage};

    fn sample(start: u32, end: u32, loop_start: u32, loop_end: u32) -> SfSample {
        SfSample {
            name: "s".into(),
            start,
            end,
            loop_start,
            loop_end,
            sample_rate: 44100,
            orig_pitch: 60,
            pitch_adj: 0,
            sample_type: sample_type::MONO,
            valid: true,
        }
    }

    #[test]
    fn test_sample_past_block_end_disabled() {
        let mut samples = vec![sample(0, 200, 8, 190)];
        fixup_samples(&mut samples, 100 * 2);
        assert!(!samples[0].valid);
        assert_eq!(samples[0].end, 0);
    }

    #[test]
    fn test_sample_start_after_end_disabled() {
        let mut samples = vec![sample(90, 92, 90, 92)];
        fixup_samples(&mut samples, 100 * 2);
        assert!(!samples[0].valid);
    }

    #[test]
    fn test_rom_sample_disabled() {
        let mut samples = vec![sample(0, 100, 8, 90)];
        samples[0].sample_type |= sample_type::ROM;
        fixup_samples(&mut samples, 100 * 2);
        assert!(!samples[0].valid);
        assert_eq!(samples[0].loop_end, 0);
    }

    #[test]
    fn test_loop_start_clamped_to_sample_start() {
        let mut samples = vec![sample(10, 100, 2, 90)];
        fixup_samples(&mut samples, 100 * 2);
        assert!(samples[0].valid);
        assert_eq!(samples[0].loop_start, 10);
        assert_eq!(samples[0].loop_end, 90);
    }

    #[test]
    fn test_loop_end_clamped_to_sample_end() {
        let mut samples = vec![sample(0, 100, 8, 300)];
        fixup_samples(&mut samples, 100 * 2);
        assert!(samples[0].valid);
        assert_eq!(samples[0].loop_end, 100);
    }

    #[test]
    fn test_loop_end_slightly_past_end_kept() {
        // within the block, past the sample's own end: kept as written
        let mut samples = vec![sample(0, 80, 8, 90)];
        fixup_samples(&mut samples, 100 * 2);
        assert!(samples[0].valid);
        assert_eq!(samples[0].loop_end, 90);
    }

    #[test]
    fn test_good_sample_untouched() {
        let mut samples = vec![sample(10, 110, 18, 100)];
        fixup_samples(&mut samples, 120 * 2);
        assert!(samples[0].valid);
        assert_eq!(
            (samples[0].start, samples[0].end, samples[0].loop_start, samples[0].loop_end),
            (10, 110, 18, 100)
        );
    }

    #[test]
    fn test_dangling_instrument_link_rejected() {
        let mut img = BankImage::new();
        img.add_sine_sample("s", 48);
        img.add_simple_inst("i", 0);
        img.add_simple_preset("p", 0, 0, 7); // no instrument 7
        let mut file = open_image(&img.build());
        let mut sf = hydra::load(&mut *file).unwrap();
        assert!(matches!(
            finish(&mut sf),
            Err(LoadError::InvalidReference {
                what: "instrument",
                index: 7,
                len: 1,
            })
        ));
    }

    #[test]
    fn test_dangling_sample_link_rejected() {
        let mut img = BankImage::new();
        img.add_sine_sample("s", 48);
        img.add_simple_inst("i", 3); // no sample 3
        img.add_simple_preset("p", 0, 0, 0);
        let mut file = open_image(&img.build());
        let mut sf = hydra::load(&mut *file).unwrap();
        assert!(matches!(
            finish(&mut sf),
            Err(LoadError::InvalidReference { what: "sample", .. })
        ));
    }

    #[test]
    fn test_presets_sorted_by_bank_then_program() {
        let mut img = BankImage::new();
        img.add_sine_sample("s", 48);
        img.add_simple_inst("i", 0);
        img.add_simple_preset("b1 p0", 0, 1, 0);
        img.add_simple_preset("b0 p5", 5, 0, 0);
        img.add_simple_preset("b0 p2", 2, 0, 0);
        let mut file = open_image(&img.build());
        let mut sf = hydra::load(&mut *file).unwrap();
        finish(&mut sf).unwrap();
        let order: Vec<&str> = sf.presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, ["b0 p2", "b0 p5", "b1 p0"]);
    }
}
