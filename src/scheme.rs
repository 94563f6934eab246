//! Set scheme resolver
//!
//! Structures a resolved load into ordered prescribed sets. Rounding to the
//! program increment happens here, once per emitted set, after any per-set
//! percentage math.
//!
//! Mrs, FatigueDrop and TotalReps are session-length-variable: how many sets
//! actually happen depends on live performance, so resolution emits a single
//! seed set plus a textual target rather than pretending to know the count.

use rust_decimal::Decimal;

use crate::models::program::SetScheme;
use crate::models::workout::PrescribedSet;
use crate::rounding::round_to_increment;
use crate::strategy::ResolvedLoad;

pub fn resolve_scheme(
    scheme: &SetScheme,
    load: &ResolvedLoad,
    rounding_increment: Decimal,
) -> Vec<PrescribedSet> {
    let weight = match load {
        ResolvedLoad::Weight(w) => *w,
        // Discovery work carries no computed weight regardless of scheme
        ResolvedLoad::Discover { target_reps } => {
            return vec![PrescribedSet {
                set_number: 1,
                weight: None,
                target_reps: Some(*target_reps),
                is_work_set: true,
                is_amrap: false,
                note: Some(format!("work up to a {}-rep max", target_reps)),
            }];
        }
    };
    let rounded = round_to_increment(weight, rounding_increment);

    match scheme {
        SetScheme::Fixed { sets, reps } => (1..=*sets)
            .map(|n| PrescribedSet {
                set_number: n,
                weight: Some(rounded),
                target_reps: Some(*reps),
                is_work_set: true,
                is_amrap: false,
                note: None,
            })
            .collect(),

        SetScheme::Ramp { percentages, reps } => percentages
            .iter()
            .enumerate()
            .map(|(i, pct)| PrescribedSet {
                set_number: i as u32 + 1,
                weight: Some(round_to_increment(weight * *pct, rounding_increment)),
                target_reps: Some(*reps),
                // The ramp works up to the top single work set
                is_work_set: i == percentages.len() - 1,
                is_amrap: false,
                note: None,
            })
            .collect(),

        SetScheme::TopBackoff {
            top_sets,
            top_reps,
            backoff_sets,
            backoff_reps,
            backoff_percent,
        } => {
            let backoff_weight =
                round_to_increment(weight * *backoff_percent, rounding_increment);
            let mut sets = Vec::with_capacity((*top_sets + *backoff_sets) as usize);
            for n in 1..=*top_sets {
                sets.push(PrescribedSet {
                    set_number: n,
                    weight: Some(rounded),
                    target_reps: Some(*top_reps),
                    is_work_set: true,
                    is_amrap: false,
                    note: None,
                });
            }
            for n in 1..=*backoff_sets {
                sets.push(PrescribedSet {
                    set_number: top_sets + n,
                    weight: Some(backoff_weight),
                    target_reps: Some(*backoff_reps),
                    is_work_set: true,
                    is_amrap: false,
                    note: None,
                });
            }
            sets
        }

        SetScheme::Amrap { sets, min_reps } => (1..=*sets)
            .map(|n| {
                let last = n == *sets;
                PrescribedSet {
                    set_number: n,
                    weight: Some(rounded),
                    target_reps: Some(*min_reps),
                    is_work_set: true,
                    is_amrap: last,
                    note: last.then(|| format!("{}+ reps, as many as possible", min_reps)),
                }
            })
            .collect(),

        SetScheme::Mrs { initial_reps, max_sets } => vec![PrescribedSet {
            set_number: 1,
            weight: Some(rounded),
            target_reps: Some(*initial_reps),
            is_work_set: true,
            is_amrap: false,
            note: Some(format!(
                "max-rep sets: repeat until reps drop, up to {} sets",
                max_sets
            )),
        }],

        SetScheme::FatigueDrop { drop_percent, stop_rpe } => vec![PrescribedSet {
            set_number: 1,
            weight: Some(rounded),
            target_reps: None,
            is_work_set: true,
            is_amrap: false,
            note: Some(format!(
                "drop {}% each set, stop when a set reaches RPE {}",
                (*drop_percent * Decimal::from(100u32)).normalize(),
                stop_rpe
            )),
        }],

        SetScheme::TotalReps { target } => vec![PrescribedSet {
            set_number: 1,
            weight: Some(rounded),
            target_reps: None,
            is_work_set: true,
            is_amrap: false,
            note: Some(format!("accumulate {} total reps in as many sets as needed", target)),
        }],
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fixed_emits_identical_work_sets() {
        let sets = resolve_scheme(
            &SetScheme::Fixed { sets: 5, reps: 5 },
            &ResolvedLoad::Weight(dec!(100)),
            dec!(2.5),
        );
        assert_eq!(sets.len(), 5);
        for (i, set) in sets.iter().enumerate() {
            assert_eq!(set.set_number, i as u32 + 1);
            assert_eq!(set.weight, Some(dec!(100)));
            assert_eq!(set.target_reps, Some(5));
            assert!(set.is_work_set);
            assert!(!set.is_amrap);
        }
    }

    #[test]
    fn test_ramp_rounds_each_set_independently() {
        let sets = resolve_scheme(
            &SetScheme::Ramp {
                percentages: vec![dec!(0.5), dec!(0.65), dec!(0.75), dec!(0.88), dec!(1.0)],
                reps: 5,
            },
            &ResolvedLoad::Weight(dec!(200)),
            dec!(2.5),
        );
        let weights: Vec<_> = sets.iter().map(|s| s.weight.unwrap()).collect();
        assert_eq!(
            weights,
            vec![dec!(100), dec!(130), dec!(150), dec!(175), dec!(200)]
        );
        assert!(sets.last().unwrap().is_work_set);
        assert!(!sets[0].is_work_set);
    }

    #[test]
    fn test_top_backoff_structure() {
        let sets = resolve_scheme(
            &SetScheme::TopBackoff {
                top_sets: 1,
                top_reps: 3,
                backoff_sets: 3,
                backoff_reps: 6,
                backoff_percent: dec!(0.85),
            },
            &ResolvedLoad::Weight(dec!(180)),
            dec!(2.5),
        );
        assert_eq!(sets.len(), 4);
        assert_eq!(sets[0].weight, Some(dec!(180)));
        assert_eq!(sets[0].target_reps, Some(3));
        // 180 * 0.85 = 153 -> 152.5
        for set in &sets[1..] {
            assert_eq!(set.weight, Some(dec!(152.5)));
            assert_eq!(set.target_reps, Some(6));
        }
        assert_eq!(sets[3].set_number, 4);
    }

    #[test]
    fn test_amrap_marks_only_final_set_open_ended() {
        let sets = resolve_scheme(
            &SetScheme::Amrap { sets: 3, min_reps: 5 },
            &ResolvedLoad::Weight(dec!(120)),
            dec!(2.5),
        );
        assert_eq!(sets.len(), 3);
        assert!(!sets[0].is_amrap);
        assert!(!sets[1].is_amrap);
        assert!(sets[2].is_amrap);
        assert_eq!(sets[2].target_reps, Some(5));
        assert!(sets[2].note.as_deref().unwrap().contains("5+"));
    }

    #[test]
    fn test_session_variable_schemes_emit_one_seed_set() {
        let mrs = resolve_scheme(
            &SetScheme::Mrs { initial_reps: 8, max_sets: 5 },
            &ResolvedLoad::Weight(dec!(100)),
            dec!(2.5),
        );
        assert_eq!(mrs.len(), 1);
        assert_eq!(mrs[0].target_reps, Some(8));
        assert!(mrs[0].note.as_deref().unwrap().contains("5 sets"));

        let drop = resolve_scheme(
            &SetScheme::FatigueDrop { drop_percent: dec!(0.1), stop_rpe: dec!(9) },
            &ResolvedLoad::Weight(dec!(100)),
            dec!(2.5),
        );
        assert_eq!(drop.len(), 1);
        assert_eq!(drop[0].target_reps, None);
        assert!(drop[0].note.as_deref().unwrap().contains("drop 10%"));

        let total = resolve_scheme(
            &SetScheme::TotalReps { target: 50 },
            &ResolvedLoad::Weight(dec!(60)),
            dec!(2.5),
        );
        assert_eq!(total.len(), 1);
        assert_eq!(total[0].target_reps, None);
        assert!(total[0].note.as_deref().unwrap().contains("50 total reps"));
    }

    #[test]
    fn test_discovery_load_overrides_scheme() {
        let sets = resolve_scheme(
            &SetScheme::Fixed { sets: 5, reps: 5 },
            &ResolvedLoad::Discover { target_reps: 3 },
            dec!(2.5),
        );
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].weight, None);
        assert_eq!(sets[0].target_reps, Some(3));
        assert!(sets[0].note.as_deref().unwrap().contains("3-rep max"));
    }

    #[test]
    fn test_weights_are_rounded_to_increment() {
        let sets = resolve_scheme(
            &SetScheme::Fixed { sets: 2, reps: 5 },
            &ResolvedLoad::Weight(dec!(176.3)),
            dec!(2.5),
        );
        assert_eq!(sets[0].weight, Some(dec!(177.5)));
    }
}
