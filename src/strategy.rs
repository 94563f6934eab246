//! Load strategy resolver
//!
//! Turns a strategy descriptor plus the athlete's reference numbers into a
//! concrete weight. Pure: everything it reads is assembled into contexts by
//! the resolution pipeline beforehand, so each variant stays an exhaustively
//! checked match arm.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::EngineError;
use crate::lookup::RpeChart;
use crate::models::lift::MaxKind;
use crate::models::program::{LoadStrategy, PercentSource};

// ---------------------------------------------------------------------------
/// Resolved Load: a weight, or open-ended discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedLoad {
    /// Concrete weight, before rounding
    Weight(Decimal),
    /// No computed weight: the athlete works up to an N-rep max
    Discover { target_reps: u32 },
}

// ---------------------------------------------------------------------------
/// Resolution Contexts
// ---------------------------------------------------------------------------

/// Per-lift inputs: the athlete's current reference numbers and most recent
/// logged work-set weight.
#[derive(Debug, Clone)]
pub struct LiftContext {
    pub lift_slug: String,
    pub maxes: HashMap<MaxKind, Decimal>,
    pub last_work_set_weight: Option<Decimal>,
}

/// Day-wide inputs shared by every slot: lookup results fetched once, plus
/// the weights already resolved earlier in this pass keyed by slot ref.
#[derive(Debug)]
pub struct DayContext<'a> {
    pub chart: &'a RpeChart,
    pub weekly: Option<&'a [Decimal]>,
    pub daily: Option<Decimal>,
    pub prior: &'a HashMap<String, Decimal>,
}

// ---------------------------------------------------------------------------
/// Resolver
// ---------------------------------------------------------------------------

pub fn resolve_load(
    strategy: &LoadStrategy,
    lift: &LiftContext,
    day: &DayContext<'_>,
) -> Result<ResolvedLoad, EngineError> {
    match strategy {
        LoadStrategy::PercentOf { reference, percentage } => {
            let pct = resolve_percent(percentage, day)?;
            let base = lift.maxes.get(reference).copied().ok_or_else(|| {
                EngineError::MissingLiftMax { lift: lift.lift_slug.clone(), kind: *reference }
            })?;
            Ok(ResolvedLoad::Weight(base * pct))
        }

        LoadStrategy::RpeTarget { reps, rpe } => {
            let pct = day.chart.percentage(*reps, *rpe).ok_or_else(|| {
                EngineError::LookupMiss(format!("RPE chart has no entry for {}x@{}", reps, rpe))
            })?;
            let base = lift.maxes.get(&MaxKind::TrueMax).copied().ok_or_else(|| {
                EngineError::MissingLiftMax {
                    lift: lift.lift_slug.clone(),
                    kind: MaxKind::TrueMax,
                }
            })?;
            Ok(ResolvedLoad::Weight(base * pct))
        }

        LoadStrategy::LinearAdd { increment } => {
            let last = lift.last_work_set_weight.ok_or_else(|| {
                EngineError::NoPriorPerformance { lift: lift.lift_slug.clone() }
            })?;
            Ok(ResolvedLoad::Weight(last + *increment))
        }

        LoadStrategy::FindRm { target_reps } => {
            Ok(ResolvedLoad::Discover { target_reps: *target_reps })
        }

        LoadStrategy::RelativeTo { source_slot, percentage } => {
            let base = day.prior.get(source_slot).copied().ok_or_else(|| {
                EngineError::ForwardReference { reference: source_slot.clone() }
            })?;
            Ok(ResolvedLoad::Weight(base * *percentage))
        }
    }
}

/// A literal percentage is used as-is; lookup sources read the percentages
/// fetched for this day. A weekly set substitutes its top (final) entry --
/// per-set waves are the set scheme's business, not the strategy's.
fn resolve_percent(source: &PercentSource, day: &DayContext<'_>) -> Result<Decimal, EngineError> {
    match source {
        PercentSource::Literal { value } => Ok(*value),
        PercentSource::WeeklyLookup => day
            .weekly
            .and_then(|set| set.last().copied())
            .ok_or_else(|| EngineError::LookupMiss("no weekly percentage for this week".into())),
        PercentSource::DailyLookup => day
            .daily
            .ok_or_else(|| EngineError::LookupMiss("no daily percentage for this day".into())),
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_lift_context(maxes: &[(MaxKind, Decimal)]) -> LiftContext {
        LiftContext {
            lift_slug: "squat".to_string(),
            maxes: maxes.iter().copied().collect(),
            last_work_set_weight: None,
        }
    }

    fn empty_chart() -> RpeChart {
        RpeChart::new(HashMap::new())
    }

    fn make_day_context<'a>(
        chart: &'a RpeChart,
        prior: &'a HashMap<String, Decimal>,
    ) -> DayContext<'a> {
        DayContext { chart, weekly: None, daily: None, prior }
    }

    #[test]
    fn test_percent_of_training_max() {
        let lift = make_lift_context(&[(MaxKind::TrainingMax, dec!(200))]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let day = make_day_context(&chart, &prior);

        let strategy = LoadStrategy::PercentOf {
            reference: MaxKind::TrainingMax,
            percentage: PercentSource::Literal { value: dec!(0.75) },
        };
        let load = resolve_load(&strategy, &lift, &day).unwrap();
        assert_eq!(load, ResolvedLoad::Weight(dec!(150)));
    }

    #[test]
    fn test_percent_of_missing_max_fails() {
        let lift = make_lift_context(&[]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let day = make_day_context(&chart, &prior);

        let strategy = LoadStrategy::PercentOf {
            reference: MaxKind::TrainingMax,
            percentage: PercentSource::Literal { value: dec!(0.75) },
        };
        let err = resolve_load(&strategy, &lift, &day).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingLiftMax { kind: MaxKind::TrainingMax, .. }
        ));
    }

    #[test]
    fn test_weekly_lookup_substitutes_top_percentage() {
        let lift = make_lift_context(&[(MaxKind::TrainingMax, dec!(200))]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let weekly = [dec!(0.65), dec!(0.75), dec!(0.85)];
        let day = DayContext {
            chart: &chart,
            weekly: Some(&weekly),
            daily: None,
            prior: &prior,
        };

        let strategy = LoadStrategy::PercentOf {
            reference: MaxKind::TrainingMax,
            percentage: PercentSource::WeeklyLookup,
        };
        let load = resolve_load(&strategy, &lift, &day).unwrap();
        assert_eq!(load, ResolvedLoad::Weight(dec!(170)));
    }

    #[test]
    fn test_daily_lookup_substitutes_day_percentage() {
        let lift = make_lift_context(&[(MaxKind::TrainingMax, dec!(100))]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let day = DayContext {
            chart: &chart,
            weekly: None,
            daily: Some(dec!(0.8)),
            prior: &prior,
        };

        let strategy = LoadStrategy::PercentOf {
            reference: MaxKind::TrainingMax,
            percentage: PercentSource::DailyLookup,
        };
        let load = resolve_load(&strategy, &lift, &day).unwrap();
        assert_eq!(load, ResolvedLoad::Weight(dec!(80)));
    }

    #[test]
    fn test_weekly_lookup_without_entry_is_lookup_miss() {
        let lift = make_lift_context(&[(MaxKind::TrainingMax, dec!(200))]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let day = make_day_context(&chart, &prior);

        let strategy = LoadStrategy::PercentOf {
            reference: MaxKind::TrainingMax,
            percentage: PercentSource::WeeklyLookup,
        };
        assert!(matches!(
            resolve_load(&strategy, &lift, &day),
            Err(EngineError::LookupMiss(_))
        ));
    }

    #[test]
    fn test_rpe_target_reads_chart_against_true_max() {
        let lift = make_lift_context(&[(MaxKind::TrueMax, dec!(250))]);
        let mut entries = HashMap::new();
        entries.insert((5u32, dec!(8)), dec!(0.811));
        let chart = RpeChart::new(entries);
        let prior = HashMap::new();
        let day = make_day_context(&chart, &prior);

        let strategy = LoadStrategy::RpeTarget { reps: 5, rpe: dec!(8) };
        let load = resolve_load(&strategy, &lift, &day).unwrap();
        assert_eq!(load, ResolvedLoad::Weight(dec!(202.750)));
    }

    #[test]
    fn test_rpe_target_chart_miss() {
        let lift = make_lift_context(&[(MaxKind::TrueMax, dec!(250))]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let day = make_day_context(&chart, &prior);

        let strategy = LoadStrategy::RpeTarget { reps: 5, rpe: dec!(8) };
        assert!(matches!(
            resolve_load(&strategy, &lift, &day),
            Err(EngineError::LookupMiss(_))
        ));
    }

    #[test]
    fn test_linear_add_requires_history() {
        let mut lift = make_lift_context(&[]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let day = make_day_context(&chart, &prior);
        let strategy = LoadStrategy::LinearAdd { increment: dec!(2.5) };

        assert!(matches!(
            resolve_load(&strategy, &lift, &day),
            Err(EngineError::NoPriorPerformance { .. })
        ));

        lift.last_work_set_weight = Some(dec!(140));
        let load = resolve_load(&strategy, &lift, &day).unwrap();
        assert_eq!(load, ResolvedLoad::Weight(dec!(142.5)));
    }

    #[test]
    fn test_find_rm_is_discovery_not_error() {
        let lift = make_lift_context(&[]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let day = make_day_context(&chart, &prior);

        let strategy = LoadStrategy::FindRm { target_reps: 3 };
        let load = resolve_load(&strategy, &lift, &day).unwrap();
        assert_eq!(load, ResolvedLoad::Discover { target_reps: 3 });
    }

    #[test]
    fn test_relative_to_reads_prior_slot() {
        let lift = make_lift_context(&[]);
        let chart = empty_chart();
        let mut prior = HashMap::new();
        prior.insert("top".to_string(), dec!(180));
        let day = make_day_context(&chart, &prior);

        let strategy = LoadStrategy::RelativeTo {
            source_slot: "top".to_string(),
            percentage: dec!(0.9),
        };
        let load = resolve_load(&strategy, &lift, &day).unwrap();
        assert_eq!(load, ResolvedLoad::Weight(dec!(162)));
    }

    #[test]
    fn test_relative_to_unresolved_slot_is_forward_reference() {
        let lift = make_lift_context(&[]);
        let chart = empty_chart();
        let prior = HashMap::new();
        let day = make_day_context(&chart, &prior);

        let strategy = LoadStrategy::RelativeTo {
            source_slot: "top".to_string(),
            percentage: dec!(0.9),
        };
        assert!(matches!(
            resolve_load(&strategy, &lift, &day),
            Err(EngineError::ForwardReference { .. })
        ));
    }
}
