//! Prescription resolution pipeline
//!
//! Orchestrates lookups -> load strategy -> set scheme -> rounding for every
//! slot of a day, in declared order, and assembles the Workout. Resolution
//! is all-or-nothing: the first error aborts and no partial workout is ever
//! returned.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::EngineError;
use crate::lookup;
use crate::models::lift;
use crate::models::program::{self, Day, Program};
use crate::models::workout::{Workout, WorkoutExercise};
use crate::rounding::round_to_increment;
use crate::scheme::resolve_scheme;
use crate::strategy::{resolve_load, DayContext, LiftContext, ResolvedLoad};

/// Resolve one day of a program for an athlete. `week_number` and `day` are
/// explicit so the same path serves both the live workout (position read
/// from UserProgramState by the caller) and previews (position supplied).
pub async fn resolve_day(
    pool: &SqlitePool,
    user_id: Uuid,
    program: &Program,
    week_number: u32,
    day: &Day,
) -> Result<Workout, EngineError> {
    let slots = program::load_day_slots(pool, day.id).await?;

    // Day-wide inputs, fetched once. A missing lookup entry only matters if
    // a strategy actually references it, so misses are deferred to use.
    let chart = lookup::load_rpe_chart(pool).await?;
    let weekly = match program.weekly_lookup_id {
        Some(id) => match lookup::weekly_percentages(pool, id, week_number).await {
            Ok(set) => Some(set),
            Err(EngineError::LookupMiss(_)) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };
    let daily = match program.daily_lookup_id {
        Some(id) => match lookup::daily_percentage(pool, id, &day.slug).await {
            Ok(pct) => Some(pct),
            Err(EngineError::LookupMiss(_)) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };

    let mut prior: HashMap<String, Decimal> = HashMap::new();
    let mut exercises = Vec::with_capacity(slots.len());

    for slot in &slots {
        let prescription = &slot.prescription;
        let lift_row = lift::get_lift(pool, prescription.lift_id).await?;

        let lift_ctx = LiftContext {
            lift_slug: lift_row.slug.clone(),
            maxes: lift::current_maxes(pool, user_id, lift_row.id).await?,
            last_work_set_weight: lift::latest_work_set_weight(pool, user_id, lift_row.id)
                .await?,
        };
        let day_ctx = DayContext {
            chart: &chart,
            weekly: weekly.as_deref(),
            daily,
            prior: &prior,
        };

        let load = resolve_load(&prescription.load_strategy, &lift_ctx, &day_ctx)
            .map_err(|e| {
                tracing::debug!(slot = %slot.slot_ref, lift = %lift_row.slug, error = %e, "resolution aborted");
                e
            })?;

        // Later RelativeTo slots read the rounded strategy weight, the
        // number the athlete actually puts on the bar.
        if let ResolvedLoad::Weight(w) = &load {
            prior.insert(
                slot.slot_ref.clone(),
                round_to_increment(*w, program.rounding_increment),
            );
        }

        let sets = resolve_scheme(&prescription.set_scheme, &load, program.rounding_increment);
        exercises.push(WorkoutExercise {
            slot_ref: slot.slot_ref.clone(),
            lift: lift_row,
            sets,
            notes: prescription.notes.clone(),
            rest_seconds: prescription.rest_seconds,
        });
    }

    Ok(Workout {
        program_id: program.id,
        week_number,
        day_slug: day.slug.clone(),
        day_name: day.name.clone(),
        resolved_at: Utc::now(),
        exercises,
    })
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
