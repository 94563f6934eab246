use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::lift::Lift;

/// One prescribed set of a resolved workout. Weight is absent for
/// discovery work (find-an-RM); target reps are absent when the target is
/// textual (rep totals, fatigue work).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescribedSet {
  pub set_number: u32,
  pub weight: Option<Decimal>,
  pub target_reps: Option<u32>,
  pub is_work_set: bool,
  pub is_amrap: bool,
  pub note: Option<String>,
}

/// One exercise slot of a resolved workout, in day-declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutExercise {
  pub slot_ref: String,
  pub lift: Lift,
  pub sets: Vec<PrescribedSet>,
  pub notes: Option<String>,
  pub rest_seconds: Option<u32>,
}

/// The fully resolved output of a day for one athlete at one point in time.
/// Never partial: resolution either produces every exercise or fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
  pub program_id: Uuid,
  pub week_number: u32,
  pub day_slug: String,
  pub day_name: String,
  pub resolved_at: DateTime<Utc>,
  pub exercises: Vec<WorkoutExercise>,
}
