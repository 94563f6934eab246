pub mod lift;
pub mod program;
pub mod workout;

pub use lift::{Lift, LiftMax, LoggedSet, MaxKind};
pub use program::{Day, LoadStrategy, PercentSource, Prescription, Program, SetScheme};
pub use workout::{PrescribedSet, Workout, WorkoutExercise};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::EngineError;

/// Rows store UUIDs, decimals and timestamps as TEXT; these helpers decode
/// them with a uniform error.

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, EngineError> {
  s.parse()
    .map_err(|_| EngineError::Decode(format!("bad uuid '{}'", s)))
}

pub(crate) fn parse_decimal(s: &str) -> Result<Decimal, EngineError> {
  s.parse()
    .map_err(|_| EngineError::Decode(format!("bad decimal '{}'", s)))
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, EngineError> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| EngineError::Decode(format!("bad timestamp '{}'", s)))
}
