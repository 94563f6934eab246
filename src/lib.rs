//! PowerPro prescription resolution and progression engine
//!
//! Converts declarative training-day templates into concrete prescribed
//! weights, sets and reps for a specific athlete at a specific point in
//! time, and advances the athlete's reference numbers through pluggable
//! progression rules.

pub mod db;
pub mod error;
pub mod estimate;
pub mod lookup;
pub mod models;
pub mod progression;
pub mod resolve;
pub mod rounding;
pub mod scheme;
pub mod service;
pub mod state;
pub mod strategy;

#[cfg(test)]
pub mod test_utils;

pub use db::{AppState, DbPool};
pub use error::EngineError;
pub use models::{Workout, WorkoutExercise};
