pub mod progression;
pub mod state;
pub mod workout;

pub use progression::{get_progression_history, trigger_progression};
pub use state::{advance_state, enroll, unenroll, EnrollOutcome};
pub use workout::{get_current_workout, preview_workout};
