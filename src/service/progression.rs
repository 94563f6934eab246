//! Caller-facing progression entry points

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::EngineError;
use crate::progression::{self, ProgressionHistory, TriggerOutcome};

/// Fire a progression for the user, either for one explicit lift or for
/// every lift configured on the progression. Pass `force` to override the
/// once-per-period guarantee.
pub async fn trigger_progression(
    pool: &SqlitePool,
    user_id: Uuid,
    progression_id: Uuid,
    lift_id: Option<Uuid>,
    force: bool,
) -> Result<TriggerOutcome, EngineError> {
    progression::trigger_progression(pool, user_id, progression_id, lift_id, force).await
}

/// The user's progression audit trail, oldest first, optionally narrowed to
/// one lift.
pub async fn get_progression_history(
    pool: &SqlitePool,
    user_id: Uuid,
    lift_id: Option<Uuid>,
) -> Result<Vec<ProgressionHistory>, EngineError> {
    progression::get_history(pool, user_id, lift_id).await
}
