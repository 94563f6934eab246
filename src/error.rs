//! Engine error taxonomy
//!
//! Resolution errors are all-or-nothing per workout: the first error aborts
//! the whole resolution. Progression errors are per-lift and are captured in
//! that lift's result entry instead of bubbling out of the batch.

use crate::models::lift::MaxKind;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The athlete has no reference number of the required kind. Actionable
    /// by the caller (record a max), not a server fault.
    #[error("no {kind} recorded for lift '{lift}'")]
    MissingLiftMax { lift: String, kind: MaxKind },

    /// A referenced lookup-table entry does not exist. Configuration error.
    #[error("lookup entry not found: {0}")]
    LookupMiss(String),

    /// LinearAdd strategy with no logged history to add onto.
    #[error("no logged performance for lift '{lift}'")]
    NoPriorPerformance { lift: String },

    /// A RelativeTo strategy referenced a slot that resolves later than it.
    /// Rejected when the day is assembled; kept as a resolution guard too.
    #[error("slot '{reference}' is not resolved at this point in the day")]
    ForwardReference { reference: String },

    /// The state machine was asked to advance somewhere it cannot go.
    #[error("cannot advance: {0}")]
    InvalidAdvance(String),

    #[error("user is not enrolled in a program")]
    NotEnrolled,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored descriptor or value failed to decode.
    #[error("failed to decode stored value: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl serde::Serialize for EngineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
