//! Progression engine
//!
//! Advances an athlete's reference numbers when a trigger fires. Each rule
//! kind computes a delta from logged performance or calendar position; the
//! engine then appends a new LiftMax row (never mutating an old one) and an
//! audit record.
//!
//! Key principles:
//! - At most one non-forced application per trigger period per lift; the
//!   history insert itself is the lock (partial unique index), so a
//!   concurrent duplicate becomes "skipped", not an error
//! - Batch results are independent: one lift's failure never blocks another
//! - Append-only: history rows and max rows are never updated or deleted

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::lift::{self, LoggedSet, MaxKind};
use crate::models::program;
use crate::models::{parse_decimal, parse_timestamp, parse_uuid};
use crate::rounding::round_to_increment;
use crate::state::UserProgramState;

// ---------------------------------------------------------------------------
/// Progression Rule: how the delta is computed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepThreshold {
    pub min_reps: u32,
    pub increment: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressionRule {
    /// Flat increment every `frequency` weeks (1 = every trigger)
    Linear { increment: Decimal, frequency: u32 },
    /// Increment keyed by reps performed on the most recent AMRAP set;
    /// thresholds may carry negative increments for low-rep outcomes
    Amrap { thresholds: Vec<RepThreshold> },
    /// Multiply the max down after N consecutive failed work sets
    DeloadOnFailure { failure_count: u32, multiplier: Decimal },
    /// Per-stage increments; the consecutive-failure count selects the stage
    Stage { increments: Vec<Decimal> },
    /// Weight goes up only once every work set of the last session hit the
    /// top of the rep range; below that the athlete keeps adding reps
    Double { min_reps: u32, max_reps: u32, increment: Decimal },
    /// Flat increment at cycle boundaries
    Cycle { increment: Decimal },
}

impl ProgressionRule {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::Decode(format!("bad progression rule: {}", e)))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
/// Trigger: when a progression fires, and what its period is
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// After a specific set slot (or any set when unfiltered)
    AfterSet { slot_ref: Option<String> },
    AfterSession,
    AfterWeek,
    AfterCycle,
    OnFailure,
}

impl Trigger {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::Decode(format!("bad trigger: {}", e)))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// The idempotency key for "at most one application per trigger period".
/// Set/session/failure triggers key on the full (iteration, week, day)
/// position, week triggers on (iteration, week), cycle triggers on the
/// iteration alone.
pub fn period_key(trigger: &Trigger, state: &UserProgramState) -> String {
    let (iter, week, day) = (state.cycle_iteration, state.current_week, state.day_index);
    match trigger {
        Trigger::AfterSet { slot_ref } => format!(
            "set:{}:{}:{}:{}",
            iter,
            week,
            day,
            slot_ref.as_deref().unwrap_or("*")
        ),
        Trigger::AfterSession => format!("session:{}:{}:{}", iter, week, day),
        Trigger::AfterWeek => format!("week:{}:{}", iter, week),
        Trigger::AfterCycle => format!("cycle:{}", iter),
        Trigger::OnFailure => format!("failure:{}:{}:{}", iter, week, day),
    }
}

// ---------------------------------------------------------------------------
/// Progression: stored configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progression {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    pub rule: ProgressionRule,
    pub trigger: Trigger,
    pub target_kind: MaxKind,
}

/// For inserting new progressions (without id)
#[derive(Debug, Clone)]
pub struct NewProgression {
    pub program_id: Uuid,
    pub name: String,
    pub rule: ProgressionRule,
    pub trigger: Trigger,
    pub target_kind: MaxKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lift_id: Uuid,
    pub progression_id: Uuid,
    pub period_key: String,
    pub previous_value: Decimal,
    pub new_value: Decimal,
    pub delta: Decimal,
    pub reason: String,
    pub cycle_iteration: u32,
    pub week_number: u32,
    pub forced: bool,
    pub applied_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
/// Trigger Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftProgressionResult {
    pub lift_id: Uuid,
    pub applied: bool,
    pub skipped: bool,
    pub delta: Option<Decimal>,
    pub new_value: Option<Decimal>,
    pub reason: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub results: Vec<LiftProgressionResult>,
    pub applied: u32,
    pub skipped: u32,
    pub errored: u32,
}

// ---------------------------------------------------------------------------
/// Rule Evaluation
// ---------------------------------------------------------------------------

/// Logged performance snapshot for one lift, prefetched so evaluation
/// stays synchronous.
#[derive(Debug, Clone, Default)]
pub struct LiftPerformance {
    pub latest_amrap: Option<LoggedSet>,
    pub consecutive_failures: u32,
    pub last_session_sets: Vec<LoggedSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleDecision {
    Progress { delta: Decimal, reason: String },
    Hold { reason: String },
}

pub fn evaluate_rule(
    rule: &ProgressionRule,
    lift_slug: &str,
    current: Decimal,
    perf: &LiftPerformance,
    week_ordinal: u32,
) -> Result<RuleDecision, EngineError> {
    match rule {
        ProgressionRule::Linear { increment, frequency } => {
            if *frequency <= 1 || week_ordinal % frequency == 0 {
                Ok(RuleDecision::Progress {
                    delta: *increment,
                    reason: format!("linear +{}", increment),
                })
            } else {
                Ok(RuleDecision::Hold {
                    reason: format!(
                        "week {} is not a multiple of the {}-week frequency",
                        week_ordinal, frequency
                    ),
                })
            }
        }

        ProgressionRule::Amrap { thresholds } => {
            let set = perf.latest_amrap.as_ref().ok_or_else(|| {
                EngineError::NoPriorPerformance { lift: lift_slug.to_string() }
            })?;
            let mut sorted: Vec<&RepThreshold> = thresholds.iter().collect();
            sorted.sort_by_key(|t| t.min_reps);
            match sorted
                .iter()
                .rev()
                .find(|t| t.min_reps <= set.performed_reps)
            {
                Some(threshold) => Ok(RuleDecision::Progress {
                    delta: threshold.increment,
                    reason: format!(
                        "{} reps on the last AMRAP set (threshold {}+)",
                        set.performed_reps, threshold.min_reps
                    ),
                }),
                None => Ok(RuleDecision::Hold {
                    reason: format!(
                        "{} reps on the last AMRAP set reached no threshold",
                        set.performed_reps
                    ),
                }),
            }
        }

        ProgressionRule::DeloadOnFailure { failure_count, multiplier } => {
            if perf.consecutive_failures >= *failure_count {
                let delta = current * *multiplier - current;
                Ok(RuleDecision::Progress {
                    delta,
                    reason: format!(
                        "deload after {} consecutive failures",
                        perf.consecutive_failures
                    ),
                })
            } else {
                Ok(RuleDecision::Hold {
                    reason: format!(
                        "{} of {} consecutive failures",
                        perf.consecutive_failures, failure_count
                    ),
                })
            }
        }

        ProgressionRule::Stage { increments } => {
            if increments.is_empty() {
                return Ok(RuleDecision::Hold { reason: "no stages configured".to_string() });
            }
            let stage = (perf.consecutive_failures as usize).min(increments.len() - 1);
            Ok(RuleDecision::Progress {
                delta: increments[stage],
                reason: format!(
                    "stage {} ({} consecutive failures)",
                    stage + 1,
                    perf.consecutive_failures
                ),
            })
        }

        ProgressionRule::Double { min_reps: _, max_reps, increment } => {
            if perf.last_session_sets.is_empty() {
                return Err(EngineError::NoPriorPerformance {
                    lift: lift_slug.to_string(),
                });
            }
            if perf
                .last_session_sets
                .iter()
                .all(|s| s.performed_reps >= *max_reps)
            {
                Ok(RuleDecision::Progress {
                    delta: *increment,
                    reason: format!("all sets reached {} reps", max_reps),
                })
            } else {
                Ok(RuleDecision::Hold {
                    reason: format!("still building reps toward {}", max_reps),
                })
            }
        }

        ProgressionRule::Cycle { increment } => Ok(RuleDecision::Progress {
            delta: *increment,
            reason: format!("cycle increment +{}", increment),
        }),
    }
}

// ---------------------------------------------------------------------------
// Database Operations
// ---------------------------------------------------------------------------

pub async fn create_progression(
    pool: &SqlitePool,
    new: &NewProgression,
) -> Result<Progression, EngineError> {
    let progression = Progression {
        id: Uuid::new_v4(),
        program_id: new.program_id,
        name: new.name.clone(),
        rule: new.rule.clone(),
        trigger: new.trigger.clone(),
        target_kind: new.target_kind,
    };

    sqlx::query(
        r#"
        INSERT INTO progressions (id, program_id, name, rule_json, trigger_json, target_kind)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(progression.id.to_string())
    .bind(progression.program_id.to_string())
    .bind(&progression.name)
    .bind(progression.rule.to_json())
    .bind(progression.trigger.to_json())
    .bind(progression.target_kind.to_string())
    .execute(pool)
    .await?;

    Ok(progression)
}

pub async fn get_progression(pool: &SqlitePool, id: Uuid) -> Result<Progression, EngineError> {
    let row = sqlx::query("SELECT * FROM progressions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound { entity: "progression", id: id.to_string() })?;

    let prog_id: String = row.get("id");
    let program_id: String = row.get("program_id");
    let rule_json: String = row.get("rule_json");
    let trigger_json: String = row.get("trigger_json");
    let target_kind: String = row.get("target_kind");
    Ok(Progression {
        id: parse_uuid(&prog_id)?,
        program_id: parse_uuid(&program_id)?,
        name: row.get("name"),
        rule: ProgressionRule::from_json(&rule_json)?,
        trigger: Trigger::from_json(&trigger_json)?,
        target_kind: target_kind.parse().map_err(EngineError::Decode)?,
    })
}

/// Configure a lift as a target of this progression.
pub async fn add_target(
    pool: &SqlitePool,
    progression_id: Uuid,
    lift_id: Uuid,
) -> Result<(), EngineError> {
    sqlx::query("INSERT INTO progression_targets (progression_id, lift_id) VALUES (?, ?)")
        .bind(progression_id.to_string())
        .bind(lift_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn target_lifts(
    pool: &SqlitePool,
    progression_id: Uuid,
) -> Result<Vec<Uuid>, EngineError> {
    let rows = sqlx::query(
        "SELECT lift_id FROM progression_targets WHERE progression_id = ? ORDER BY lift_id",
    )
    .bind(progression_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("lift_id");
            parse_uuid(&id)
        })
        .collect()
}

/// Insert the audit row. Returns false when a non-forced row for the same
/// (user, lift, progression, period) already exists -- that unique violation
/// is the concurrency lock, not a fault.
async fn insert_history(
    pool: &SqlitePool,
    entry: &ProgressionHistory,
) -> Result<bool, EngineError> {
    let result = sqlx::query(
        r#"
        INSERT INTO progression_history (
            id, user_id, lift_id, progression_id, period_key,
            previous_value, new_value, delta, reason,
            cycle_iteration, week_number, forced, applied_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.user_id.to_string())
    .bind(entry.lift_id.to_string())
    .bind(entry.progression_id.to_string())
    .bind(&entry.period_key)
    .bind(entry.previous_value.to_string())
    .bind(entry.new_value.to_string())
    .bind(entry.delta.to_string())
    .bind(&entry.reason)
    .bind(entry.cycle_iteration as i64)
    .bind(entry.week_number as i64)
    .bind(entry.forced)
    .bind(entry.applied_at.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn history_exists(
    pool: &SqlitePool,
    user_id: Uuid,
    lift_id: Uuid,
    progression_id: Uuid,
    period_key: &str,
) -> Result<bool, EngineError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM progression_history
        WHERE user_id = ? AND lift_id = ? AND progression_id = ?
          AND period_key = ? AND forced = 0
        "#,
    )
    .bind(user_id.to_string())
    .bind(lift_id.to_string())
    .bind(progression_id.to_string())
    .bind(period_key)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressionHistory, EngineError> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let lift_id: String = row.get("lift_id");
    let progression_id: String = row.get("progression_id");
    let previous_value: String = row.get("previous_value");
    let new_value: String = row.get("new_value");
    let delta: String = row.get("delta");
    let cycle_iteration: i64 = row.get("cycle_iteration");
    let week_number: i64 = row.get("week_number");
    let applied_at: String = row.get("applied_at");
    Ok(ProgressionHistory {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        lift_id: parse_uuid(&lift_id)?,
        progression_id: parse_uuid(&progression_id)?,
        period_key: row.get("period_key"),
        previous_value: parse_decimal(&previous_value)?,
        new_value: parse_decimal(&new_value)?,
        delta: parse_decimal(&delta)?,
        reason: row.get("reason"),
        cycle_iteration: cycle_iteration as u32,
        week_number: week_number as u32,
        forced: row.get("forced"),
        applied_at: parse_timestamp(&applied_at)?,
    })
}

/// Full audit trail for a user, optionally narrowed to one lift, oldest
/// first.
pub async fn get_history(
    pool: &SqlitePool,
    user_id: Uuid,
    lift_id: Option<Uuid>,
) -> Result<Vec<ProgressionHistory>, EngineError> {
    let rows = match lift_id {
        Some(lift_id) => {
            sqlx::query(
                r#"
                SELECT * FROM progression_history
                WHERE user_id = ? AND lift_id = ?
                ORDER BY applied_at
                "#,
            )
            .bind(user_id.to_string())
            .bind(lift_id.to_string())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT * FROM progression_history WHERE user_id = ? ORDER BY applied_at",
            )
            .bind(user_id.to_string())
            .fetch_all(pool)
            .await?
        }
    };
    rows.iter().map(row_to_history).collect()
}

async fn load_performance(
    pool: &SqlitePool,
    user_id: Uuid,
    lift_id: Uuid,
) -> Result<LiftPerformance, EngineError> {
    Ok(LiftPerformance {
        latest_amrap: lift::latest_amrap_set(pool, user_id, lift_id).await?,
        consecutive_failures: lift::consecutive_failed_work_sets(pool, user_id, lift_id).await?,
        last_session_sets: lift::last_session_work_sets(pool, user_id, lift_id).await?,
    })
}

// ---------------------------------------------------------------------------
/// Trigger Entry Point
// ---------------------------------------------------------------------------

fn skipped_result(lift_id: Uuid, reason: String) -> LiftProgressionResult {
    LiftProgressionResult {
        lift_id,
        applied: false,
        skipped: true,
        delta: None,
        new_value: None,
        reason,
        error: None,
    }
}

#[allow(clippy::too_many_arguments)]
async fn apply_to_lift(
    pool: &SqlitePool,
    user_id: Uuid,
    progression: &Progression,
    rounding_increment: Decimal,
    weeks_per_cycle: u32,
    state: &UserProgramState,
    lift_id: Uuid,
    force: bool,
) -> Result<LiftProgressionResult, EngineError> {
    let key = period_key(&progression.trigger, state);

    if !force && history_exists(pool, user_id, lift_id, progression.id, &key).await? {
        return Ok(skipped_result(lift_id, "already applied for this period".to_string()));
    }

    let lift_row = lift::get_lift(pool, lift_id).await?;
    let current = lift::current_max(pool, user_id, lift_id, progression.target_kind)
        .await?
        .ok_or_else(|| EngineError::MissingLiftMax {
            lift: lift_row.slug.clone(),
            kind: progression.target_kind,
        })?;

    let perf = load_performance(pool, user_id, lift_id).await?;
    let decision = evaluate_rule(
        &progression.rule,
        &lift_row.slug,
        current,
        &perf,
        state.week_ordinal(weeks_per_cycle),
    )?;

    let (delta, reason) = match decision {
        RuleDecision::Progress { delta, reason } => (delta, reason),
        RuleDecision::Hold { reason } => return Ok(skipped_result(lift_id, reason)),
    };

    let new_value = round_to_increment(current + delta, rounding_increment);
    let applied_at = Utc::now();
    let entry = ProgressionHistory {
        id: Uuid::new_v4(),
        user_id,
        lift_id,
        progression_id: progression.id,
        period_key: key,
        previous_value: current,
        new_value,
        delta: new_value - current,
        reason: reason.clone(),
        cycle_iteration: state.cycle_iteration,
        week_number: state.current_week,
        forced: force,
        applied_at,
    };

    // The insert is the lock: losing the race to another request means the
    // progression was already applied this period.
    if !insert_history(pool, &entry).await? {
        return Ok(skipped_result(lift_id, "already applied for this period".to_string()));
    }

    lift::record_max(
        pool,
        user_id,
        lift_id,
        progression.target_kind,
        new_value,
        applied_at,
    )
    .await?;

    tracing::info!(
        user = %user_id,
        lift = %lift_row.slug,
        progression = %progression.name,
        %current,
        %new_value,
        "progression applied"
    );

    Ok(LiftProgressionResult {
        lift_id,
        applied: true,
        skipped: false,
        delta: Some(entry.delta),
        new_value: Some(new_value),
        reason,
        error: None,
    })
}

/// Evaluate a progression for its target lifts (or one explicit lift) and
/// apply it where the trigger period allows. Per-lift outcomes are
/// independent.
pub async fn trigger_progression(
    pool: &SqlitePool,
    user_id: Uuid,
    progression_id: Uuid,
    lift_id: Option<Uuid>,
    force: bool,
) -> Result<TriggerOutcome, EngineError> {
    let progression = get_progression(pool, progression_id).await?;
    let prog = program::get_program(pool, progression.program_id).await?;
    let state = crate::state::get_state(pool, user_id)
        .await?
        .ok_or(EngineError::NotEnrolled)?;

    let targets = match lift_id {
        Some(id) => vec![id],
        None => target_lifts(pool, progression_id).await?,
    };

    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        match apply_to_lift(
            pool,
            user_id,
            &progression,
            prog.rounding_increment,
            prog.weeks_per_cycle,
            &state,
            target,
            force,
        )
        .await
        {
            Ok(result) => results.push(result),
            Err(e) => results.push(LiftProgressionResult {
                lift_id: target,
                applied: false,
                skipped: false,
                delta: None,
                new_value: None,
                reason: String::new(),
                error: Some(e.to_string()),
            }),
        }
    }

    let applied = results.iter().filter(|r| r.applied).count() as u32;
    let skipped = results.iter().filter(|r| r.skipped).count() as u32;
    let errored = results.iter().filter(|r| r.error.is_some()).count() as u32;
    tracing::info!(
        user = %user_id,
        progression = %progression.name,
        applied,
        skipped,
        errored,
        "progression trigger evaluated"
    );

    Ok(TriggerOutcome { results, applied, skipped, errored })
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
