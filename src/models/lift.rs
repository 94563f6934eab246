//! Lifts, reference maxes and logged performance
//!
//! LiftMax rows are append-mostly: progression inserts new rows instead of
//! mutating old ones, and "current" means the latest effective date that is
//! not in the future.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{parse_decimal, parse_timestamp, parse_uuid};

/// ---------------------------------------------------------------------------
/// Max Kind: which reference number a strategy or progression works against
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxKind {
  /// Tested single-rep max
  TrueMax,
  /// Working number most programs prescribe from (typically 85-90% of true)
  TrainingMax,
  /// Best performance at a specific rep count
  RepMax,
  /// Derived from a rep performance, never tested directly
  EstimatedMax,
}

impl std::fmt::Display for MaxKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::TrueMax => write!(f, "true_max"),
      Self::TrainingMax => write!(f, "training_max"),
      Self::RepMax => write!(f, "rep_max"),
      Self::EstimatedMax => write!(f, "estimated_max"),
    }
  }
}

impl std::str::FromStr for MaxKind {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "true_max" => Ok(Self::TrueMax),
      "training_max" => Ok(Self::TrainingMax),
      "rep_max" => Ok(Self::RepMax),
      "estimated_max" => Ok(Self::EstimatedMax),
      _ => Err(format!("Unknown max kind: {}", s)),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Domain Rows
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lift {
  pub id: Uuid,
  pub name: String,
  pub slug: String,
  pub is_competition_lift: bool,
  pub created_at: DateTime<Utc>,
}

/// For inserting new lifts (without id, created_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLift {
  pub name: String,
  pub slug: String,
  pub is_competition_lift: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftMax {
  pub id: Uuid,
  pub user_id: Uuid,
  pub lift_id: Uuid,
  pub kind: MaxKind,
  pub value: Decimal,
  pub effective_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedSet {
  pub id: Uuid,
  pub user_id: Uuid,
  pub lift_id: Uuid,
  pub weight: Decimal,
  pub target_reps: Option<u32>,
  pub performed_reps: u32,
  pub is_amrap: bool,
  pub is_work_set: bool,
  pub logged_at: DateTime<Utc>,
}

/// For inserting new logged sets (without id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoggedSet {
  pub user_id: Uuid,
  pub lift_id: Uuid,
  pub weight: Decimal,
  pub target_reps: Option<u32>,
  pub performed_reps: u32,
  pub is_amrap: bool,
  pub is_work_set: bool,
  pub logged_at: DateTime<Utc>,
}

/// ---------------------------------------------------------------------------
/// Lift Catalog
/// ---------------------------------------------------------------------------

pub async fn create_lift(pool: &SqlitePool, new: &NewLift) -> Result<Lift, EngineError> {
  let lift = Lift {
    id: Uuid::new_v4(),
    name: new.name.clone(),
    slug: new.slug.clone(),
    is_competition_lift: new.is_competition_lift,
    created_at: Utc::now(),
  };

  sqlx::query(
    r#"
    INSERT INTO lifts (id, name, slug, is_competition_lift, created_at)
    VALUES (?, ?, ?, ?, ?)
    "#,
  )
  .bind(lift.id.to_string())
  .bind(&lift.name)
  .bind(&lift.slug)
  .bind(lift.is_competition_lift)
  .bind(lift.created_at.to_rfc3339())
  .execute(pool)
  .await?;

  Ok(lift)
}

fn row_to_lift(row: &sqlx::sqlite::SqliteRow) -> Result<Lift, EngineError> {
  let id: String = row.get("id");
  let created_at: String = row.get("created_at");
  Ok(Lift {
    id: parse_uuid(&id)?,
    name: row.get("name"),
    slug: row.get("slug"),
    is_competition_lift: row.get("is_competition_lift"),
    created_at: parse_timestamp(&created_at)?,
  })
}

pub async fn get_lift(pool: &SqlitePool, id: Uuid) -> Result<Lift, EngineError> {
  let row = sqlx::query("SELECT * FROM lifts WHERE id = ?")
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::NotFound { entity: "lift", id: id.to_string() })?;
  row_to_lift(&row)
}

pub async fn get_lift_by_slug(pool: &SqlitePool, slug: &str) -> Result<Lift, EngineError> {
  let row = sqlx::query("SELECT * FROM lifts WHERE slug = ?")
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::NotFound { entity: "lift", id: slug.to_string() })?;
  row_to_lift(&row)
}

pub async fn list_lifts(pool: &SqlitePool) -> Result<Vec<Lift>, EngineError> {
  let rows = sqlx::query("SELECT * FROM lifts ORDER BY slug")
    .fetch_all(pool)
    .await?;
  rows.iter().map(row_to_lift).collect()
}

/// ---------------------------------------------------------------------------
/// Reference Maxes
/// ---------------------------------------------------------------------------

/// Insert a new reference max row. Never updates an existing row.
pub async fn record_max(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
  kind: MaxKind,
  value: Decimal,
  effective_at: DateTime<Utc>,
) -> Result<LiftMax, EngineError> {
  let max = LiftMax {
    id: Uuid::new_v4(),
    user_id,
    lift_id,
    kind,
    value,
    effective_at,
    created_at: Utc::now(),
  };

  sqlx::query(
    r#"
    INSERT INTO lift_maxes (id, user_id, lift_id, kind, value, effective_at, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    "#,
  )
  .bind(max.id.to_string())
  .bind(max.user_id.to_string())
  .bind(max.lift_id.to_string())
  .bind(max.kind.to_string())
  .bind(max.value.to_string())
  .bind(max.effective_at.to_rfc3339())
  .bind(max.created_at.to_rfc3339())
  .execute(pool)
  .await?;

  Ok(max)
}

/// Current value for one kind: latest effective date not in the future.
pub async fn current_max(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
  kind: MaxKind,
) -> Result<Option<Decimal>, EngineError> {
  let row = sqlx::query(
    r#"
    SELECT value FROM lift_maxes
    WHERE user_id = ? AND lift_id = ? AND kind = ? AND effective_at <= ?
    ORDER BY effective_at DESC
    LIMIT 1
    "#,
  )
  .bind(user_id.to_string())
  .bind(lift_id.to_string())
  .bind(kind.to_string())
  .bind(Utc::now().to_rfc3339())
  .fetch_optional(pool)
  .await?;

  match row {
    Some(row) => {
      let value: String = row.get("value");
      Ok(Some(parse_decimal(&value)?))
    }
    None => Ok(None),
  }
}

/// Current value for every kind at once, for resolution context assembly.
pub async fn current_maxes(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
) -> Result<HashMap<MaxKind, Decimal>, EngineError> {
  let rows = sqlx::query(
    r#"
    SELECT kind, value FROM lift_maxes
    WHERE user_id = ? AND lift_id = ? AND effective_at <= ?
    ORDER BY effective_at DESC
    "#,
  )
  .bind(user_id.to_string())
  .bind(lift_id.to_string())
  .bind(Utc::now().to_rfc3339())
  .fetch_all(pool)
  .await?;

  // Rows come newest-first; the first row seen per kind wins.
  let mut maxes = HashMap::new();
  for row in rows {
    let kind_str: String = row.get("kind");
    let kind: MaxKind = kind_str
      .parse()
      .map_err(|e: String| EngineError::Decode(e))?;
    let value: String = row.get("value");
    maxes.entry(kind).or_insert(parse_decimal(&value)?);
  }

  Ok(maxes)
}

/// ---------------------------------------------------------------------------
/// Logged Performance
/// ---------------------------------------------------------------------------

pub async fn log_set(pool: &SqlitePool, new: &NewLoggedSet) -> Result<LoggedSet, EngineError> {
  let set = LoggedSet {
    id: Uuid::new_v4(),
    user_id: new.user_id,
    lift_id: new.lift_id,
    weight: new.weight,
    target_reps: new.target_reps,
    performed_reps: new.performed_reps,
    is_amrap: new.is_amrap,
    is_work_set: new.is_work_set,
    logged_at: new.logged_at,
  };

  sqlx::query(
    r#"
    INSERT INTO logged_sets (
      id, user_id, lift_id, weight, target_reps, performed_reps,
      is_amrap, is_work_set, logged_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#,
  )
  .bind(set.id.to_string())
  .bind(set.user_id.to_string())
  .bind(set.lift_id.to_string())
  .bind(set.weight.to_string())
  .bind(set.target_reps.map(|r| r as i64))
  .bind(set.performed_reps as i64)
  .bind(set.is_amrap)
  .bind(set.is_work_set)
  .bind(set.logged_at.to_rfc3339())
  .execute(pool)
  .await?;

  Ok(set)
}

fn row_to_logged_set(row: &sqlx::sqlite::SqliteRow) -> Result<LoggedSet, EngineError> {
  let id: String = row.get("id");
  let user_id: String = row.get("user_id");
  let lift_id: String = row.get("lift_id");
  let weight: String = row.get("weight");
  let logged_at: String = row.get("logged_at");
  let target_reps: Option<i64> = row.get("target_reps");
  let performed_reps: i64 = row.get("performed_reps");
  Ok(LoggedSet {
    id: parse_uuid(&id)?,
    user_id: parse_uuid(&user_id)?,
    lift_id: parse_uuid(&lift_id)?,
    weight: parse_decimal(&weight)?,
    target_reps: target_reps.map(|r| r as u32),
    performed_reps: performed_reps as u32,
    is_amrap: row.get("is_amrap"),
    is_work_set: row.get("is_work_set"),
    logged_at: parse_timestamp(&logged_at)?,
  })
}

async fn recent_work_sets(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
  limit: i64,
) -> Result<Vec<LoggedSet>, EngineError> {
  let rows = sqlx::query(
    r#"
    SELECT * FROM logged_sets
    WHERE user_id = ? AND lift_id = ? AND is_work_set = 1
    ORDER BY logged_at DESC
    LIMIT ?
    "#,
  )
  .bind(user_id.to_string())
  .bind(lift_id.to_string())
  .bind(limit)
  .fetch_all(pool)
  .await?;
  rows.iter().map(row_to_logged_set).collect()
}

/// Weight of the most recent logged work set, for LinearAdd strategies.
pub async fn latest_work_set_weight(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
) -> Result<Option<Decimal>, EngineError> {
  let sets = recent_work_sets(pool, user_id, lift_id, 1).await?;
  Ok(sets.first().map(|s| s.weight))
}

/// Most recent AMRAP set, for rep-threshold progressions.
pub async fn latest_amrap_set(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
) -> Result<Option<LoggedSet>, EngineError> {
  let row = sqlx::query(
    r#"
    SELECT * FROM logged_sets
    WHERE user_id = ? AND lift_id = ? AND is_amrap = 1
    ORDER BY logged_at DESC
    LIMIT 1
    "#,
  )
  .bind(user_id.to_string())
  .bind(lift_id.to_string())
  .fetch_optional(pool)
  .await?;
  row.as_ref().map(row_to_logged_set).transpose()
}

/// Count of consecutive failed work sets, newest first. A set fails when it
/// performs fewer reps than its target; the streak ends at the first set
/// that meets its target. Sets without a target are ignored.
pub async fn consecutive_failed_work_sets(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
) -> Result<u32, EngineError> {
  let sets = recent_work_sets(pool, user_id, lift_id, 50).await?;

  let mut failures = 0;
  for set in &sets {
    match set.target_reps {
      Some(target) if set.performed_reps < target => failures += 1,
      Some(_) => break,
      None => continue,
    }
  }
  Ok(failures)
}

/// Work sets from the most recent session (same UTC calendar day as the
/// latest logged work set).
pub async fn last_session_work_sets(
  pool: &SqlitePool,
  user_id: Uuid,
  lift_id: Uuid,
) -> Result<Vec<LoggedSet>, EngineError> {
  let sets = recent_work_sets(pool, user_id, lift_id, 50).await?;

  let Some(latest) = sets.first() else {
    return Ok(Vec::new());
  };
  let session_day = latest.logged_at.date_naive();
  Ok(
    sets
      .into_iter()
      .filter(|s| s.logged_at.date_naive() == session_day)
      .collect(),
  )
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
