//! Percentage lookup tables
//!
//! Three keyed, read-only-at-resolution tables: weekly wave percentages,
//! per-day variation percentages, and the global RPE chart. All lookups are
//! exact-match; a missing entry is a `LookupMiss` configuration error, never
//! an interpolation.

use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::parse_decimal;

// ---------------------------------------------------------------------------
/// Weekly Lookup: week number -> percentage set
// ---------------------------------------------------------------------------

/// Create a weekly lookup with its entries. Each week maps to an ordered
/// percentage set (the week's wave, warm-up to top).
pub async fn create_weekly_lookup(
    pool: &SqlitePool,
    name: &str,
    entries: &[(u32, Vec<Decimal>)],
) -> Result<Uuid, EngineError> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO weekly_lookups (id, name) VALUES (?, ?)")
        .bind(id.to_string())
        .bind(name)
        .execute(pool)
        .await?;

    for (week_number, percentages) in entries {
        let json = serde_json::to_string(percentages).unwrap_or_default();
        sqlx::query(
            r#"
            INSERT INTO weekly_lookup_entries (lookup_id, week_number, percentages_json)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(*week_number as i64)
        .bind(json)
        .execute(pool)
        .await?;
    }

    Ok(id)
}

/// Percentage set for a week of the cycle.
pub async fn weekly_percentages(
    pool: &SqlitePool,
    lookup_id: Uuid,
    week_number: u32,
) -> Result<Vec<Decimal>, EngineError> {
    let row = sqlx::query(
        r#"
        SELECT percentages_json FROM weekly_lookup_entries
        WHERE lookup_id = ? AND week_number = ?
        "#,
    )
    .bind(lookup_id.to_string())
    .bind(week_number as i64)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        EngineError::LookupMiss(format!("weekly lookup {} has no week {}", lookup_id, week_number))
    })?;

    let json: String = row.get("percentages_json");
    serde_json::from_str(&json)
        .map_err(|e| EngineError::Decode(format!("bad weekly percentages: {}", e)))
}

// ---------------------------------------------------------------------------
/// Daily Lookup: day slug -> percentage
// ---------------------------------------------------------------------------

pub async fn create_daily_lookup(
    pool: &SqlitePool,
    name: &str,
    entries: &[(&str, Decimal)],
) -> Result<Uuid, EngineError> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO daily_lookups (id, name) VALUES (?, ?)")
        .bind(id.to_string())
        .bind(name)
        .execute(pool)
        .await?;

    for (day_slug, percentage) in entries {
        sqlx::query(
            r#"
            INSERT INTO daily_lookup_entries (lookup_id, day_slug, percentage)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(*day_slug)
        .bind(percentage.to_string())
        .execute(pool)
        .await?;
    }

    Ok(id)
}

/// Variation percentage for a day slug.
pub async fn daily_percentage(
    pool: &SqlitePool,
    lookup_id: Uuid,
    day_slug: &str,
) -> Result<Decimal, EngineError> {
    let row = sqlx::query(
        r#"
        SELECT percentage FROM daily_lookup_entries
        WHERE lookup_id = ? AND day_slug = ?
        "#,
    )
    .bind(lookup_id.to_string())
    .bind(day_slug)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        EngineError::LookupMiss(format!("daily lookup {} has no day '{}'", lookup_id, day_slug))
    })?;

    let percentage: String = row.get("percentage");
    parse_decimal(&percentage)
}

// ---------------------------------------------------------------------------
/// RPE Chart: (reps, rpe) -> percentage of true max
// ---------------------------------------------------------------------------

/// The full chart, preloaded once per resolution so strategy resolution
/// stays a pure function.
#[derive(Debug, Clone)]
pub struct RpeChart {
    entries: HashMap<(u32, Decimal), Decimal>,
}

impl RpeChart {
    pub fn new(entries: HashMap<(u32, Decimal), Decimal>) -> Self {
        Self { entries }
    }

    /// Exact-match percentage for (reps, rpe).
    pub fn percentage(&self, reps: u32, rpe: Decimal) -> Option<Decimal> {
        self.entries.get(&(reps, rpe.normalize())).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Exact-match chart percentage for a single (reps, rpe) pair.
pub async fn rpe_percentage(
    pool: &SqlitePool,
    reps: u32,
    rpe: Decimal,
) -> Result<Decimal, EngineError> {
    let row = sqlx::query("SELECT percentage FROM rpe_chart WHERE reps = ? AND rpe = ?")
        .bind(reps as i64)
        .bind(rpe.normalize().to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            EngineError::LookupMiss(format!("RPE chart has no entry for {}x@{}", reps, rpe))
        })?;

    let percentage: String = row.get("percentage");
    parse_decimal(&percentage)
}

pub async fn load_rpe_chart(pool: &SqlitePool) -> Result<RpeChart, EngineError> {
    let rows = sqlx::query("SELECT reps, rpe, percentage FROM rpe_chart")
        .fetch_all(pool)
        .await?;

    let mut entries = HashMap::with_capacity(rows.len());
    for row in rows {
        let reps: i64 = row.get("reps");
        let rpe: String = row.get("rpe");
        let percentage: String = row.get("percentage");
        entries.insert(
            (reps as u32, parse_decimal(&rpe)?.normalize()),
            parse_decimal(&percentage)?,
        );
    }
    Ok(RpeChart::new(entries))
}
