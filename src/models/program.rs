//! Program structure: prescriptions, days, programs
//!
//! A Prescription is an immutable template pairing a lift with a load
//! strategy and a set scheme. Days assemble prescriptions in order, programs
//! assemble days into a cycle of weeks. Strategy and scheme descriptors are
//! closed tagged unions stored as JSON columns.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::lift::MaxKind;
use crate::models::{parse_decimal, parse_uuid};

/// ---------------------------------------------------------------------------
/// Load Strategy: how a weight is computed
/// ---------------------------------------------------------------------------

/// Where a percentage comes from: a literal in the template, or the program's
/// weekly/daily lookup table at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PercentSource {
  Literal { value: Decimal },
  WeeklyLookup,
  DailyLookup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadStrategy {
  /// Percentage of a reference max of the named kind
  PercentOf { reference: MaxKind, percentage: PercentSource },
  /// RPE chart percentage of the true max for (reps, rpe)
  RpeTarget { reps: u32, rpe: Decimal },
  /// Most recent logged work-set weight plus a fixed increment
  LinearAdd { increment: Decimal },
  /// No computed weight; the athlete works up to an N-rep max
  FindRm { target_reps: u32 },
  /// Percentage of a weight resolved earlier in the same day
  RelativeTo { source_slot: String, percentage: Decimal },
}

impl LoadStrategy {
  pub fn from_json(json: &str) -> Result<Self, EngineError> {
    serde_json::from_str(json)
      .map_err(|e| EngineError::Decode(format!("bad load strategy: {}", e)))
  }

  pub fn to_json(&self) -> String {
    serde_json::to_string(self).unwrap_or_default()
  }
}

/// ---------------------------------------------------------------------------
/// Set Scheme: how sets and reps are structured around a weight
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SetScheme {
  /// `sets` identical entries of `reps`
  Fixed { sets: u32, reps: u32 },
  /// One entry per percentage of the resolved weight
  Ramp { percentages: Vec<Decimal>, reps: u32 },
  /// Top sets at full weight, then backoff sets at a fraction of it
  TopBackoff {
    top_sets: u32,
    top_reps: u32,
    backoff_sets: u32,
    backoff_reps: u32,
    backoff_percent: Decimal,
  },
  /// Fixed sets with an open-ended final set
  Amrap { sets: u32, min_reps: u32 },
  /// Max-rep sets: repeat until reps drop, structure decided live
  Mrs { initial_reps: u32, max_sets: u32 },
  /// Drop weight each set until a stop RPE, structure decided live
  FatigueDrop { drop_percent: Decimal, stop_rpe: Decimal },
  /// Accumulate a rep total in as many sets as it takes
  TotalReps { target: u32 },
}

impl SetScheme {
  pub fn from_json(json: &str) -> Result<Self, EngineError> {
    serde_json::from_str(json)
      .map_err(|e| EngineError::Decode(format!("bad set scheme: {}", e)))
  }

  pub fn to_json(&self) -> String {
    serde_json::to_string(self).unwrap_or_default()
  }
}

/// ---------------------------------------------------------------------------
/// Domain Rows
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
  pub id: Uuid,
  pub lift_id: Uuid,
  pub load_strategy: LoadStrategy,
  pub set_scheme: SetScheme,
  pub notes: Option<String>,
  pub rest_seconds: Option<u32>,
}

/// For inserting new prescriptions (without id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrescription {
  pub lift_id: Uuid,
  pub load_strategy: LoadStrategy,
  pub set_scheme: SetScheme,
  pub notes: Option<String>,
  pub rest_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Day {
  pub id: Uuid,
  pub slug: String,
  pub name: String,
}

/// One exercise slot of a day, hydrated with its prescription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySlot {
  pub slot_ref: String,
  pub position: u32,
  pub prescription: Prescription,
}

/// Slot reference + prescription id, for day assembly.
#[derive(Debug, Clone)]
pub struct NewDaySlot {
  pub slot_ref: String,
  pub prescription_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
  pub id: Uuid,
  pub name: String,
  pub slug: String,
  pub weeks_per_cycle: u32,
  pub rounding_increment: Decimal,
  pub weekly_lookup_id: Option<Uuid>,
  pub daily_lookup_id: Option<Uuid>,
}

/// For inserting new programs (without id)
#[derive(Debug, Clone)]
pub struct NewProgram {
  pub name: String,
  pub slug: String,
  pub weeks_per_cycle: u32,
  pub rounding_increment: Decimal,
  pub weekly_lookup_id: Option<Uuid>,
  pub daily_lookup_id: Option<Uuid>,
}

/// How many days each week of the cycle has; drives the state machine.
#[derive(Debug, Clone)]
pub struct ProgramShape {
  pub weeks_per_cycle: u32,
  pub days_per_week: Vec<u32>,
}

impl ProgramShape {
  pub fn days_in(&self, week_number: u32) -> u32 {
    self
      .days_per_week
      .get(week_number.saturating_sub(1) as usize)
      .copied()
      .unwrap_or(0)
  }
}

/// ---------------------------------------------------------------------------
/// Slot-Order Validation
/// ---------------------------------------------------------------------------

/// RelativeTo strategies may only reference slots declared earlier in the
/// same day. Checked when the day is assembled, so invalid authoring fails
/// fast instead of surfacing at resolution time. Declaration order doubles
/// as dependency order, so any reference cycle necessarily contains a
/// forward edge and is rejected here.
pub fn validate_slot_order(slots: &[(&str, &LoadStrategy)]) -> Result<(), EngineError> {
  let mut seen: Vec<&str> = Vec::with_capacity(slots.len());
  for (slot_ref, strategy) in slots {
    if let LoadStrategy::RelativeTo { source_slot, .. } = strategy {
      if !seen.contains(&source_slot.as_str()) {
        return Err(EngineError::ForwardReference {
          reference: source_slot.clone(),
        });
      }
    }
    seen.push(slot_ref);
  }
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Prescription Store
/// ---------------------------------------------------------------------------

pub async fn create_prescription(
  pool: &SqlitePool,
  new: &NewPrescription,
) -> Result<Prescription, EngineError> {
  let prescription = Prescription {
    id: Uuid::new_v4(),
    lift_id: new.lift_id,
    load_strategy: new.load_strategy.clone(),
    set_scheme: new.set_scheme.clone(),
    notes: new.notes.clone(),
    rest_seconds: new.rest_seconds,
  };

  sqlx::query(
    r#"
    INSERT INTO prescriptions (id, lift_id, load_strategy_json, set_scheme_json, notes, rest_seconds)
    VALUES (?, ?, ?, ?, ?, ?)
    "#,
  )
  .bind(prescription.id.to_string())
  .bind(prescription.lift_id.to_string())
  .bind(prescription.load_strategy.to_json())
  .bind(prescription.set_scheme.to_json())
  .bind(&prescription.notes)
  .bind(prescription.rest_seconds.map(|r| r as i64))
  .execute(pool)
  .await?;

  Ok(prescription)
}

fn row_to_prescription(row: &sqlx::sqlite::SqliteRow) -> Result<Prescription, EngineError> {
  let id: String = row.get("id");
  let lift_id: String = row.get("lift_id");
  let strategy_json: String = row.get("load_strategy_json");
  let scheme_json: String = row.get("set_scheme_json");
  let rest_seconds: Option<i64> = row.get("rest_seconds");
  Ok(Prescription {
    id: parse_uuid(&id)?,
    lift_id: parse_uuid(&lift_id)?,
    load_strategy: LoadStrategy::from_json(&strategy_json)?,
    set_scheme: SetScheme::from_json(&scheme_json)?,
    notes: row.get("notes"),
    rest_seconds: rest_seconds.map(|r| r as u32),
  })
}

pub async fn get_prescription(pool: &SqlitePool, id: Uuid) -> Result<Prescription, EngineError> {
  let row = sqlx::query("SELECT * FROM prescriptions WHERE id = ?")
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::NotFound { entity: "prescription", id: id.to_string() })?;
  row_to_prescription(&row)
}

/// ---------------------------------------------------------------------------
/// Day Store
/// ---------------------------------------------------------------------------

/// Assemble a day from ordered slots. Forward references between slots are
/// rejected here, before anything is written.
pub async fn create_day(
  pool: &SqlitePool,
  slug: &str,
  name: &str,
  slots: &[NewDaySlot],
) -> Result<Day, EngineError> {
  let mut prescriptions = Vec::with_capacity(slots.len());
  for slot in slots {
    prescriptions.push(get_prescription(pool, slot.prescription_id).await?);
  }
  let ordered: Vec<(&str, &LoadStrategy)> = slots
    .iter()
    .zip(prescriptions.iter())
    .map(|(slot, p)| (slot.slot_ref.as_str(), &p.load_strategy))
    .collect();
  validate_slot_order(&ordered)?;

  let day = Day {
    id: Uuid::new_v4(),
    slug: slug.to_string(),
    name: name.to_string(),
  };

  sqlx::query("INSERT INTO days (id, slug, name) VALUES (?, ?, ?)")
    .bind(day.id.to_string())
    .bind(&day.slug)
    .bind(&day.name)
    .execute(pool)
    .await?;

  for (position, slot) in slots.iter().enumerate() {
    sqlx::query(
      r#"
      INSERT INTO day_slots (day_id, position, slot_ref, prescription_id)
      VALUES (?, ?, ?, ?)
      "#,
    )
    .bind(day.id.to_string())
    .bind(position as i64)
    .bind(&slot.slot_ref)
    .bind(slot.prescription_id.to_string())
    .execute(pool)
    .await?;
  }

  Ok(day)
}

/// Load a day's slots in declared order, prescriptions hydrated.
pub async fn load_day_slots(pool: &SqlitePool, day_id: Uuid) -> Result<Vec<DaySlot>, EngineError> {
  let rows = sqlx::query(
    r#"
    SELECT s.position, s.slot_ref, p.id, p.lift_id, p.load_strategy_json,
           p.set_scheme_json, p.notes, p.rest_seconds
    FROM day_slots s
    JOIN prescriptions p ON p.id = s.prescription_id
    WHERE s.day_id = ?
    ORDER BY s.position
    "#,
  )
  .bind(day_id.to_string())
  .fetch_all(pool)
  .await?;

  let mut slots = Vec::with_capacity(rows.len());
  for row in &rows {
    let position: i64 = row.get("position");
    slots.push(DaySlot {
      slot_ref: row.get("slot_ref"),
      position: position as u32,
      prescription: row_to_prescription(row)?,
    });
  }
  Ok(slots)
}

/// ---------------------------------------------------------------------------
/// Program Store
/// ---------------------------------------------------------------------------

pub async fn create_program(pool: &SqlitePool, new: &NewProgram) -> Result<Program, EngineError> {
  let program = Program {
    id: Uuid::new_v4(),
    name: new.name.clone(),
    slug: new.slug.clone(),
    weeks_per_cycle: new.weeks_per_cycle,
    rounding_increment: new.rounding_increment,
    weekly_lookup_id: new.weekly_lookup_id,
    daily_lookup_id: new.daily_lookup_id,
  };

  sqlx::query(
    r#"
    INSERT INTO programs (id, name, slug, weeks_per_cycle, rounding_increment,
                          weekly_lookup_id, daily_lookup_id)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    "#,
  )
  .bind(program.id.to_string())
  .bind(&program.name)
  .bind(&program.slug)
  .bind(program.weeks_per_cycle as i64)
  .bind(program.rounding_increment.to_string())
  .bind(program.weekly_lookup_id.map(|id| id.to_string()))
  .bind(program.daily_lookup_id.map(|id| id.to_string()))
  .execute(pool)
  .await?;

  Ok(program)
}

fn row_to_program(row: &sqlx::sqlite::SqliteRow) -> Result<Program, EngineError> {
  let id: String = row.get("id");
  let weeks_per_cycle: i64 = row.get("weeks_per_cycle");
  let rounding_increment: String = row.get("rounding_increment");
  let weekly_lookup_id: Option<String> = row.get("weekly_lookup_id");
  let daily_lookup_id: Option<String> = row.get("daily_lookup_id");
  Ok(Program {
    id: parse_uuid(&id)?,
    name: row.get("name"),
    slug: row.get("slug"),
    weeks_per_cycle: weeks_per_cycle as u32,
    rounding_increment: parse_decimal(&rounding_increment)?,
    weekly_lookup_id: weekly_lookup_id.as_deref().map(parse_uuid).transpose()?,
    daily_lookup_id: daily_lookup_id.as_deref().map(parse_uuid).transpose()?,
  })
}

pub async fn get_program(pool: &SqlitePool, id: Uuid) -> Result<Program, EngineError> {
  let row = sqlx::query("SELECT * FROM programs WHERE id = ?")
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(EngineError::NotFound { entity: "program", id: id.to_string() })?;
  row_to_program(&row)
}

/// Place a day at (week, position) of the program's cycle.
pub async fn assign_day(
  pool: &SqlitePool,
  program_id: Uuid,
  week_number: u32,
  position: u32,
  day_id: Uuid,
) -> Result<(), EngineError> {
  sqlx::query(
    r#"
    INSERT INTO program_days (program_id, week_number, position, day_id)
    VALUES (?, ?, ?, ?)
    "#,
  )
  .bind(program_id.to_string())
  .bind(week_number as i64)
  .bind(position as i64)
  .bind(day_id.to_string())
  .execute(pool)
  .await?;
  Ok(())
}

fn row_to_day(row: &sqlx::sqlite::SqliteRow) -> Result<Day, EngineError> {
  let id: String = row.get("id");
  Ok(Day {
    id: parse_uuid(&id)?,
    slug: row.get("slug"),
    name: row.get("name"),
  })
}

/// Day at a (week, day-index) position of the cycle.
pub async fn day_for(
  pool: &SqlitePool,
  program_id: Uuid,
  week_number: u32,
  day_index: u32,
) -> Result<Day, EngineError> {
  let row = sqlx::query(
    r#"
    SELECT d.id, d.slug, d.name
    FROM program_days pd
    JOIN days d ON d.id = pd.day_id
    WHERE pd.program_id = ? AND pd.week_number = ? AND pd.position = ?
    "#,
  )
  .bind(program_id.to_string())
  .bind(week_number as i64)
  .bind(day_index as i64)
  .fetch_optional(pool)
  .await?
  .ok_or(EngineError::NotFound {
    entity: "program day",
    id: format!("week {} day {}", week_number, day_index),
  })?;
  row_to_day(&row)
}

/// Day of a given week looked up by slug, for previews.
pub async fn day_by_slug(
  pool: &SqlitePool,
  program_id: Uuid,
  week_number: u32,
  slug: &str,
) -> Result<Day, EngineError> {
  let row = sqlx::query(
    r#"
    SELECT d.id, d.slug, d.name
    FROM program_days pd
    JOIN days d ON d.id = pd.day_id
    WHERE pd.program_id = ? AND pd.week_number = ? AND d.slug = ?
    "#,
  )
  .bind(program_id.to_string())
  .bind(week_number as i64)
  .bind(slug)
  .fetch_optional(pool)
  .await?
  .ok_or(EngineError::NotFound {
    entity: "program day",
    id: format!("week {} slug '{}'", week_number, slug),
  })?;
  row_to_day(&row)
}

pub async fn program_shape(pool: &SqlitePool, program: &Program) -> Result<ProgramShape, EngineError> {
  let rows = sqlx::query(
    r#"
    SELECT week_number, COUNT(*) AS day_count
    FROM program_days
    WHERE program_id = ?
    GROUP BY week_number
    "#,
  )
  .bind(program.id.to_string())
  .fetch_all(pool)
  .await?;

  let mut days_per_week = vec![0u32; program.weeks_per_cycle as usize];
  for row in rows {
    let week: i64 = row.get("week_number");
    let count: i64 = row.get("day_count");
    if week >= 1 && (week as usize) <= days_per_week.len() {
      days_per_week[week as usize - 1] = count as u32;
    }
  }

  Ok(ProgramShape {
    weeks_per_cycle: program.weeks_per_cycle,
    days_per_week,
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
