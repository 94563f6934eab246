use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::env;

use crate::error::EngineError;

pub type DbPool = SqlitePool;

/// Application state holding the database connection pool
pub struct AppState {
  pub db: DbPool,
}

const DEFAULT_DATABASE_URL: &str = "sqlite://powerpro.db?mode=rwc";

/// Initialize the database connection pool and run migrations.
/// Reads `DATABASE_URL` from the environment (a `.env` file is honored).
pub async fn initialize_db() -> Result<DbPool, EngineError> {
  dotenvy::dotenv().ok();
  let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

  tracing::info!(url = %db_url, "initializing database");

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .map_err(sqlx::Error::from)?;

  tracing::info!("database ready");

  Ok(pool)
}
