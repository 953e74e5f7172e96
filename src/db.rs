use log::info;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

use crate::config::{AppConfig, StoreConfig};
use crate::error::FitResult;
use crate::stats::WeekWindow;
use crate::store::{RestStore, SqliteStore, Store};

pub type DbPool = SqlitePool;

/// Application state holding the configured store
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub config: AppConfig,
}

impl AppState {
  /// Connect the configured backend; SQLite databases are migrated first
  pub async fn initialize(config: AppConfig) -> FitResult<Self> {
    let store: Arc<dyn Store> = match &config.store {
      StoreConfig::Rest { url, api_key } => {
        info!("Using REST store at {}", url);
        Arc::new(RestStore::new(url, api_key)?)
      }
      StoreConfig::Sqlite { database_url } => {
        Arc::new(SqliteStore::new(initialize_db(database_url).await?))
      }
    };

    Ok(Self { store, config })
  }

  pub fn store(&self) -> &dyn Store {
    self.store.as_ref()
  }

  /// This week so far, starting on the configured weekday
  pub fn current_window(&self) -> WeekWindow {
    WeekWindow::current(self.config.week_start)
  }
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(database_url: &str) -> FitResult<DbPool> {
  info!("Initializing database at: {}", database_url);

  // An in-memory database exists per connection, so keep a single one
  let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

  let pool = SqlitePoolOptions::new()
    .max_connections(max_connections)
    .connect(database_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  info!("Database initialized successfully");

  Ok(pool)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{tables, Query};
  use crate::test_utils::today;
  use chrono::{Datelike, Weekday};

  #[tokio::test]
  async fn test_initialize_sqlite_state() {
    let config = AppConfig {
      store: StoreConfig::Sqlite {
        database_url: "sqlite::memory:".into(),
      },
      ..AppConfig::default()
    };

    let state = AppState::initialize(config).await.unwrap();
    let rows = state.store().select(&Query::from(tables::USERS)).await.unwrap();
    assert!(rows.is_empty());
  }

  #[tokio::test]
  async fn test_initialize_rest_state_rejects_bad_url() {
    let config = AppConfig {
      store: StoreConfig::Rest {
        url: "not a url".into(),
        api_key: "anon".into(),
      },
      ..AppConfig::default()
    };

    assert!(AppState::initialize(config).await.is_err());
  }

  #[tokio::test]
  async fn test_current_window_uses_configured_week_start() {
    let config = AppConfig {
      store: StoreConfig::Sqlite {
        database_url: "sqlite::memory:".into(),
      },
      week_start: Weekday::Mon,
      ..AppConfig::default()
    };

    let state = AppState::initialize(config).await.unwrap();
    let window = state.current_window();
    assert_eq!(window.start.weekday(), Weekday::Mon);
    assert_eq!(window.end, today());
    assert!((window.end - window.start).num_days() < 7);
  }
}
