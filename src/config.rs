//! Runtime configuration read from the environment (and `.env` via dotenvy)

use chrono::Weekday;
use log::LevelFilter;
use std::env;

use crate::error::{FitError, FitResult};
use crate::logging::parse_level;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://workouts.db?mode=rwc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Rest,
  Sqlite,
}

impl std::str::FromStr for StoreBackend {
  type Err = FitError;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "rest" => Ok(Self::Rest),
      "sqlite" => Ok(Self::Sqlite),
      other => Err(FitError::InvalidInput(format!("Unknown store backend: {}", other))),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
  Rest { url: String, api_key: String },
  Sqlite { database_url: String },
}

impl StoreConfig {
  pub fn backend(&self) -> StoreBackend {
    match self {
      StoreConfig::Rest { .. } => StoreBackend::Rest,
      StoreConfig::Sqlite { .. } => StoreBackend::Sqlite,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
  pub store: StoreConfig,
  /// First day of the statistics week
  pub week_start: Weekday,
  pub log_level: LevelFilter,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store: StoreConfig::Sqlite {
        database_url: DEFAULT_DATABASE_URL.to_string(),
      },
      week_start: Weekday::Sun,
      log_level: LevelFilter::Info,
    }
  }
}

impl AppConfig {
  pub fn from_env() -> FitResult<Self> {
    let store_url = non_empty_var("WORKOUT_STORE_URL");

    let backend = match non_empty_var("WORKOUT_STORE") {
      Some(value) => value.parse()?,
      None if store_url.is_some() => StoreBackend::Rest,
      None => StoreBackend::Sqlite,
    };

    let store = match backend {
      StoreBackend::Rest => StoreConfig::Rest {
        url: store_url.ok_or_else(|| FitError::MissingConfig("WORKOUT_STORE_URL".into()))?,
        api_key: non_empty_var("WORKOUT_STORE_KEY")
          .ok_or_else(|| FitError::MissingConfig("WORKOUT_STORE_KEY".into()))?,
      },
      StoreBackend::Sqlite => StoreConfig::Sqlite {
        database_url: non_empty_var("WORKOUT_DATABASE_URL")
          .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
      },
    };

    let week_start = match non_empty_var("WORKOUT_WEEK_START") {
      Some(value) => value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| FitError::InvalidInput(format!("Unknown weekday: {}", value)))?,
      None => Weekday::Sun,
    };

    let log_level = match non_empty_var("WORKOUT_LOG") {
      Some(value) => parse_level(&value)
        .ok_or_else(|| FitError::InvalidInput(format!("Unknown log level: {}", value)))?,
      None => LevelFilter::Info,
    };

    Ok(Self {
      store,
      week_start,
      log_level,
    })
  }
}

fn non_empty_var(key: &str) -> Option<String> {
  env::var(key).ok().filter(|v| !v.trim().is_empty())
}
