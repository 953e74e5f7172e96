pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod partners;
pub mod profiles;
pub mod session;
pub mod stats;
pub mod store;
pub mod workouts;

#[cfg(test)]
mod test_utils;

pub use config::AppConfig;
pub use db::AppState;
pub use error::{FitError, FitResult};
pub use session::Session;
pub use store::Store;

/// Load `.env`, read the configuration, start logging and connect the store
pub async fn run() -> FitResult<AppState> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  let config = AppConfig::from_env()?;
  logging::init_logger(config.log_level);

  let state = AppState::initialize(config).await?;
  log::info!("Store ready");
  Ok(state)
}
