use serde::Serialize;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FitError {
  #[error("Not authenticated")]
  NotAuthenticated,

  #[error("{0} not found")]
  NotFound(String),

  #[error("Store error: {0}")]
  Persistence(String),

  #[error("Failed to create workout{}: {reason}", exercise_suffix(.exercise))]
  CreationFailed {
    /// Set once the parent workout row exists; the caller owns cleanup
    workout_id: Option<String>,
    exercise: Option<String>,
    reason: String,
  },

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Missing configuration: {0}")]
  MissingConfig(String),
}

pub type FitResult<T> = Result<T, FitError>;

fn exercise_suffix(exercise: &Option<String>) -> String {
  exercise
    .as_ref()
    .map(|e| format!(" (exercise '{}')", e))
    .unwrap_or_default()
}

impl FitError {
  /// Wrap a failure during workout creation with the progress made so far
  pub fn creation_failed(workout_id: Option<&str>, exercise: Option<&str>, cause: FitError) -> Self {
    let reason = match cause {
      FitError::CreationFailed { reason, .. } => reason,
      other => other.to_string(),
    };
    FitError::CreationFailed {
      workout_id: workout_id.map(String::from),
      exercise: exercise.map(String::from),
      reason,
    }
  }
}

impl From<reqwest::Error> for FitError {
  fn from(e: reqwest::Error) -> Self {
    FitError::Persistence(format!("HTTP request failed: {}", e))
  }
}

impl From<sqlx::Error> for FitError {
  fn from(e: sqlx::Error) -> Self {
    match e {
      sqlx::Error::RowNotFound => FitError::NotFound("Row".into()),
      other => FitError::Persistence(format!("Database error: {}", other)),
    }
  }
}

impl From<sqlx::migrate::MigrateError> for FitError {
  fn from(e: sqlx::migrate::MigrateError) -> Self {
    FitError::Persistence(format!("Migration failed: {}", e))
  }
}

impl From<serde_json::Error> for FitError {
  fn from(e: serde_json::Error) -> Self {
    FitError::Persistence(format!("Malformed row: {}", e))
  }
}

impl Serialize for FitError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}
