use serde::{Deserialize, Serialize};

use super::coerce;
use crate::error::{FitError, FitResult};

const HEIGHT_RANGE_IN: (f64, f64) = (36.0, 96.0);
const WEIGHT_RANGE_LBS: (f64, f64) = (50.0, 500.0);

/// Application profile row, keyed separately from the auth identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
  #[serde(deserialize_with = "coerce::text")]
  pub id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub auth_id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub email: String,
  #[serde(deserialize_with = "coerce::text")]
  pub name: String,
  #[serde(deserialize_with = "coerce::text")]
  pub username: String,
  /// Inches
  #[serde(deserialize_with = "coerce::optional_number")]
  pub height: Option<f64>,
  /// Pounds
  #[serde(deserialize_with = "coerce::optional_number")]
  pub weight: Option<f64>,
}

/// Profile details collected at sign-up
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProfile {
  pub email: String,
  pub name: String,
  pub username: String,
  pub height: Option<f64>,
  pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub height: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub weight: Option<f64>,
}

impl NewProfile {
  pub fn validate(&self) -> FitResult<()> {
    validate_username(&self.username)?;
    validate_measurements(self.height, self.weight)
  }
}

impl ProfileUpdate {
  pub fn validate(&self) -> FitResult<()> {
    if let Some(username) = &self.username {
      validate_username(username)?;
    }
    if let Some(name) = &self.name {
      if name.trim().is_empty() {
        return Err(FitError::InvalidInput("Name cannot be empty".into()));
      }
    }
    validate_measurements(self.height, self.weight)
  }

  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.email.is_none()
      && self.username.is_none()
      && self.height.is_none()
      && self.weight.is_none()
  }
}

fn validate_username(username: &str) -> FitResult<()> {
  let valid = !username.is_empty()
    && username
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid {
    Ok(())
  } else {
    Err(FitError::InvalidInput(
      "Username can only contain letters, numbers, and underscores".into(),
    ))
  }
}

fn validate_measurements(height: Option<f64>, weight: Option<f64>) -> FitResult<()> {
  if let Some(h) = height {
    if !(HEIGHT_RANGE_IN.0..=HEIGHT_RANGE_IN.1).contains(&h) {
      return Err(FitError::InvalidInput(format!(
        "Height must be between {} and {} inches",
        HEIGHT_RANGE_IN.0, HEIGHT_RANGE_IN.1
      )));
    }
  }
  if let Some(w) = weight {
    if !(WEIGHT_RANGE_LBS.0..=WEIGHT_RANGE_LBS.1).contains(&w) {
      return Err(FitError::InvalidInput(format!(
        "Weight must be between {} and {} lbs",
        WEIGHT_RANGE_LBS.0, WEIGHT_RANGE_LBS.1
      )));
    }
  }
  Ok(())
}
