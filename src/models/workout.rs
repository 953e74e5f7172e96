use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::coerce;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
  #[default]
  Strength,
  WeightLoss,
}

impl std::fmt::Display for WorkoutType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Strength => write!(f, "strength"),
      Self::WeightLoss => write!(f, "weight_loss"),
    }
  }
}

impl std::str::FromStr for WorkoutType {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "strength" => Ok(Self::Strength),
      "weight_loss" => Ok(Self::WeightLoss),
      _ => Err(format!("Unknown workout type: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl std::fmt::Display for Difficulty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Easy => write!(f, "easy"),
      Self::Medium => write!(f, "medium"),
      Self::Hard => write!(f, "hard"),
    }
  }
}

impl std::str::FromStr for Difficulty {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "easy" => Ok(Self::Easy),
      "medium" => Ok(Self::Medium),
      "hard" => Ok(Self::Hard),
      _ => Err(format!("Unknown difficulty: {}", s)),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Stored Records
/// ---------------------------------------------------------------------------

/// A dated workout. Partial selects are fine: anything not fetched keeps its
/// default, and `exercises` is only populated when embedded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyWorkout {
  #[serde(deserialize_with = "coerce::text")]
  pub id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub user_id: String,
  #[serde(deserialize_with = "coerce::date")]
  pub date: NaiveDate,
  #[serde(deserialize_with = "coerce::text")]
  pub title: String,
  #[serde(deserialize_with = "coerce::or_default")]
  pub workout_type: WorkoutType,
  #[serde(deserialize_with = "coerce::or_default")]
  pub difficulty: Difficulty,
  #[serde(deserialize_with = "coerce::count")]
  pub duration: u32,
  #[serde(deserialize_with = "coerce::flag")]
  pub completed: bool,
  #[serde(deserialize_with = "coerce::flag")]
  pub is_favorite: bool,
  #[serde(deserialize_with = "coerce::flag")]
  pub is_shared: bool,
  #[serde(deserialize_with = "coerce::list")]
  pub shared_with: Vec<String>,
  #[serde(
    rename = "workout_exercises",
    deserialize_with = "coerce::list",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub exercises: Vec<WorkoutExercise>,
}

impl DailyWorkout {
  pub fn total_sets(&self) -> usize {
    self.exercises.iter().map(|e| e.sets.len()).sum()
  }

  pub fn completed_sets(&self) -> usize {
    self
      .exercises
      .iter()
      .map(|e| e.sets.iter().filter(|s| s.completed).count())
      .sum()
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkoutExercise {
  #[serde(deserialize_with = "coerce::text")]
  pub id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub daily_workout_id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub name: String,
  #[serde(deserialize_with = "coerce::count")]
  pub target_sets: u32,
  /// Free-form prescription, e.g. "8-10" or "AMRAP"
  #[serde(deserialize_with = "coerce::text")]
  pub target_reps: String,
  pub notes: Option<String>,
  pub equipment: Option<String>,
  #[serde(
    rename = "exercise_sets",
    deserialize_with = "coerce::list",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub sets: Vec<ExerciseSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseSet {
  #[serde(deserialize_with = "coerce::text")]
  pub id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub exercise_id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub user_id: String,
  #[serde(deserialize_with = "coerce::count")]
  pub set_number: u32,
  #[serde(deserialize_with = "coerce::number")]
  pub weight: f64,
  #[serde(deserialize_with = "coerce::count")]
  pub reps: u32,
  #[serde(deserialize_with = "coerce::flag")]
  pub completed: bool,
}

/// ---------------------------------------------------------------------------
/// Inserts and Patches
/// ---------------------------------------------------------------------------

/// For inserting new workouts (without id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDailyWorkout {
  pub user_id: String,
  pub date: NaiveDate,
  pub title: String,
  pub workout_type: WorkoutType,
  pub difficulty: Difficulty,
  pub duration: u32,
  pub completed: bool,
  pub is_favorite: bool,
  pub is_shared: bool,
  pub shared_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkoutExercise {
  pub daily_workout_id: String,
  pub name: String,
  pub target_sets: u32,
  pub target_reps: String,
  pub notes: Option<String>,
  pub equipment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExerciseSet {
  pub exercise_id: String,
  pub user_id: String,
  pub set_number: u32,
  pub weight: f64,
  pub reps: u32,
  pub completed: bool,
}

/// Changes logged against a single set; `None` leaves the column alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub weight: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reps: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completed: Option<bool>,
}

impl SetUpdate {
  pub fn is_empty(&self) -> bool {
    self.weight.is_none() && self.reps.is_none() && self.completed.is_none()
  }
}
