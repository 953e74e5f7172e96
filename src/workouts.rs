//! Workout generation and day-to-day workout management

use chrono::{Datelike, Local, NaiveDate};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{FitError, FitResult};
use crate::models::{
  DailyWorkout, Difficulty, ExerciseSet, NewDailyWorkout, NewExerciseSet, NewWorkoutExercise,
  SetUpdate, WorkoutExercise, WorkoutType,
};
use crate::profiles::require_profile;
use crate::session::Session;
use crate::stats::{WeekWindow, WeeklyStats};
use crate::store::{
  insert_many, insert_one, select_as, select_first, tables, to_row, Column, Embed, Filter, Query,
  SessionStore, Store,
};

/// ---------------------------------------------------------------------------
/// Requests
/// ---------------------------------------------------------------------------

/// One exercise picked for a new workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSpec {
  pub name: String,
  pub body_part: String,
  pub target_sets: u32,
  pub target_reps: String,
  #[serde(default)]
  pub notes: Option<String>,
  #[serde(default)]
  pub equipment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sharing {
  pub is_shared: bool,
  pub shared_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRequest {
  pub workout_type: WorkoutType,
  pub difficulty: Difficulty,
  pub exercises: Vec<ExerciseSpec>,
  #[serde(default)]
  pub sharing: Option<Sharing>,
}

/// ---------------------------------------------------------------------------
/// Planning
/// ---------------------------------------------------------------------------

/// Numeric month/day/two-digit year without padding on month or day, e.g. `3/7/26`
pub fn format_title_date(date: NaiveDate) -> String {
  format!("{}/{}/{:02}", date.month(), date.day(), date.year().rem_euclid(100))
}

/// Body parts in first-seen order joined with `/`, then the date in parentheses
pub fn build_title(exercises: &[ExerciseSpec], date: NaiveDate) -> String {
  let mut parts: Vec<&str> = Vec::new();
  for exercise in exercises {
    if !parts.contains(&exercise.body_part.as_str()) {
      parts.push(&exercise.body_part);
    }
  }
  format!("{} ({})", parts.join("/"), format_title_date(date))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExercisePlan {
  pub name: String,
  pub target_sets: u32,
  pub target_reps: String,
  pub notes: String,
  pub equipment: Option<String>,
}

impl ExercisePlan {
  fn from_spec(spec: &ExerciseSpec) -> Self {
    Self {
      name: spec.name.clone(),
      target_sets: spec.target_sets,
      target_reps: spec.target_reps.clone(),
      notes: spec.notes.clone().unwrap_or_default(),
      equipment: spec.equipment.clone(),
    }
  }

  pub fn row(&self, workout_id: &str) -> NewWorkoutExercise {
    NewWorkoutExercise {
      daily_workout_id: workout_id.to_string(),
      name: self.name.clone(),
      target_sets: self.target_sets,
      target_reps: self.target_reps.clone(),
      notes: Some(self.notes.clone()),
      equipment: self.equipment.clone(),
    }
  }

  /// Empty set rows numbered from 1
  pub fn sets(&self, exercise_id: &str, user_id: &str) -> Vec<NewExerciseSet> {
    (1..=self.target_sets)
      .map(|set_number| NewExerciseSet {
        exercise_id: exercise_id.to_string(),
        user_id: user_id.to_string(),
        set_number,
        weight: 0.0,
        reps: 0,
        completed: false,
      })
      .collect()
  }
}

/// Everything a new workout will write, before any ids exist
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutPlan {
  pub workout: NewDailyWorkout,
  pub exercises: Vec<ExercisePlan>,
}

impl WorkoutPlan {
  pub fn build(user_id: &str, request: &WorkoutRequest, today: NaiveDate) -> Self {
    let sharing = request.sharing.clone().unwrap_or_default();
    Self {
      workout: NewDailyWorkout {
        user_id: user_id.to_string(),
        date: today,
        title: build_title(&request.exercises, today),
        workout_type: request.workout_type,
        difficulty: request.difficulty,
        duration: 1,
        completed: false,
        is_favorite: false,
        is_shared: sharing.is_shared,
        shared_with: sharing.shared_with,
      },
      exercises: request.exercises.iter().map(ExercisePlan::from_spec).collect(),
    }
  }

  pub fn total_sets(&self) -> u32 {
    self.exercises.iter().map(|e| e.target_sets).sum()
  }
}

/// ---------------------------------------------------------------------------
/// Generation
/// ---------------------------------------------------------------------------

/// Create today's workout for the caller from the picked exercises
pub async fn generate_workout(
  store: &dyn Store,
  session: &Session,
  request: &WorkoutRequest,
) -> FitResult<DailyWorkout> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let profile = require_profile(store, session).await?;
  let plan = WorkoutPlan::build(&profile.id, request, Local::now().date_naive());
  persist_plan(store, &plan).await
}

/// Write the plan row by row: workout, then each exercise followed by its
/// sets. Nothing is rolled back; a failure reports the workout id and the
/// exercise that failed so the caller can clean up.
pub async fn persist_plan(store: &dyn Store, plan: &WorkoutPlan) -> FitResult<DailyWorkout> {
  let mut workout: DailyWorkout = insert_one(store, tables::DAILY_WORKOUTS, &plan.workout)
    .await
    .map_err(|e| FitError::creation_failed(None, None, e))?;

  for exercise in &plan.exercises {
    let fail = |e: FitError| {
      warn!(
        "Workout {} left incomplete at exercise '{}': {}",
        workout.id, exercise.name, e
      );
      FitError::creation_failed(Some(&workout.id), Some(&exercise.name), e)
    };

    let mut created: WorkoutExercise =
      insert_one(store, tables::WORKOUT_EXERCISES, &exercise.row(&workout.id))
        .await
        .map_err(fail)?;

    let sets = exercise.sets(&created.id, &plan.workout.user_id);
    if !sets.is_empty() {
      created.sets = insert_many::<_, ExerciseSet>(store, tables::EXERCISE_SETS, &sets)
        .await
        .map_err(fail)?;
    }
    workout.exercises.push(created);
  }

  info!(
    "Created workout {} with {} exercises and {} sets",
    workout.id,
    plan.exercises.len(),
    plan.total_sets()
  );
  Ok(workout)
}

/// ---------------------------------------------------------------------------
/// Queries
/// ---------------------------------------------------------------------------

fn nested_columns() -> Vec<Column> {
  vec![
    Column::all(),
    Embed::new(tables::WORKOUT_EXERCISES)
      .columns(vec![Column::all(), Embed::new(tables::EXERCISE_SETS).into()])
      .into(),
  ]
}

/// A user's workouts in the window, most recent first, with exercises and sets
pub(crate) async fn fetch_week(
  store: &dyn Store,
  user_id: &str,
  window: WeekWindow,
) -> FitResult<Vec<DailyWorkout>> {
  let query = Query::from(tables::DAILY_WORKOUTS)
    .select(nested_columns())
    .filter(Filter::eq("user_id", user_id))
    .filter(Filter::gte("date", window.start.to_string()))
    .order("date", false);

  // Stored dates may carry a time part, so the upper bound is checked by day
  let mut workouts: Vec<DailyWorkout> = select_as(store, &query).await?;
  workouts.retain(|w| window.contains(w.date));
  debug!("Fetched {} workouts for {} since {}", workouts.len(), user_id, window.start);
  Ok(workouts)
}

pub async fn current_week_workouts(
  store: &dyn Store,
  session: &Session,
  window: WeekWindow,
) -> FitResult<Vec<DailyWorkout>> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let profile = require_profile(store, session).await?;
  fetch_week(store, &profile.id, window).await
}

pub async fn workout_stats(
  store: &dyn Store,
  session: &Session,
  window: WeekWindow,
) -> FitResult<WeeklyStats> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let profile = require_profile(store, session).await?;
  let workouts = fetch_week(store, &profile.id, window).await?;
  Ok(WeeklyStats::compute(&workouts))
}

/// ---------------------------------------------------------------------------
/// Mutations
/// ---------------------------------------------------------------------------

async fn require_owned_workout(
  store: &dyn Store,
  user_id: &str,
  workout_id: &str,
) -> FitResult<DailyWorkout> {
  select_first(
    store,
    Query::from(tables::DAILY_WORKOUTS)
      .filter(Filter::eq("id", workout_id))
      .filter(Filter::eq("user_id", user_id)),
  )
  .await?
  .ok_or_else(|| FitError::NotFound("Workout".into()))
}

/// Deletes the workout; its exercises and sets go with it
pub async fn delete_workout(store: &dyn Store, session: &Session, workout_id: &str) -> FitResult<()> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let profile = require_profile(store, session).await?;
  require_owned_workout(store, &profile.id, workout_id).await?;

  store
    .delete(
      tables::DAILY_WORKOUTS,
      &[Filter::eq("id", workout_id), Filter::eq("user_id", profile.id.as_str())],
    )
    .await?;
  info!("Deleted workout {}", workout_id);
  Ok(())
}

pub async fn delete_exercise(store: &dyn Store, session: &Session, exercise_id: &str) -> FitResult<()> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let profile = require_profile(store, session).await?;
  let exercise: WorkoutExercise = select_first(
    store,
    Query::from(tables::WORKOUT_EXERCISES).filter(Filter::eq("id", exercise_id)),
  )
  .await?
  .ok_or_else(|| FitError::NotFound("Exercise".into()))?;
  require_owned_workout(store, &profile.id, &exercise.daily_workout_id).await?;

  store
    .delete(tables::WORKOUT_EXERCISES, &[Filter::eq("id", exercise_id)])
    .await?;
  info!("Deleted exercise {} from workout {}", exercise_id, exercise.daily_workout_id);
  Ok(())
}

async fn patch_workout(
  store: &dyn Store,
  session: &Session,
  workout_id: &str,
  patch: serde_json::Value,
) -> FitResult<()> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let profile = require_profile(store, session).await?;
  require_owned_workout(store, &profile.id, workout_id).await?;

  store
    .update(
      tables::DAILY_WORKOUTS,
      to_row(&patch)?,
      &[Filter::eq("id", workout_id), Filter::eq("user_id", profile.id.as_str())],
    )
    .await
}

pub async fn toggle_favorite(
  store: &dyn Store,
  session: &Session,
  workout_id: &str,
  is_favorite: bool,
) -> FitResult<()> {
  patch_workout(store, session, workout_id, json!({ "is_favorite": is_favorite })).await
}

pub async fn set_workout_completed(
  store: &dyn Store,
  session: &Session,
  workout_id: &str,
  completed: bool,
) -> FitResult<()> {
  patch_workout(store, session, workout_id, json!({ "completed": completed })).await?;
  info!("Workout {} completed={}", workout_id, completed);
  Ok(())
}

/// Log weight, reps or completion against one of the caller's sets
pub async fn update_set(
  store: &dyn Store,
  session: &Session,
  set_id: &str,
  update: SetUpdate,
) -> FitResult<()> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let profile = require_profile(store, session).await?;
  if let Some(weight) = update.weight {
    if !weight.is_finite() || weight < 0.0 {
      return Err(FitError::InvalidInput(format!("Invalid weight: {}", weight)));
    }
  }
  if update.is_empty() {
    return Ok(());
  }

  let filters = [Filter::eq("id", set_id), Filter::eq("user_id", profile.id.as_str())];
  let existing: Option<ExerciseSet> = select_first(
    store,
    Query::from(tables::EXERCISE_SETS)
      .filter(filters[0].clone())
      .filter(filters[1].clone()),
  )
  .await?;
  if existing.is_none() {
    return Err(FitError::NotFound("Set".into()));
  }

  store
    .update(tables::EXERCISE_SETS, to_row(&update)?, &filters)
    .await
}
