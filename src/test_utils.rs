//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Seed helpers and mock data factories
//! - A store wrapper that fails on demand
//! - Helper assertions

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{FitError, FitResult};
use crate::models::{DailyWorkout, ExerciseSet, NewPartnerLink, PartnerLink, PartnerStatus, UserProfile};
use crate::session::Session;
use crate::store::{insert_one, tables, Filter, Query, Row, SqliteStore, Store};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  // Run migrations
  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

pub async fn setup_test_store() -> SqliteStore {
  SqliteStore::new(setup_test_db().await)
}

pub async fn teardown_test_store(store: SqliteStore) {
  teardown_test_db(store.pool().clone()).await;
}

/// ---------------------------------------------------------------------------
/// Seed Helpers
/// ---------------------------------------------------------------------------

/// Insert a profile; the name is derived from the username
pub async fn seed_test_user(store: &dyn Store, auth_id: &str, username: &str) -> UserProfile {
  insert_one(
    store,
    tables::USERS,
    &json!({
      "auth_id": auth_id,
      "email": format!("{}@example.com", username),
      "name": format!("{} name", username),
      "username": username,
    }),
  )
  .await
  .expect("Failed to seed user")
}

/// Insert a workout with one exercise per `(sets, completed_sets)` pair.
/// Every set weighs 100; the first `completed_sets` of each exercise are done.
/// Returns the workout id.
pub async fn seed_test_workout(
  store: &dyn Store,
  user_id: &str,
  date: &str,
  completed: bool,
  exercises: &[(u32, u32)],
) -> String {
  let workout: DailyWorkout = insert_one(
    store,
    tables::DAILY_WORKOUTS,
    &json!({
      "user_id": user_id,
      "date": date,
      "title": format!("Test ({})", date),
      "workout_type": "strength",
      "difficulty": "medium",
      "duration": 1,
      "completed": completed,
      "is_favorite": false,
      "is_shared": false,
      "shared_with": [],
    }),
  )
  .await
  .expect("Failed to seed workout");

  for (index, (sets, completed_sets)) in exercises.iter().enumerate() {
    let exercise: Row = insert_one(
      store,
      tables::WORKOUT_EXERCISES,
      &json!({
        "daily_workout_id": workout.id,
        "name": format!("Exercise {}", index + 1),
        "target_sets": sets,
        "target_reps": "10",
      }),
    )
    .await
    .expect("Failed to seed exercise");
    let exercise_id = exercise["id"].as_str().expect("exercise id").to_string();

    let rows: Vec<Row> = (1..=*sets)
      .map(|n| {
        json!({
          "exercise_id": exercise_id,
          "user_id": user_id,
          "set_number": n,
          "weight": 100.0,
          "reps": 10,
          "completed": n <= *completed_sets,
        })
        .as_object()
        .cloned()
        .expect("object row")
      })
      .collect();
    if !rows.is_empty() {
      store
        .insert(tables::EXERCISE_SETS, rows)
        .await
        .expect("Failed to seed sets");
    }
  }

  workout.id
}

pub async fn seed_test_link(
  store: &dyn Store,
  user_id: &str,
  partner_id: &str,
  status: PartnerStatus,
) -> PartnerLink {
  insert_one(
    store,
    tables::WORKOUT_PARTNERS,
    &NewPartnerLink {
      user_id: user_id.to_string(),
      partner_id: partner_id.to_string(),
      status,
    },
  )
  .await
  .expect("Failed to seed partner link")
}

pub fn session_for(profile: &UserProfile) -> Session {
  Session::authenticated(profile.auth_id.clone())
}

/// ---------------------------------------------------------------------------
/// Failure Injection
/// ---------------------------------------------------------------------------

/// Delegates to an inner store but rejects inserts into `table` once
/// `succeed` of them have gone through
pub struct FlakyStore<S> {
  inner: S,
  table: &'static str,
  succeed: usize,
  inserts: AtomicUsize,
}

impl<S: Store> FlakyStore<S> {
  pub fn new(inner: S, table: &'static str, succeed: usize) -> Self {
    Self {
      inner,
      table,
      succeed,
      inserts: AtomicUsize::new(0),
    }
  }
}

#[async_trait]
impl<S: Store> Store for FlakyStore<S> {
  async fn select(&self, query: &Query) -> FitResult<Vec<Row>> {
    self.inner.select(query).await
  }

  async fn insert(&self, table: &str, rows: Vec<Row>) -> FitResult<Vec<Row>> {
    if table == self.table && self.inserts.fetch_add(1, Ordering::SeqCst) >= self.succeed {
      return Err(FitError::Persistence(format!("injected failure on {}", table)));
    }
    self.inner.insert(table, rows).await
  }

  async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> FitResult<()> {
    self.inner.update(table, patch, filters).await
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> FitResult<()> {
    self.inner.delete(table, filters).await
  }
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// A workout with no exercises embedded
pub fn mock_daily_workout(date: NaiveDate, completed: bool) -> DailyWorkout {
  DailyWorkout {
    id: format!("w-{}", date),
    user_id: "u1".to_string(),
    date,
    title: format!("Mock ({})", date),
    duration: 1,
    completed,
    ..Default::default()
  }
}

pub fn mock_set(set_number: u32, weight: f64, completed: bool) -> ExerciseSet {
  ExerciseSet {
    id: format!("s{}", set_number),
    exercise_id: "e1".to_string(),
    user_id: "u1".to_string(),
    set_number,
    weight,
    reps: 10,
    completed,
  }
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

pub fn date_days_ago(days: i64) -> NaiveDate {
  today() - Duration::days(days)
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::select_as;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('users', 'daily_workouts', 'workout_exercises', 'exercise_sets', 'workout_partners')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 5, "Expected 5 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_workout_creates_nested_rows() {
    let store = setup_test_store().await;
    let user = seed_test_user(&store, "auth-1", "lifter").await;
    seed_test_workout(&store, &user.id, "2026-10-12", false, &[(3, 2), (0, 0)]).await;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exercise_sets")
      .fetch_one(store.pool())
      .await
      .expect("Failed to count sets");
    assert_eq!(count, 3);

    let done: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exercise_sets WHERE completed = 1")
      .fetch_one(store.pool())
      .await
      .expect("Failed to count sets");
    assert_eq!(done, 2);

    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_flaky_store_fails_after_budget() {
    let store = setup_test_store().await;
    let flaky = FlakyStore::new(store.clone(), tables::USERS, 1);

    seed_test_user(&flaky, "auth-1", "first").await;
    let second = flaky
      .insert(tables::USERS, vec![json!({"auth_id": "auth-2"}).as_object().cloned().unwrap()])
      .await;
    assert!(matches!(second, Err(FitError::Persistence(_))));

    let users: Vec<UserProfile> = select_as(&flaky, &Query::from(tables::USERS)).await.unwrap();
    assert_eq!(users.len(), 1);

    teardown_test_store(store).await;
  }

  #[test]
  fn test_mock_factories_create_valid_data() {
    let workout = mock_daily_workout(date_days_ago(1), true);
    assert!(workout.completed);
    assert_eq!(workout.total_sets(), 0);

    let set = mock_set(2, 135.0, false);
    assert_eq!(set.set_number, 2);
    assert!(!set.completed);
  }

  #[test]
  fn test_date_helpers_produce_correct_dates() {
    let diff = today() - date_days_ago(7);
    assert_eq!(diff.num_days(), 7);
  }
}
