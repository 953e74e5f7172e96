//! Weekly statistics over fetched workouts
//!
//! Pure reductions over a window of `DailyWorkout` rows with their exercises
//! and sets embedded. Nothing here touches the store; malformed fields were
//! already coerced to zero/false when the rows were decoded.

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::DailyWorkout;

// ---------------------------------------------------------------------------
/// Week Window
// ---------------------------------------------------------------------------

/// Calendar days `[start, end]`, where `start` is the most recent
/// `first_weekday` on or before `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn containing(today: NaiveDate, first_weekday: Weekday) -> Self {
        let offset = (today.weekday().num_days_from_monday() + 7
            - first_weekday.num_days_from_monday())
            % 7;
        Self {
            start: today - Duration::days(offset as i64),
            end: today,
        }
    }

    /// Window for the current local week up to today
    pub fn current(first_weekday: Weekday) -> Self {
        Self::containing(Local::now().date_naive(), first_weekday)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

// ---------------------------------------------------------------------------
/// Reductions
// ---------------------------------------------------------------------------

/// Sum of weight over completed sets
pub fn total_weight_lifted(workouts: &[DailyWorkout]) -> f64 {
    workouts
        .iter()
        .flat_map(|w| w.exercises.iter())
        .flat_map(|e| e.sets.iter())
        .filter(|s| s.completed)
        .map(|s| if s.weight.is_finite() { s.weight.max(0.0) } else { 0.0 })
        .sum()
}

/// Percentage of workouts marked completed, 0 for no workouts
pub fn completion_rate(workouts: &[DailyWorkout]) -> u32 {
    let completed = workouts.iter().filter(|w| w.completed).count();
    percentage(completed, workouts.len())
}

/// Completed-set percentage per workout, in input order
pub fn weekly_progress(workouts: &[DailyWorkout]) -> Vec<u32> {
    workouts
        .iter()
        .map(|w| percentage(w.completed_sets(), w.total_sets()))
        .collect()
}

/// Consecutive completed workouts counting back from the most recent one.
///
/// Only record order matters; a gap in calendar days does not end a streak.
pub fn streak(workouts: &[DailyWorkout]) -> u32 {
    let mut ordered: Vec<&DailyWorkout> = workouts.iter().collect();
    // Stable, so same-day workouts keep their input order
    ordered.sort_by(|a, b| b.date.cmp(&a.date));

    ordered.iter().take_while(|w| w.completed).count() as u32
}

fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

// ---------------------------------------------------------------------------
/// Weekly Stats: what the dashboard and partner view display
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    pub weekly_workouts: u32,
    pub completed_workouts: u32,
    pub total_weight: f64,
    pub completion_rate: u32,
    pub weekly_progress: Vec<u32>,
    pub streak: u32,
}

impl WeeklyStats {
    pub fn compute(workouts: &[DailyWorkout]) -> Self {
        Self {
            weekly_workouts: workouts.len() as u32,
            completed_workouts: workouts.iter().filter(|w| w.completed).count() as u32,
            total_weight: total_weight_lifted(workouts),
            completion_rate: completion_rate(workouts),
            weekly_progress: weekly_progress(workouts),
            streak: streak(workouts),
        }
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
