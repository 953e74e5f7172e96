pub mod coerce;
pub mod partner;
pub mod user;
pub mod workout;

pub use partner::{
  InviteResponse, NewPartnerLink, PartnerInvite, PartnerInvites, PartnerLink, PartnerStatus,
  UserSummary,
};
pub use user::{NewProfile, ProfileUpdate, UserProfile};
pub use workout::{
  DailyWorkout, Difficulty, ExerciseSet, NewDailyWorkout, NewExerciseSet, NewWorkoutExercise,
  SetUpdate, WorkoutExercise, WorkoutType,
};
