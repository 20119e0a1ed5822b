pub mod exercise;
pub mod ledger;
pub mod profile;

pub use exercise::{AdaptedExercise, ExerciseStatus, ExerciseTemplate, Intensity};
pub use ledger::{BalanceStatus, DailyBalance, DayBucket};
pub use profile::{BiologicalSex, ProfileForm, ProfileSnapshot, UserProfile, UserRecord};
