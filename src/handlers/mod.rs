pub mod activity;
pub mod balance;
pub mod completion;
pub mod maintenance;
pub mod profile;
pub mod register;

use chrono::Utc;

use crate::db::AppState;
use crate::error::EngineResult;
use crate::feed::{ChangeEvent, Handled};

/// Route an event to its handler
pub async fn dispatch(state: &AppState, event: ChangeEvent) -> EngineResult<Handled> {
  match event {
    ChangeEvent::UserCreated { user_id, email, name } => {
      register::user_created(state, &user_id, email.as_deref(), name.as_deref()).await
    }
    ChangeEvent::ProfileSubmitted { user_id, form } => {
      profile::profile_submitted(state, &user_id, &form).await
    }
    ChangeEvent::ProfileUpdated { user_id, before, after, at } => {
      profile::profile_updated(state, &user_id, &before, &after, at.unwrap_or_else(Utc::now)).await
    }
    ChangeEvent::ExerciseCompleted { user_id, slot } => {
      completion::exercise_completed(state, &user_id, slot).await
    }
    ChangeEvent::ActivityLogged { user_id, description, at } => {
      activity::activity_logged(state, &user_id, &description, at.unwrap_or_else(Utc::now)).await
    }
    ChangeEvent::MealLogged { user_id, kcal, at } => {
      activity::meal_logged(state, &user_id, kcal, at.unwrap_or_else(Utc::now)).await
    }
    ChangeEvent::BalanceRequested { user_id, as_of } => {
      balance::balance_requested(state, &user_id, as_of.unwrap_or_else(Utc::now)).await
    }
    ChangeEvent::PruneRequested { before } => {
      maintenance::prune_requested(state, before.unwrap_or_else(|| Utc::now().date_naive())).await
    }
  }
}
