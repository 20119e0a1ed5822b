use chrono::NaiveDate;

use crate::db::AppState;
use crate::error::EngineResult;
use crate::feed::{Handled, Outcome};
use crate::ledger::{self, DayKey};

/// Drop every day bucket dated before `before`, for all users
pub async fn prune_requested(state: &AppState, before: NaiveDate) -> EngineResult<Handled> {
  let deleted = ledger::prune_before(&state.store, DayKey::from(before)).await?;

  Ok(Handled::done(Outcome::Pruned { before, deleted }))
}
