use chrono::{DateTime, Utc};

use crate::db::AppState;
use crate::error::EngineResult;
use crate::feed::{Handled, Outcome};
use crate::ledger;
use crate::models::BalanceStatus;

/// Today's consumed/burnt totals against the user's target.
/// Without a target there is nothing meaningful to show.
pub async fn balance_requested(
  state: &AppState,
  user_id: &str,
  as_of: DateTime<Utc>,
) -> EngineResult<Handled> {
  let balance = ledger::get_balance(&state.store, user_id, as_of).await?;

  let outcome = match balance.status() {
    BalanceStatus::NoPlan => {
      tracing::debug!(user_id, "No kcal target, suppressing balance");
      Outcome::Suppressed {
        user_id: user_id.to_string(),
      }
    }
    balance_status => Outcome::Balance {
      user_id: user_id.to_string(),
      net_kcal: balance.net_kcal(),
      balance,
      balance_status,
    },
  };

  Ok(Handled::done(outcome))
}
