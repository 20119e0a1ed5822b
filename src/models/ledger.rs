use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DayBucket {
  pub user_id: String,
  pub day_key: String,
  pub consumed_kcal: i64,
  pub burnt_kcal: i64,
}

/// Consumed/burnt totals for one day plus the user's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DailyBalance {
  pub consumed_kcal: i64,
  pub burnt_kcal: i64,
  pub kcal_target: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BalanceStatus {
  /// No target configured: the balance must not be displayed
  NoPlan,
  Surplus { kcal: i64 },
  Deficit { kcal: i64 },
}

impl DailyBalance {
  pub fn net_kcal(&self) -> i64 {
    self.consumed_kcal - self.burnt_kcal
  }

  pub fn status(&self) -> BalanceStatus {
    if self.kcal_target == 0 {
      return BalanceStatus::NoPlan;
    }

    let net = self.net_kcal();
    let kcal = (self.kcal_target - net).abs();
    if self.kcal_target < net {
      BalanceStatus::Surplus { kcal }
    } else {
      BalanceStatus::Deficit { kcal }
    }
  }
}
