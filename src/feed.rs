//! Change feed
//!
//! Events describe something that happened to a user document (or a request
//! against it). Each one is dispatched to its handler, which reports an
//! `Outcome` and may emit follow-up events. Follow-ups are queued behind the
//! event that produced them and run before the next incoming event.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::db::AppState;
use crate::error::EngineError;
use crate::handlers;
use crate::models::{BalanceStatus, DailyBalance, ProfileForm, ProfileSnapshot};

/// ---------------------------------------------------------------------------
/// Events
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
  UserCreated {
    user_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
  },
  ProfileSubmitted {
    user_id: String,
    form: ProfileForm,
  },
  ProfileUpdated {
    user_id: String,
    #[serde(default)]
    before: ProfileSnapshot,
    #[serde(default)]
    after: ProfileSnapshot,
    /// When the change happened; defaults to the time it is handled
    #[serde(default)]
    at: Option<DateTime<Utc>>,
  },
  ExerciseCompleted {
    user_id: String,
    slot: usize,
  },
  ActivityLogged {
    user_id: String,
    description: String,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
  },
  MealLogged {
    user_id: String,
    kcal: i64,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
  },
  BalanceRequested {
    user_id: String,
    #[serde(default)]
    as_of: Option<DateTime<Utc>>,
  },
  PruneRequested {
    /// Buckets dated before this day are removed; defaults to today
    #[serde(default)]
    before: Option<NaiveDate>,
  },
}

impl ChangeEvent {
  pub fn kind(&self) -> &'static str {
    match self {
      ChangeEvent::UserCreated { .. } => "user_created",
      ChangeEvent::ProfileSubmitted { .. } => "profile_submitted",
      ChangeEvent::ProfileUpdated { .. } => "profile_updated",
      ChangeEvent::ExerciseCompleted { .. } => "exercise_completed",
      ChangeEvent::ActivityLogged { .. } => "activity_logged",
      ChangeEvent::MealLogged { .. } => "meal_logged",
      ChangeEvent::BalanceRequested { .. } => "balance_requested",
      ChangeEvent::PruneRequested { .. } => "prune_requested",
    }
  }

  pub fn user_id(&self) -> Option<&str> {
    match self {
      ChangeEvent::UserCreated { user_id, .. }
      | ChangeEvent::ProfileSubmitted { user_id, .. }
      | ChangeEvent::ProfileUpdated { user_id, .. }
      | ChangeEvent::ExerciseCompleted { user_id, .. }
      | ChangeEvent::ActivityLogged { user_id, .. }
      | ChangeEvent::MealLogged { user_id, .. }
      | ChangeEvent::BalanceRequested { user_id, .. } => Some(user_id),
      ChangeEvent::PruneRequested { .. } => None,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Outcomes
/// ---------------------------------------------------------------------------

/// What happened to the stored plan while handling a profile update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanStatus {
  /// No plan input changed, or no target is set
  Unchanged,
  Regenerated { plan: String, kcal_target: i64 },
  /// Adaptation failed; the stored plan was left as it was
  Rejected { reason: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  UserCreated {
    user_id: String,
    created: bool,
  },
  ProfileSaved {
    user_id: String,
  },
  ProfileProcessed {
    user_id: String,
    plan: PlanStatus,
    burnt_kcal: i64,
  },
  ExerciseCompleted {
    user_id: String,
    slot: usize,
    /// False when the slot was already completed or the plan changed underneath
    changed: bool,
  },
  ActivityRecorded {
    user_id: String,
    kcal: i64,
  },
  IntakeRecorded {
    user_id: String,
    kcal: i64,
  },
  Balance {
    user_id: String,
    #[serde(flatten)]
    balance: DailyBalance,
    net_kcal: i64,
    balance_status: BalanceStatus,
  },
  /// No kcal target configured, nothing to display
  Suppressed {
    user_id: String,
  },
  Pruned {
    before: NaiveDate,
    deleted: u64,
  },
  Failed {
    event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    error: EngineError,
  },
}

/// A handler's report plus any events it wants dispatched next
#[derive(Debug)]
pub struct Handled {
  pub outcome: Outcome,
  pub follow_up: Vec<ChangeEvent>,
}

impl Handled {
  pub fn done(outcome: Outcome) -> Self {
    Self { outcome, follow_up: Vec::new() }
  }

  pub fn then(mut self, event: ChangeEvent) -> Self {
    self.follow_up.push(event);
    self
  }
}

/// ---------------------------------------------------------------------------
/// Feed
/// ---------------------------------------------------------------------------

pub struct ChangeFeed {
  events: mpsc::Receiver<ChangeEvent>,
}

impl ChangeFeed {
  /// Create a feed and the sender used to publish events into it
  pub fn channel(capacity: usize) -> (mpsc::Sender<ChangeEvent>, Self) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, Self { events: rx })
  }

  /// Dispatch events until every sender is dropped. Outcomes are sent in the
  /// order they are produced.
  pub async fn run(mut self, state: AppState, outcomes: mpsc::Sender<Outcome>) -> usize {
    let mut handled = 0;

    while let Some(event) = self.events.recv().await {
      let mut queue = VecDeque::from([event]);

      while let Some(event) = queue.pop_front() {
        let (outcome, follow_up) = process(&state, event).await;
        handled += 1;
        queue.extend(follow_up);

        if outcomes.send(outcome).await.is_err() {
          tracing::warn!("Outcome receiver dropped, stopping feed");
          return handled;
        }
      }
    }

    tracing::info!(handled, "Change feed drained");
    handled
  }
}

/// Dispatch one event, folding handler errors into a `Failed` outcome
pub async fn process(state: &AppState, event: ChangeEvent) -> (Outcome, Vec<ChangeEvent>) {
  let kind = event.kind();
  let user_id = event.user_id().map(str::to_string);
  let span = tracing::info_span!("event", kind, user_id = user_id.as_deref().unwrap_or("-"));

  match handlers::dispatch(state, event).instrument(span).await {
    Ok(Handled { outcome, follow_up }) => (outcome, follow_up),
    Err(error) => {
      tracing::error!(kind, user_id = user_id.as_deref().unwrap_or("-"), error = %error, "Event failed");
      (
        Outcome::Failed {
          event: kind.to_string(),
          user_id,
          error,
        },
        Vec::new(),
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{datetime_at, test_state};
  use serde_json::json;

  #[test]
  fn test_event_json_shape() {
    let event: ChangeEvent = serde_json::from_value(json!({
      "event": "exercise_completed",
      "user_id": "u1",
      "slot": 2
    }))
    .unwrap();
    assert_eq!(event, ChangeEvent::ExerciseCompleted { user_id: "u1".into(), slot: 2 });
    assert_eq!(event.kind(), "exercise_completed");

    let event: ChangeEvent = serde_json::from_value(json!({
      "event": "profile_updated",
      "user_id": "u1",
      "after": { "target": "health" }
    }))
    .unwrap();
    match event {
      ChangeEvent::ProfileUpdated { before, after, at, .. } => {
        assert!(before.0.is_empty());
        assert_eq!(after.target(), Some("health"));
        assert!(at.is_none());
      }
      other => panic!("unexpected event {:?}", other),
    }

    let event: ChangeEvent = serde_json::from_value(json!({ "event": "prune_requested" })).unwrap();
    assert_eq!(event.user_id(), None);
  }

  #[test]
  fn test_unknown_event_is_rejected() {
    let parsed = serde_json::from_value::<ChangeEvent>(json!({ "event": "teleport", "user_id": "u1" }));
    assert!(parsed.is_err());
  }

  #[test]
  fn test_outcome_serialization() {
    let value = serde_json::to_value(Outcome::Balance {
      user_id: "u1".into(),
      balance: DailyBalance { consumed_kcal: 2500, burnt_kcal: 300, kcal_target: 2000 },
      net_kcal: 2200,
      balance_status: BalanceStatus::Surplus { kcal: 200 },
    })
    .unwrap();

    assert_eq!(value["outcome"], "balance");
    assert_eq!(value["consumed_kcal"], 2500);
    assert_eq!(value["balance_status"]["status"], "surplus");

    let value = serde_json::to_value(Outcome::Failed {
      event: "meal_logged".into(),
      user_id: None,
      error: EngineError::InvalidRequest("kcal must be non-negative".into()),
    })
    .unwrap();
    assert_eq!(value["error"], "Invalid request: kcal must be non-negative");
    assert!(value.get("user_id").is_none());
  }

  #[tokio::test]
  async fn test_feed_runs_follow_ups_before_next_event() {
    let state = test_state().await;
    let (tx, feed) = ChangeFeed::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(16);

    tx.send(ChangeEvent::UserCreated { user_id: "u1".into(), email: None, name: None })
      .await
      .unwrap();
    tx.send(ChangeEvent::ProfileSubmitted {
      user_id: "u1".into(),
      form: crate::test_utils::mock_profile_form(),
    })
    .await
    .unwrap();
    tx.send(ChangeEvent::BalanceRequested {
      user_id: "u1".into(),
      as_of: Some(datetime_at(2025, 6, 2, 12, 0, 0)),
    })
    .await
    .unwrap();
    drop(tx);

    let handled = feed.run(state.clone(), out_tx).await;
    assert_eq!(handled, 4);

    let mut kinds = Vec::new();
    while let Some(outcome) = out_rx.recv().await {
      kinds.push(serde_json::to_value(&outcome).unwrap()["outcome"].as_str().unwrap().to_string());
    }
    assert_eq!(
      kinds,
      vec!["user_created", "profile_saved", "profile_processed", "balance"]
    );

    state.store.close().await;
  }

  #[tokio::test]
  async fn test_process_reports_failures() {
    let state = test_state().await;

    let (outcome, follow_up) = process(
      &state,
      ChangeEvent::MealLogged { user_id: "u1".into(), kcal: -5, at: None },
    )
    .await;

    assert!(follow_up.is_empty());
    match outcome {
      Outcome::Failed { event, user_id, error } => {
        assert_eq!(event, "meal_logged");
        assert_eq!(user_id.as_deref(), Some("u1"));
        assert!(matches!(error, EngineError::InvalidRequest(_)));
      }
      other => panic!("expected Failed, got {:?}", other),
    }

    state.store.close().await;
  }
}
