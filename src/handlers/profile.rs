//! Profile handlers
//!
//! A submitted form is validated and stored, which produces a profile update.
//! An update does two independent things:
//! - regenerate the plan and kcal target when a plan input changed
//! - credit kcal for exercises that flipped from pending to completed

use chrono::{DateTime, Utc};

use crate::adapter::{self, Goal};
use crate::catalog;
use crate::db::AppState;
use crate::differ;
use crate::error::{EngineError, EngineResult};
use crate::feed::{ChangeEvent, Handled, Outcome, PlanStatus};
use crate::ledger;
use crate::models::{BiologicalSex, ProfileForm, ProfileSnapshot, UserProfile};
use crate::plan;
use crate::users;

/// ---------------------------------------------------------------------------
/// Form Submission
/// ---------------------------------------------------------------------------

pub async fn profile_submitted(
  state: &AppState,
  user_id: &str,
  form: &ProfileForm,
) -> EngineResult<Handled> {
  validate_form(form)?;

  let (before, after) = users::save_profile_form(&state.store, user_id, form).await?;
  tracing::info!(user_id, goal = %form.target.trim(), "Saved profile form");

  Ok(
    Handled::done(Outcome::ProfileSaved {
      user_id: user_id.to_string(),
    })
    .then(ChangeEvent::ProfileUpdated {
      user_id: user_id.to_string(),
      before,
      after,
      at: None,
    }),
  )
}

fn validate_form(form: &ProfileForm) -> EngineResult<()> {
  let age = u32::try_from(form.age)
    .map_err(|_| EngineError::InvalidProfile(format!("age must be positive, got {}", form.age)))?;
  UserProfile::new(form.weight, form.height, age, BiologicalSex::from(form.sex))?;
  adapter::catalog_key_for(&form.target)?;
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Profile Update
/// ---------------------------------------------------------------------------

pub async fn profile_updated(
  state: &AppState,
  user_id: &str,
  before: &ProfileSnapshot,
  after: &ProfileSnapshot,
  at: DateTime<Utc>,
) -> EngineResult<Handled> {
  let burnt_kcal = credit_completions(state, user_id, before, after, at).await?;
  let plan = regenerate_plan(state, user_id, before, after).await?;

  Ok(Handled::done(Outcome::ProfileProcessed {
    user_id: user_id.to_string(),
    plan,
    burnt_kcal,
  }))
}

async fn credit_completions(
  state: &AppState,
  user_id: &str,
  before: &ProfileSnapshot,
  after: &ProfileSnapshot,
  at: DateTime<Utc>,
) -> EngineResult<i64> {
  let kcal = differ::diff_with_mode(
    before.plan_string().unwrap_or_default(),
    after.plan_string().unwrap_or_default(),
    state.config.diff_mode,
  );

  if kcal == 0 {
    return Ok(0);
  }

  ledger::record_burn(&state.store, user_id, at, kcal).await?;
  Ok(kcal)
}

/// Rebuild the plan from the catalog. Either every template adapts and the
/// new plan plus kcal target are stored, or nothing is written.
async fn regenerate_plan(
  state: &AppState,
  user_id: &str,
  before: &ProfileSnapshot,
  after: &ProfileSnapshot,
) -> EngineResult<PlanStatus> {
  if !before.plan_inputs_changed(after) {
    return Ok(PlanStatus::Unchanged);
  }
  let Some(target) = after.target() else {
    tracing::debug!(user_id, "No target set, skipping plan generation");
    return Ok(PlanStatus::Unchanged);
  };

  let profile = match UserProfile::from_snapshot(after) {
    Ok(profile) => profile,
    Err(e) => {
      tracing::warn!(user_id, error = %e, "Cannot generate plan");
      return Ok(PlanStatus::Rejected { reason: e.to_string() });
    }
  };

  let key = adapter::catalog_key_for(target)?;
  let templates = catalog::load_templates(&state.store, &key).await?;
  if templates.is_empty() {
    tracing::warn!(user_id, goal = %key, "No plan templates for target");
    return Ok(PlanStatus::Rejected {
      reason: format!("no plan templates for target '{}'", key),
    });
  }

  let adapted = adapter::adapt_all(
    templates.iter().map(|t| (t.name.as_str(), t.base_params.as_str())),
    &profile,
  );

  let mut exercises = Vec::with_capacity(adapted.len());
  let mut failures = Vec::new();
  for entry in adapted {
    match entry {
      Ok(exercise) => exercises.push(exercise),
      Err(e) => {
        tracing::error!(user_id, goal = %key, error = %e, "Template failed to adapt");
        failures.push(e.to_string());
      }
    }
  }

  if !failures.is_empty() {
    return Ok(PlanStatus::Rejected {
      reason: failures.join("; "),
    });
  }

  let plan = plan::encode(&exercises);
  let kcal_target = adapter::kcal_target(&profile, target.parse::<Goal>().ok());
  users::save_plan(&state.store, user_id, &plan, kcal_target).await?;

  tracing::info!(
    user_id,
    goal = %key,
    kcal_target,
    exercises = exercises.len(),
    codec_version = plan::CODEC_VERSION,
    "Generated exercise plan"
  );

  Ok(PlanStatus::Regenerated { plan, kcal_target })
}
