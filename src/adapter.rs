//! Exercise Parameter Adapter
//!
//! Turns a catalog template into a personalized plan entry for one user:
//! - age, sex and BMI scale intensity and reps
//! - weight/height outliers nudge minutes and intensity
//! - the resulting intensity is discretized and drives the kcal estimate
//!
//! Adjustments compose by multiplication in a fixed order. Changing the
//! order changes results for stored plans, so keep it.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AdaptedExercise, BiologicalSex, ExerciseStatus, ExerciseTemplate, Intensity, UserProfile,
};

// ---------------------------------------------------------------------------
/// Personalization
// ---------------------------------------------------------------------------

/// Adapt a single template to a profile
pub fn adapt(template: &ExerciseTemplate, profile: &UserProfile) -> AdaptedExercise {
    let mut minutes = template.base_minutes;
    let mut reps = template.base_reps;
    let mut intensity = template.base_intensity;

    // Age
    if profile.age < 25 {
        intensity *= 1.2;
        reps += 1.0;
    } else if profile.age > 50 {
        intensity *= 0.6;
        reps -= 1.0;
    }

    // Sex
    if profile.sex == BiologicalSex::Female {
        intensity *= 0.94;
    }

    // BMI
    let bmi = profile.bmi();
    if bmi < 18.5 {
        intensity *= 0.92;
        reps += 1.0;
    } else if bmi >= 30.0 {
        intensity *= 1.1;
        reps -= 2.0;
    } else if bmi >= 25.0 {
        intensity *= 1.2;
        reps -= 1.0;
    }

    // Outliers
    if profile.weight > 100.0 {
        minutes += 1.0;
        intensity *= 0.95;
    } else if profile.weight < 50.0 {
        intensity *= 1.05;
    }
    if profile.height > 190.0 {
        minutes += 1.0;
    } else if profile.height < 155.0 {
        minutes -= 1.0;
    }

    let reps = reps.round().max(1.0) as u32;
    let minutes = minutes.round().max(1.0) as u32;
    let intensity = Intensity::from_factor(intensity);

    AdaptedExercise {
        name: template.name.clone(),
        minutes,
        reps,
        intensity,
        estimated_kcal: estimate_kcal(intensity, profile.weight, minutes),
        status: ExerciseStatus::Pending,
    }
}

/// kcal burnt over `minutes` at the intensity's MET value
pub fn estimate_kcal(intensity: Intensity, weight: f64, minutes: u32) -> u32 {
    let kcal_per_minute = intensity.met() * 3.5 * weight / 200.0;
    (kcal_per_minute * minutes as f64).round().max(0.0) as u32
}

/// Parse and adapt every `(name, base_params)` catalog entry.
///
/// Each entry gets its own result so one bad template does not hide the
/// others; callers decide whether a partial batch is usable.
pub fn adapt_all<'a, I>(templates: I, profile: &UserProfile) -> Vec<EngineResult<AdaptedExercise>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    templates
        .into_iter()
        .map(|(name, base_params)| {
            ExerciseTemplate::parse(name, base_params).map(|t| adapt(&t, profile))
        })
        .collect()
}

// ---------------------------------------------------------------------------
/// Goals & Daily Kcal Target
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    GainMuscle,
    LoseFat,
    Endurance,
    Health,
    Rehab,
}

impl Goal {
    /// Catalog key the goal's templates are stored under
    pub fn catalog_key(&self) -> &'static str {
        match self {
            Goal::GainMuscle => "gain_muscle",
            Goal::LoseFat => "lose_fat",
            Goal::Endurance => "endurance",
            Goal::Health => "health",
            Goal::Rehab => "rehab",
        }
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.catalog_key())
    }
}

impl std::str::FromStr for Goal {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gain_muscle" => Ok(Self::GainMuscle),
            "lose_fat" => Ok(Self::LoseFat),
            "endurance" | "improve_endurance" => Ok(Self::Endurance),
            "health" | "stay_healthy" => Ok(Self::Health),
            "rehab" | "rehabilitation" => Ok(Self::Rehab),
            _ => Err(format!("Unknown goal: {}", s)),
        }
    }
}

/// Mifflin-St Jeor basal metabolic rate
pub fn basal_metabolic_rate(profile: &UserProfile) -> f64 {
    let base = 10.0 * profile.weight + 6.25 * profile.height - 5.0 * profile.age as f64;
    match profile.sex {
        BiologicalSex::Male => base + 5.0,
        BiologicalSex::Female => base - 161.0,
    }
}

/// Daily kcal target for a goal; an unknown goal falls back to plain BMR
pub fn kcal_target(profile: &UserProfile, goal: Option<Goal>) -> i64 {
    let bmr = basal_metabolic_rate(profile);
    let target = match goal {
        Some(Goal::GainMuscle) => bmr * 1.2 + 300.0,
        Some(Goal::LoseFat) => bmr * 1.2 - 300.0,
        Some(Goal::Endurance) => bmr * 1.4,
        Some(Goal::Health) => bmr * 1.2,
        Some(Goal::Rehab) => bmr * 1.1,
        None => bmr,
    };
    target.round() as i64
}

/// Resolve the catalog key for a raw target string, keeping unknown keys as-is
pub fn catalog_key_for(target: &str) -> EngineResult<String> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidProfile("target is empty".into()));
    }
    Ok(trimmed
        .parse::<Goal>()
        .map(|g| g.catalog_key().to_string())
        .unwrap_or_else(|_| trimmed.to_string()))
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
