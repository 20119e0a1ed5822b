use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
  Low,
  Medium,
  High,
}

impl Intensity {
  /// Discretize a continuous intensity factor
  pub fn from_factor(factor: f64) -> Self {
    match factor {
      f if f < 0.9 => Intensity::Low,
      f if f < 1.1 => Intensity::Medium,
      _ => Intensity::High,
    }
  }

  pub fn code(&self) -> u8 {
    match self {
      Intensity::Low => 1,
      Intensity::Medium => 2,
      Intensity::High => 3,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      1 => Some(Intensity::Low),
      2 => Some(Intensity::Medium),
      3 => Some(Intensity::High),
      _ => None,
    }
  }

  /// Metabolic equivalent used for the kcal estimate
  pub fn met(&self) -> f64 {
    match self {
      Intensity::Low => 3.0,
      Intensity::Medium => 5.0,
      Intensity::High => 8.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseStatus {
  #[default]
  Pending,
  Completed,
}

impl ExerciseStatus {
  pub fn code(&self) -> char {
    match self {
      ExerciseStatus::Pending => 'n',
      ExerciseStatus::Completed => 'c',
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    match code.trim() {
      "n" | "N" => Some(ExerciseStatus::Pending),
      "c" | "C" => Some(ExerciseStatus::Completed),
      _ => None,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Exercise Template: catalog entry before personalization
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTemplate {
  pub name: String,
  pub base_minutes: f64,
  pub base_reps: f64,
  pub base_intensity: f64,
}

impl ExerciseTemplate {
  /// Parse a catalog entry of the form `"minutes/reps/intensity"`
  pub fn parse(name: &str, base_params: &str) -> EngineResult<Self> {
    let invalid = |reason: String| EngineError::InvalidTemplate {
      name: name.to_string(),
      reason,
    };

    let parts: Vec<&str> = base_params.trim().split('/').collect();
    if parts.len() != 3 {
      return Err(invalid(format!(
        "expected 3 slash-separated numbers, got '{}'",
        base_params
      )));
    }

    let mut values = [0.0_f64; 3];
    for (slot, raw) in values.iter_mut().zip(&parts) {
      *slot = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| invalid(format!("'{}' is not a non-negative number", raw)))?;
    }

    Ok(Self {
      name: normalize_name(name),
      base_minutes: values[0],
      base_reps: values[1],
      base_intensity: values[2],
    })
  }
}

/// Names travel in a space-delimited encoding, so inner whitespace becomes `_`
fn normalize_name(name: &str) -> String {
  name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// ---------------------------------------------------------------------------
/// Adapted Exercise: personalized plan entry
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptedExercise {
  pub name: String,
  pub minutes: u32,
  pub reps: u32,
  pub intensity: Intensity,
  pub estimated_kcal: u32,
  pub status: ExerciseStatus,
}

impl AdaptedExercise {
  pub fn is_completed(&self) -> bool {
    self.status == ExerciseStatus::Completed
  }
}
