use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};

/// Stored user record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
  pub user_id: String,
  pub email: Option<String>,
  pub name: Option<String>,
  pub age: Option<i64>,
  pub height: Option<f64>,
  pub weight: Option<f64>,
  pub sex: Option<bool>,
  pub target: Option<String>,
  pub kcal_target: Option<i64>,
  pub exercise_plan_string: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// Fields submitted from the plan form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileForm {
  pub age: i64,
  pub height: f64,
  pub weight: f64,
  /// true = male, false = female
  pub sex: bool,
  pub target: String,
}

/// ---------------------------------------------------------------------------
/// Profile Snapshot: the user document as seen by a change event
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSnapshot(pub Map<String, Value>);

impl ProfileSnapshot {
  pub fn get(&self, field: &str) -> Option<&Value> {
    self.0.get(field).filter(|v| !v.is_null())
  }

  pub fn plan_string(&self) -> Option<&str> {
    self.get("exercise_plan_string").and_then(Value::as_str)
  }

  pub fn target(&self) -> Option<&str> {
    self
      .get("target")
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|t| !t.is_empty())
  }

  /// True when any field that feeds plan generation differs between snapshots
  pub fn plan_inputs_changed(&self, other: &ProfileSnapshot) -> bool {
    ["weight", "height", "age", "sex", "target"]
      .iter()
      .any(|field| self.get(field) != other.get(field))
  }

  pub fn from_record(record: &UserRecord) -> Self {
    let mut map = Map::new();
    map.insert("email".into(), record.email.clone().into());
    map.insert("name".into(), record.name.clone().into());
    map.insert("age".into(), record.age.into());
    map.insert("height".into(), record.height.into());
    map.insert("weight".into(), record.weight.into());
    map.insert("sex".into(), record.sex.into());
    map.insert("target".into(), record.target.clone().into());
    map.insert("kcal_target".into(), record.kcal_target.into());
    map.insert(
      "exercise_plan_string".into(),
      record.exercise_plan_string.clone().into(),
    );
    Self(map)
  }
}

/// ---------------------------------------------------------------------------
/// User Profile: validated demographics
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiologicalSex {
  Male,
  Female,
}

impl From<bool> for BiologicalSex {
  fn from(is_male: bool) -> Self {
    if is_male {
      Self::Male
    } else {
      Self::Female
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
  /// kg
  pub weight: f64,
  /// cm
  pub height: f64,
  pub age: u32,
  pub sex: BiologicalSex,
}

impl UserProfile {
  pub fn new(weight: f64, height: f64, age: u32, sex: BiologicalSex) -> EngineResult<Self> {
    if !(weight.is_finite() && weight > 0.0) {
      return Err(EngineError::InvalidProfile(format!("weight must be positive, got {}", weight)));
    }
    if !(height.is_finite() && height > 0.0) {
      return Err(EngineError::InvalidProfile(format!("height must be positive, got {}", height)));
    }
    if age == 0 {
      return Err(EngineError::InvalidProfile("age must be positive".into()));
    }
    Ok(Self { weight, height, age, sex })
  }

  /// Body mass index (height converted to metres)
  pub fn bmi(&self) -> f64 {
    let height_m = self.height / 100.0;
    self.weight / (height_m * height_m)
  }

  /// Validate the demographic fields of a snapshot. Missing fields are a
  /// precondition failure, never defaulted.
  pub fn from_snapshot(snapshot: &ProfileSnapshot) -> EngineResult<Self> {
    let weight = numeric_field(snapshot, "weight")?;
    let height = numeric_field(snapshot, "height")?;
    let age = numeric_field(snapshot, "age")?;
    if age.fract() != 0.0 || age < 1.0 || age > u32::MAX as f64 {
      return Err(EngineError::InvalidProfile(format!(
        "age must be a positive integer, got {}",
        age
      )));
    }
    let sex = sex_field(snapshot)?;

    Self::new(weight, height, age as u32, sex)
  }
}

fn numeric_field(snapshot: &ProfileSnapshot, field: &str) -> EngineResult<f64> {
  match snapshot.get(field) {
    None => Err(EngineError::InvalidProfile(format!("{} is missing", field))),
    Some(Value::Number(n)) => n
      .as_f64()
      .ok_or_else(|| EngineError::InvalidProfile(format!("{} is not a finite number", field))),
    Some(Value::String(s)) => s
      .trim()
      .parse::<f64>()
      .ok()
      .filter(|v| v.is_finite())
      .ok_or_else(|| EngineError::InvalidProfile(format!("{} is not numeric: '{}'", field, s))),
    Some(other) => Err(EngineError::InvalidProfile(format!(
      "{} is not numeric: {}",
      field, other
    ))),
  }
}

fn sex_field(snapshot: &ProfileSnapshot) -> EngineResult<BiologicalSex> {
  match snapshot.get("sex") {
    None => Err(EngineError::InvalidProfile("sex is missing".into())),
    Some(Value::Bool(is_male)) => Ok(BiologicalSex::from(*is_male)),
    Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
      "male" => Ok(BiologicalSex::Male),
      "female" => Ok(BiologicalSex::Female),
      other => Err(EngineError::InvalidProfile(format!("unknown sex '{}'", other))),
    },
    Some(other) => Err(EngineError::InvalidProfile(format!("sex is not a category: {}", other))),
  }
}
