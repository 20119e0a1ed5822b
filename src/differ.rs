//! Completion differ: finds exercises that went from pending to completed
//! between two versions of a plan string and totals their kcal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::models::{AdaptedExercise, ExerciseStatus};
use crate::plan::decode_slots;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
  /// Entry i of the old plan is compared with entry i of the new plan
  #[default]
  Positional,
  /// Entries are paired by exercise name (first occurrence wins)
  ByName,
}

impl std::str::FromStr for DiffMode {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "positional" => Ok(Self::Positional),
      "by_name" => Ok(Self::ByName),
      other => Err(format!("Unknown diff mode: {}", other)),
    }
  }
}

fn newly_completed(before: &AdaptedExercise, after: &AdaptedExercise) -> bool {
  before.status == ExerciseStatus::Pending && after.status == ExerciseStatus::Completed
}

fn readable(entry: &EngineResult<AdaptedExercise>) -> Option<&AdaptedExercise> {
  match entry {
    Ok(exercise) => Some(exercise),
    Err(e) => {
      tracing::warn!(error = %e, "Skipping malformed plan entry in diff");
      None
    }
  }
}

/// Total kcal of exercises newly marked completed, compared slot by slot.
///
/// Returns 0 when either plan is empty, which callers treat as "nothing to
/// record". Slots that are malformed or missing on either side are skipped.
pub fn diff(before: &str, after: &str) -> i64 {
  diff_with_mode(before, after, DiffMode::Positional)
}

pub fn diff_with_mode(before: &str, after: &str, mode: DiffMode) -> i64 {
  if before.trim().is_empty() || after.trim().is_empty() {
    return 0;
  }

  let before_slots = decode_slots(before);
  let after_slots = decode_slots(after);

  match mode {
    DiffMode::Positional => after_slots
      .iter()
      .enumerate()
      .filter_map(|(i, after_entry)| {
        let after_entry = readable(after_entry)?;
        let before_entry = readable(before_slots.get(i)?)?;
        newly_completed(before_entry, after_entry).then_some(after_entry.estimated_kcal as i64)
      })
      .sum(),
    DiffMode::ByName => {
      let mut by_name: HashMap<&str, &AdaptedExercise> = HashMap::new();
      for entry in before_slots.iter().filter_map(readable) {
        by_name.entry(entry.name.as_str()).or_insert(entry);
      }

      let mut seen = std::collections::HashSet::new();
      after_slots
        .iter()
        .filter_map(readable)
        .filter(|entry| seen.insert(entry.name.as_str()))
        .filter_map(|after_entry| {
          let before_entry = by_name.get(after_entry.name.as_str())?;
          newly_completed(before_entry, after_entry).then_some(after_entry.estimated_kcal as i64)
        })
        .sum()
    }
  }
}
