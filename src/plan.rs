//! Plan string codec
//!
//! A plan is stored as one line per weekday slot:
//!
//! ```text
//! Pushups 20/10/2/123/n
//! Squats 25/12/3/210/c
//! ```
//!
//! i.e. `<name> <minutes>/<reps>/<intensityCode>/<kcal>/<statusCode>`. Existing
//! documents use this exact layout, so the field order and separators are
//! fixed for version 1 of the codec.

use chrono::Weekday;

use crate::error::{EngineError, EngineResult};
use crate::models::{AdaptedExercise, ExerciseStatus, Intensity};

const FIELD_COUNT: usize = 5;

/// ---------------------------------------------------------------------------
/// Codec Interface
/// ---------------------------------------------------------------------------

pub trait PlanCodec {
  /// Layout revision. Stored plans carry no version tag, so this is attached
  /// to codec log lines to tell layouts apart once a second one exists.
  const VERSION: u32;

  fn encode_entry(&self, exercise: &AdaptedExercise) -> String;

  /// Parse a single non-blank line. `line` is the 1-based position among
  /// non-blank lines, used for error reporting.
  fn decode_entry(&self, line: usize, raw: &str) -> EngineResult<AdaptedExercise>;

  fn encode(&self, exercises: &[AdaptedExercise]) -> String {
    exercises
      .iter()
      .map(|e| self.encode_entry(e))
      .collect::<Vec<_>>()
      .join("\n")
      .trim_end()
      .to_string()
  }

  /// One result per non-blank line, in order. Slot indices line up with the
  /// returned vector, which is what positional diffing relies on.
  fn decode_slots(&self, plan: &str) -> Vec<EngineResult<AdaptedExercise>> {
    plan
      .lines()
      .filter(|l| !l.trim().is_empty())
      .enumerate()
      .map(|(i, raw)| self.decode_entry(i + 1, raw))
      .collect()
  }

  /// Best-effort decode: malformed lines are logged and skipped
  fn decode(&self, plan: &str) -> Vec<AdaptedExercise> {
    self
      .decode_slots(plan)
      .into_iter()
      .filter_map(|entry| match entry {
        Ok(exercise) => Some(exercise),
        Err(e) => {
          tracing::warn!(codec_version = Self::VERSION, error = %e, "Skipping malformed plan entry");
          None
        }
      })
      .collect()
  }
}

/// The slash-delimited layout every stored plan uses today
#[derive(Debug, Clone, Copy, Default)]
pub struct SlashCodecV1;

impl PlanCodec for SlashCodecV1 {
  const VERSION: u32 = 1;

  fn encode_entry(&self, e: &AdaptedExercise) -> String {
    format!(
      "{} {}/{}/{}/{}/{}",
      e.name,
      e.minutes,
      e.reps,
      e.intensity.code(),
      e.estimated_kcal,
      e.status.code()
    )
  }

  fn decode_entry(&self, line: usize, raw: &str) -> EngineResult<AdaptedExercise> {
    let malformed = |reason: String| EngineError::MalformedEntry { line, reason };

    let (name, value) = raw
      .trim()
      .split_once(' ')
      .ok_or_else(|| malformed(format!("expected '<name> <values>', got '{}'", raw.trim())))?;

    let fields: Vec<&str> = value.trim().split('/').collect();
    if fields.len() < FIELD_COUNT {
      return Err(malformed(format!(
        "expected {} slash-separated fields, got {}",
        FIELD_COUNT,
        fields.len()
      )));
    }

    let number = |idx: usize, what: &str| -> EngineResult<u32> {
      fields[idx]
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed(format!("{} '{}' is not a number", what, fields[idx])))
    };

    let minutes = number(0, "minutes")?;
    let reps = number(1, "reps")?;
    let intensity_code = number(2, "intensity")?;
    let estimated_kcal = number(3, "kcal")?;

    let intensity = u8::try_from(intensity_code)
      .ok()
      .and_then(Intensity::from_code)
      .ok_or_else(|| malformed(format!("unknown intensity code {}", intensity_code)))?;
    let status = ExerciseStatus::from_code(fields[4])
      .ok_or_else(|| malformed(format!("unknown status code '{}'", fields[4])))?;

    Ok(AdaptedExercise {
      name: name.to_string(),
      minutes,
      reps,
      intensity,
      estimated_kcal,
      status,
    })
  }
}

/// Version of the layout written by [`encode`]
pub const CODEC_VERSION: u32 = SlashCodecV1::VERSION;

pub fn encode(exercises: &[AdaptedExercise]) -> String {
  SlashCodecV1.encode(exercises)
}

pub fn decode(plan: &str) -> Vec<AdaptedExercise> {
  SlashCodecV1.decode(plan)
}

pub fn decode_slots(plan: &str) -> Vec<EngineResult<AdaptedExercise>> {
  SlashCodecV1.decode_slots(plan)
}

/// ---------------------------------------------------------------------------
/// Slot Helpers
/// ---------------------------------------------------------------------------

/// Flip the entry at `slot` (0-based among non-blank lines) to completed.
///
/// Only the status field is touched, and only when the entry has exactly the
/// five expected fields; every other line is passed through unchanged.
pub fn mark_completed(plan: &str, slot: usize) -> EngineResult<String> {
  let mut lines: Vec<String> = plan
    .lines()
    .filter(|l| !l.trim().is_empty())
    .map(str::to_string)
    .collect();

  let line = lines.get_mut(slot).ok_or_else(|| {
    EngineError::InvalidRequest(format!("plan has no exercise in slot {}", slot))
  })?;

  let (name, value) = line
    .trim()
    .split_once(' ')
    .map(|(n, v)| (n.to_string(), v.trim().to_string()))
    .ok_or_else(|| EngineError::MalformedEntry {
      line: slot + 1,
      reason: "entry has no values".into(),
    })?;

  let mut fields: Vec<&str> = value.split('/').collect();
  if fields.len() == FIELD_COUNT {
    fields[4] = "c";
    *line = format!("{} {}", name, fields.join("/"));
  }

  Ok(lines.join("\n"))
}

/// Day of week a slot is scheduled on; the week starts on Monday
pub fn weekday_for_slot(slot: usize) -> Weekday {
  let mut day = Weekday::Mon;
  for _ in 0..(slot % 7) {
    day = day.succ();
  }
  day
}
