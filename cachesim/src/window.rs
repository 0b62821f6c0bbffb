use crate::error::BuildError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// How a trace is cut into windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Windowing {
  /// One window per calendar day (UTC) of the record timestamps. Records
  /// without a timestamp stay in the current window.
  Day,
  /// A fixed number of records per window.
  Requests(u64),
  /// Windows end only on an explicit `end_window` call.
  Manual,
}

impl Default for Windowing {
  fn default() -> Self {
    Windowing::Day
  }
}

impl Windowing {
  pub fn validate(&self) -> Result<(), BuildError> {
    match self {
      Windowing::Requests(0) => Err(BuildError::ZeroWindowSize),
      _ => Ok(()),
    }
  }
}

/// Tracks the extent of the window currently being filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTracker {
  current_day: Option<i64>,
  requests: u64,
}

impl WindowTracker {
  /// Whether a record with timestamp `day` belongs to a new window, meaning
  /// the current one must be closed first.
  pub fn crosses(&self, windowing: Windowing, day: Option<i64>) -> bool {
    if self.requests == 0 {
      return false;
    }
    match windowing {
      Windowing::Day => match (self.current_day, day) {
        (Some(current), Some(day)) => day.div_euclid(SECONDS_PER_DAY) != current,
        _ => false,
      },
      Windowing::Requests(size) => self.requests >= size,
      Windowing::Manual => false,
    }
  }

  pub fn observe(&mut self, day: Option<i64>) {
    if self.current_day.is_none() {
      self.current_day = day.map(|secs| secs.div_euclid(SECONDS_PER_DAY));
    }
    self.requests += 1;
  }

  /// Records seen in the current window.
  pub fn requests(&self) -> u64 {
    self.requests
  }

  pub fn is_empty(&self) -> bool {
    self.requests == 0
  }

  /// Date of the current window, or `window-<n>` when no timestamp was seen.
  pub fn label(&self, window: u64) -> String {
    self
      .current_day
      .and_then(|day| DateTime::<Utc>::from_timestamp(day * SECONDS_PER_DAY, 0))
      .map(|date| date.format("%Y-%m-%d").to_string())
      .unwrap_or_else(|| format!("window-{}", window))
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}
