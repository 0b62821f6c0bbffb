use crate::config::raw::{
  CapacityRaw, PolicyConfigRaw, PurgeRaw, RolloverRaw, SimulationConfigRaw, WindowConfigRaw,
};
use crate::error::{BuildError, ConfigError};
use crate::metrics::DEFAULT_WALL_TIME_PENALTY;
use crate::policy::{PolicyConfig, WatermarkSettings, Watermarks, WeightedSettings};
use crate::window::Windowing;

use serde::{Deserialize, Serialize};

/// What happens to the simulation state when a window closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollover {
  /// Empty the cache and the policy's tracking.
  pub clear_cache: bool,
  /// Forget the history of files that are not resident.
  pub clear_ledger: bool,
  /// Clear the group aggregates behind the weighted policies.
  pub reset_weights: bool,
}

/// Periodic removal of stale ledger entries, checked when windows close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSchedule {
  pub every_windows: u64,
  /// Entries idle for more records than this are dropped.
  pub recency_threshold: u64,
}

/// A validated simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
  pub name: String,
  /// Cache capacity in bytes.
  pub capacity: u64,
  pub policy: PolicyConfig,
  pub windowing: Windowing,
  pub rollover: Rollover,
  pub purge: Option<PurgeSchedule>,
  /// Factor applied to miss wall time in the CPU efficiency columns.
  pub wall_time_penalty: f64,
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      name: "simulation".to_string(),
      capacity: 0,
      policy: PolicyConfig::default(),
      windowing: Windowing::default(),
      rollover: Rollover::default(),
      purge: None,
      wall_time_penalty: DEFAULT_WALL_TIME_PENALTY,
    }
  }
}

impl SimulationConfig {
  pub fn validate(&self) -> Result<(), BuildError> {
    if self.capacity == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    self.policy.validate()?;
    self.windowing.validate()?;
    if let Some(purge) = &self.purge {
      if purge.every_windows == 0 {
        return Err(BuildError::ZeroPurgeCadence);
      }
    }
    if !self.wall_time_penalty.is_finite() || self.wall_time_penalty <= 0.0 {
      return Err(BuildError::InvalidPenalty(self.wall_time_penalty));
    }
    Ok(())
  }
}

// --- Conversion and Validation Logic ---

/// Processes the raw, deserialized configuration into a validated one.
pub fn process_raw_config(raw_config: SimulationConfigRaw) -> Result<SimulationConfig, ConfigError> {
  if raw_config.name.trim().is_empty() {
    return Err(ConfigError::InvalidValue {
      field: "name".to_string(),
      message: "Simulation name cannot be empty.".to_string(),
    });
  }

  let capacity = match raw_config.capacity {
    CapacityRaw::Bytes(bytes) => bytes,
    CapacityRaw::Text(text) => parse_capacity(&text).ok_or_else(|| ConfigError::InvalidValue {
      field: "capacity".to_string(),
      message: format!(
        "Cannot parse '{}'. Expected a byte count or a number with a unit such as 'MB', 'GiB' or 'TB'.",
        text
      ),
    })?,
  };

  let policy = match raw_config.policy {
    PolicyConfigRaw::FixedRecency => PolicyConfig::FixedRecency,
    PolicyConfigRaw::GroupWeightedCost(raw) => PolicyConfig::GroupWeightedCost(WeightedSettings {
      exponent: raw.exponent,
    }),
    PolicyConfigRaw::WatermarkedGroupWeightedCost(raw) => {
      PolicyConfig::WatermarkedGroupWeightedCost(WatermarkSettings {
        exponent: raw.exponent,
        watermarks: Watermarks::new(raw.high_watermark, raw.low_watermark),
        percentile: raw.percentile,
        threshold_window: raw.threshold_window,
      })
    }
  };

  let windowing = match raw_config.window {
    WindowConfigRaw::Day => Windowing::Day,
    WindowConfigRaw::Requests { count } => Windowing::Requests(count),
    WindowConfigRaw::Manual => Windowing::Manual,
  };

  let RolloverRaw {
    clear_cache,
    clear_ledger,
    reset_weights,
  } = raw_config.rollover;

  let purge = raw_config.purge.map(
    |PurgeRaw {
       every_windows,
       recency_threshold,
     }| PurgeSchedule {
      every_windows,
      recency_threshold,
    },
  );

  let config = SimulationConfig {
    name: raw_config.name,
    capacity,
    policy,
    windowing,
    rollover: Rollover {
      clear_cache,
      clear_ledger,
      reset_weights,
    },
    purge,
    wall_time_penalty: raw_config.wall_time_penalty,
  };
  config.validate()?;
  Ok(config)
}

/// Parses "100TB", "512 MiB", "1.5GB" or a plain byte count. Decimal units
/// are treated as binary ones, matching how trace sizes are reported.
pub(crate) fn parse_capacity(text: &str) -> Option<u64> {
  let text = text.trim();
  let split = text
    .find(|c: char| !(c.is_ascii_digit() || c == '.'))
    .unwrap_or(text.len());
  let (number, unit) = text.split_at(split);
  let number: f64 = number.parse().ok()?;

  let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
    "" | "b" => 1,
    "k" | "kb" | "kib" => 1 << 10,
    "m" | "mb" | "mib" => 1 << 20,
    "g" | "gb" | "gib" => 1 << 30,
    "t" | "tb" | "tib" => 1 << 40,
    "p" | "pb" | "pib" => 1 << 50,
    _ => return None,
  };

  let bytes = number * multiplier as f64;
  if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
    return None;
  }
  Some(bytes.round() as u64)
}
