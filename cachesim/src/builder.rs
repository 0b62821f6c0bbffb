use crate::config::{PurgeSchedule, Rollover, SimulationConfig};
use crate::driver::SimulationDriver;
use crate::error::BuildError;
use crate::oracle::DecisionOracle;
use crate::policy::{PolicyConfig, WatermarkSettings, WeightedSettings};
use crate::window::Windowing;

use core::fmt;

/// A builder for [`SimulationDriver`] instances.
///
/// Defaults: the `FixedRecency` policy, day windows, no rollover resets, no
/// purges, and a wall-time penalty of 1.15. The capacity has no default and
/// must be set.
#[derive(Default)]
pub struct SimulationBuilder {
  config: SimulationConfig,
  oracle: Option<Box<dyn DecisionOracle>>,
}

// Manual Debug implementation, the oracle is opaque.
impl fmt::Debug for SimulationBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SimulationBuilder")
      .field("config", &self.config)
      .field("has_oracle", &self.oracle.is_some())
      .finish()
  }
}

impl SimulationBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts from an existing configuration, e.g. one loaded from YAML.
  pub fn from_config(config: SimulationConfig) -> Self {
    Self {
      config,
      oracle: None,
    }
  }

  /// Sets the run name used in logs and shared sinks.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.config.name = name.into();
    self
  }

  /// Sets the cache capacity in bytes.
  pub fn capacity(mut self, bytes: u64) -> Self {
    self.config.capacity = bytes;
    self
  }

  pub fn policy(mut self, policy: PolicyConfig) -> Self {
    self.config.policy = policy;
    self
  }

  /// Evicts least recently used files.
  pub fn fixed_recency(self) -> Self {
    self.policy(PolicyConfig::FixedRecency)
  }

  /// Weights files by group request frequency per byte.
  pub fn group_weighted_cost(self, exponent: f64) -> Self {
    self.policy(PolicyConfig::GroupWeightedCost(WeightedSettings { exponent }))
  }

  /// Weighted policy with an admission threshold and capacity watermarks.
  pub fn watermarked_group_weighted_cost(self, settings: WatermarkSettings) -> Self {
    self.policy(PolicyConfig::WatermarkedGroupWeightedCost(settings))
  }

  pub fn windowing(mut self, windowing: Windowing) -> Self {
    self.config.windowing = windowing;
    self
  }

  pub fn rollover(mut self, rollover: Rollover) -> Self {
    self.config.rollover = rollover;
    self
  }

  /// Empties the cache whenever a window closes.
  pub fn clear_cache_on_rollover(mut self, enabled: bool) -> Self {
    self.config.rollover.clear_cache = enabled;
    self
  }

  /// Forgets non-resident file history whenever a window closes.
  pub fn clear_ledger_on_rollover(mut self, enabled: bool) -> Self {
    self.config.rollover.clear_ledger = enabled;
    self
  }

  /// Clears group weights whenever a window closes.
  pub fn reset_weights_on_rollover(mut self, enabled: bool) -> Self {
    self.config.rollover.reset_weights = enabled;
    self
  }

  /// Purges ledger entries idle for more than `recency_threshold` records,
  /// every `every_windows` windows.
  pub fn purge(mut self, every_windows: u64, recency_threshold: u64) -> Self {
    self.config.purge = Some(PurgeSchedule {
      every_windows,
      recency_threshold,
    });
    self
  }

  pub fn wall_time_penalty(mut self, penalty: f64) -> Self {
    self.config.wall_time_penalty = penalty;
    self
  }

  /// Attaches a decision oracle consulted on misses and watermark sweeps.
  pub fn oracle<O>(mut self, oracle: O) -> Self
  where
    O: DecisionOracle + 'static,
  {
    self.oracle = Some(Box::new(oracle));
    self
  }

  pub fn config(&self) -> &SimulationConfig {
    &self.config
  }

  pub fn validate(&self) -> Result<(), BuildError> {
    self.config.validate()
  }

  pub fn build(self) -> Result<SimulationDriver, BuildError> {
    self.validate()?;
    let mut driver = SimulationDriver::new(self.config)?;
    driver.set_oracle(self.oracle);
    Ok(driver)
  }
}
