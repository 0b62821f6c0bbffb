//! The narrow call-and-response interface to an external decision maker,
//! such as a learned admission/eviction model served elsewhere.

use crate::error::OracleError;

use serde::{Deserialize, Serialize};

/// Which decision the oracle is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
  /// `Apply` admits the missed file.
  Admission,
  /// `Apply` evicts the resident file.
  Eviction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleAction {
  Apply,
  Skip,
}

/// Features describing one file and the current resident set.
///
/// Sizes are in MiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
  pub size: f64,
  pub total_requests: f64,
  /// Requests since this file was last accessed.
  pub recency_delta: f64,
  /// 1.0 for a non-zero category tag, 0.0 otherwise.
  pub category: f64,
  pub mean_recency: f64,
  pub mean_frequency: f64,
  pub mean_size: f64,
}

impl FeatureVector {
  pub const LEN: usize = 7;

  pub fn as_array(&self) -> [f64; Self::LEN] {
    [
      self.size,
      self.total_requests,
      self.recency_delta,
      self.category,
      self.mean_recency,
      self.mean_frequency,
      self.mean_size,
    ]
  }
}

/// A synchronous decision service.
///
/// Each call must answer with exactly one action. Errors make the driver
/// fall back to the policy's own decision.
pub trait DecisionOracle: Send {
  fn decide(&mut self, phase: Phase, features: &FeatureVector) -> Result<OracleAction, OracleError>;
}

impl<F> DecisionOracle for F
where
  F: FnMut(Phase, &FeatureVector) -> Result<OracleAction, OracleError> + Send,
{
  fn decide(&mut self, phase: Phase, features: &FeatureVector) -> Result<OracleAction, OracleError> {
    self(phase, features)
  }
}
