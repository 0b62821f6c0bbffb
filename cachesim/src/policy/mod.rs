pub mod lru;
pub(crate) mod lru_list;
pub mod watermark;
pub mod weighted;

use crate::error::BuildError;
use crate::state::CacheState;

use serde::{Deserialize, Serialize};

pub use lru::FixedRecency;
pub use watermark::{Watermarks, WatermarkedGroupWeightedCost};
pub use weighted::GroupWeightedCost;

/// One access as seen by a policy.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
  pub filename: &'a str,
  pub size: u64,
  pub group: &'a str,
  /// Whether the file was resident before this access.
  pub hit: bool,
  pub index: u64,
}

/// Why a missed file was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
  /// The file alone is larger than the cache. It can never be cached.
  Oversized,
  /// Not enough residents are worth less than the candidate.
  NoCheaperVictims,
  /// The candidate's weight is above the recent-weight threshold.
  AboveThreshold,
  /// A decision oracle chose not to admit the file.
  Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
  /// Nothing to do, typically a hit.
  NoOp,
  Admit,
  /// Evict the listed residents, then admit the file.
  AdmitAndEvict(Vec<String>),
  Reject(RejectReason),
}

/// A trait for cache admission/eviction policies.
///
/// The policy tracks resident files and decides which files to admit and
/// which to evict. Whenever it returns [`AdmissionDecision::Admit`] or
/// [`AdmissionDecision::AdmitAndEvict`] its own tracking already reflects the
/// outcome, and the caller is expected to apply the same change to the
/// [`CacheState`].
pub trait CachePolicy {
  /// Called for every access, hit or miss, before any admission decision.
  fn on_access(&mut self, request: &Request<'_>, state: &CacheState);

  /// Called when a missed file asks to be admitted.
  ///
  /// Any victims returned must free enough room for the file. A rejection
  /// leaves the policy unchanged.
  fn on_admit(&mut self, request: &Request<'_>, state: &CacheState) -> AdmissionDecision;

  /// Stops tracking a file removed from outside the policy.
  fn on_remove(&mut self, filename: &str);

  /// Picks victims until at least `bytes_to_free` are freed, stops tracking
  /// them, and returns them with the bytes freed.
  fn evict(&mut self, bytes_to_free: u64) -> (Vec<String>, u64);

  /// Tracked residents, first eviction candidate first.
  fn eviction_order(&self) -> Vec<String>;

  fn tracks(&self, filename: &str) -> bool;

  fn tracked_len(&self) -> usize;

  /// Clears all tracking state.
  fn clear(&mut self);

  /// Forgets learned weights. Policies without weights ignore this.
  fn reset_weights(&mut self) {}

  /// Capacity watermarks the driver should enforce, if any.
  fn watermarks(&self) -> Option<Watermarks> {
    None
  }

  /// Runs the access hook, then asks for admission on a miss.
  fn decide(&mut self, request: &Request<'_>, state: &CacheState) -> AdmissionDecision {
    self.on_access(request, state);
    if request.hit {
      AdmissionDecision::NoOp
    } else {
      self.on_admit(request, state)
    }
  }
}

/// The policy variants a simulation can run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Policy {
  FixedRecency(FixedRecency),
  GroupWeightedCost(GroupWeightedCost),
  WatermarkedGroupWeightedCost(WatermarkedGroupWeightedCost),
}

macro_rules! dispatch {
  ($self:ident, $policy:ident => $body:expr) => {
    match $self {
      Policy::FixedRecency($policy) => $body,
      Policy::GroupWeightedCost($policy) => $body,
      Policy::WatermarkedGroupWeightedCost($policy) => $body,
    }
  };
}

impl Policy {
  pub fn name(&self) -> &'static str {
    match self {
      Policy::FixedRecency(_) => "fixed_recency",
      Policy::GroupWeightedCost(_) => "group_weighted_cost",
      Policy::WatermarkedGroupWeightedCost(_) => "watermarked_group_weighted_cost",
    }
  }

  // Derived indices are not serialized.
  pub(crate) fn rebuild_indices(&mut self) {
    match self {
      Policy::FixedRecency(_) => {}
      Policy::GroupWeightedCost(policy) => policy.rebuild_index(),
      Policy::WatermarkedGroupWeightedCost(policy) => policy.rebuild_index(),
    }
  }
}

impl CachePolicy for Policy {
  fn on_access(&mut self, request: &Request<'_>, state: &CacheState) {
    dispatch!(self, policy => policy.on_access(request, state))
  }

  fn on_admit(&mut self, request: &Request<'_>, state: &CacheState) -> AdmissionDecision {
    dispatch!(self, policy => policy.on_admit(request, state))
  }

  fn on_remove(&mut self, filename: &str) {
    dispatch!(self, policy => policy.on_remove(filename))
  }

  fn evict(&mut self, bytes_to_free: u64) -> (Vec<String>, u64) {
    dispatch!(self, policy => policy.evict(bytes_to_free))
  }

  fn eviction_order(&self) -> Vec<String> {
    dispatch!(self, policy => policy.eviction_order())
  }

  fn tracks(&self, filename: &str) -> bool {
    dispatch!(self, policy => policy.tracks(filename))
  }

  fn tracked_len(&self) -> usize {
    dispatch!(self, policy => policy.tracked_len())
  }

  fn clear(&mut self) {
    dispatch!(self, policy => policy.clear())
  }

  fn reset_weights(&mut self) {
    dispatch!(self, policy => policy.reset_weights())
  }

  fn watermarks(&self) -> Option<Watermarks> {
    dispatch!(self, policy => policy.watermarks())
  }
}

/// Default exponent of the weight function.
pub const DEFAULT_EXPONENT: f64 = 2.0;
/// Default number of recent weights the admission threshold is computed over.
pub const DEFAULT_THRESHOLD_WINDOW: usize = 1024;
/// Default admission threshold percentile (the median).
pub const DEFAULT_PERCENTILE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedSettings {
  pub exponent: f64,
}

impl Default for WeightedSettings {
  fn default() -> Self {
    Self {
      exponent: DEFAULT_EXPONENT,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatermarkSettings {
  pub exponent: f64,
  pub watermarks: Watermarks,
  /// Percentile of recent weights above which candidates are rejected.
  pub percentile: f64,
  /// Number of recent weights the percentile is computed over.
  pub threshold_window: usize,
}

impl Default for WatermarkSettings {
  fn default() -> Self {
    Self {
      exponent: DEFAULT_EXPONENT,
      watermarks: Watermarks::default(),
      percentile: DEFAULT_PERCENTILE,
      threshold_window: DEFAULT_THRESHOLD_WINDOW,
    }
  }
}

/// Which policy a simulation runs, with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PolicyConfig {
  FixedRecency,
  GroupWeightedCost(WeightedSettings),
  WatermarkedGroupWeightedCost(WatermarkSettings),
}

impl Default for PolicyConfig {
  fn default() -> Self {
    PolicyConfig::FixedRecency
  }
}

fn validate_exponent(exponent: f64) -> Result<(), BuildError> {
  if !exponent.is_finite() || exponent < 0.0 {
    return Err(BuildError::InvalidExponent(exponent));
  }
  Ok(())
}

impl PolicyConfig {
  pub fn validate(&self) -> Result<(), BuildError> {
    match self {
      PolicyConfig::FixedRecency => Ok(()),
      PolicyConfig::GroupWeightedCost(settings) => validate_exponent(settings.exponent),
      PolicyConfig::WatermarkedGroupWeightedCost(settings) => {
        validate_exponent(settings.exponent)?;
        settings.watermarks.validate()?;
        if !(0.0..=1.0).contains(&settings.percentile) {
          return Err(BuildError::InvalidPercentile(settings.percentile));
        }
        if settings.threshold_window == 0 {
          return Err(BuildError::ZeroThresholdWindow);
        }
        Ok(())
      }
    }
  }

  /// Creates a fresh policy instance.
  pub fn build(&self) -> Policy {
    match self {
      PolicyConfig::FixedRecency => Policy::FixedRecency(FixedRecency::new()),
      PolicyConfig::GroupWeightedCost(settings) => {
        Policy::GroupWeightedCost(GroupWeightedCost::new(settings.exponent))
      }
      PolicyConfig::WatermarkedGroupWeightedCost(settings) => {
        Policy::WatermarkedGroupWeightedCost(WatermarkedGroupWeightedCost::new(*settings))
      }
    }
  }
}
