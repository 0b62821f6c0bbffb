use super::weighted::GroupWeightedCost;
use super::{AdmissionDecision, CachePolicy, RejectReason, Request, WatermarkSettings};
use crate::error::BuildError;
use crate::state::CacheState;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// High and low occupancy marks, in percent of capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Watermarks {
  pub high: f64,
  pub low: f64,
}

impl Default for Watermarks {
  fn default() -> Self {
    Self {
      high: 95.0,
      low: 75.0,
    }
  }
}

impl Watermarks {
  pub fn new(high: f64, low: f64) -> Self {
    Self { high, low }
  }

  pub fn validate(&self) -> Result<(), BuildError> {
    let valid = self.high.is_finite()
      && self.low.is_finite()
      && self.low >= 0.0
      && self.low < self.high
      && self.high <= 100.0;
    if valid {
      Ok(())
    } else {
      Err(BuildError::InvalidWatermarks {
        high: self.high,
        low: self.low,
      })
    }
  }
}

/// Linear-interpolated percentile of an unsorted sample.
pub(crate) fn percentile(values: &VecDeque<f64>, p: f64) -> Option<f64> {
  if values.is_empty() {
    return None;
  }
  let mut sorted: Vec<f64> = values.iter().copied().collect();
  sorted.sort_by(f64::total_cmp);

  let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
  let lower = pos.floor() as usize;
  let upper = pos.ceil() as usize;
  let fraction = pos - lower as f64;
  Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// [`GroupWeightedCost`] with an admission threshold and capacity watermarks.
///
/// Candidates heavier than a percentile of recently observed weights are
/// rejected even when there is room. The watermarks are enforced by the
/// driver between records, not by the policy itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkedGroupWeightedCost {
  inner: GroupWeightedCost,
  watermarks: Watermarks,
  percentile: f64,
  window_len: usize,
  recent: VecDeque<f64>,
}

impl WatermarkedGroupWeightedCost {
  pub fn new(settings: WatermarkSettings) -> Self {
    Self {
      inner: GroupWeightedCost::new(settings.exponent),
      watermarks: settings.watermarks,
      percentile: settings.percentile,
      window_len: settings.threshold_window,
      recent: VecDeque::with_capacity(settings.threshold_window),
    }
  }

  pub fn inner(&self) -> &GroupWeightedCost {
    &self.inner
  }

  /// Current admission threshold, or `None` while no weight has been seen.
  pub fn threshold(&self) -> Option<f64> {
    percentile(&self.recent, self.percentile)
  }

  fn observe(&mut self, weight: f64) {
    if self.recent.len() == self.window_len {
      self.recent.pop_front();
    }
    self.recent.push_back(weight);
  }

  pub(crate) fn rebuild_index(&mut self) {
    self.inner.rebuild_index();
  }
}

impl CachePolicy for WatermarkedGroupWeightedCost {
  fn on_access(&mut self, request: &Request<'_>, state: &CacheState) {
    self.inner.on_access(request, state);
    if request.hit {
      if let Some(weight) = self.inner.resident_weight(request.filename) {
        self.observe(weight);
      }
    }
  }

  fn on_admit(&mut self, request: &Request<'_>, state: &CacheState) -> AdmissionDecision {
    if request.size > state.max_capacity() {
      return AdmissionDecision::Reject(RejectReason::Oversized);
    }

    let candidate = self.inner.weight_of(request.group, request.size);
    let threshold = self.threshold();
    self.observe(candidate);

    if let Some(threshold) = threshold {
      if candidate > threshold {
        trace!(
          filename = request.filename,
          weight = candidate,
          threshold,
          "candidate above threshold"
        );
        return AdmissionDecision::Reject(RejectReason::AboveThreshold);
      }
    }

    self.inner.on_admit(request, state)
  }

  fn on_remove(&mut self, filename: &str) {
    self.inner.on_remove(filename);
  }

  fn evict(&mut self, bytes_to_free: u64) -> (Vec<String>, u64) {
    self.inner.evict(bytes_to_free)
  }

  fn eviction_order(&self) -> Vec<String> {
    self.inner.eviction_order()
  }

  fn tracks(&self, filename: &str) -> bool {
    self.inner.tracks(filename)
  }

  fn tracked_len(&self) -> usize {
    self.inner.tracked_len()
  }

  fn clear(&mut self) {
    self.inner.clear();
  }

  fn reset_weights(&mut self) {
    self.inner.reset_weights();
    self.recent.clear();
  }

  fn watermarks(&self) -> Option<Watermarks> {
    Some(self.watermarks)
  }
}
