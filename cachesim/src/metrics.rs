use crate::state::Counters;

use std::fmt;

use serde::{Deserialize, Serialize};

const MB: f64 = 1024.0 * 1024.0;

/// Factor applied to miss wall time unless configured otherwise.
pub const DEFAULT_WALL_TIME_PENALTY: f64 = 1.15;

pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
  if denominator == 0.0 {
    0.0
  } else {
    numerator / denominator
  }
}

pub(crate) fn to_mb(bytes: u64) -> f64 {
  bytes as f64 / MB
}

/// The statistics flushed at the end of one window.
///
/// Sizes are in MiB and ratios in percent.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
  /// Zero-based window number within the run.
  pub window: u64,
  pub date: String,
  /// Resident size at flush time.
  pub size: f64,
  pub hit_rate: f64,
  pub hit_over_miss: f64,
  pub written: f64,
  pub read: f64,
  pub read_on_hit: f64,
  pub read_on_miss: f64,
  pub deleted: f64,
  pub cpu_efficiency: f64,
  pub cpu_hit_efficiency: f64,
  pub cpu_miss_efficiency: f64,
  /// Written plus read plus deleted data.
  pub cost: f64,
}

impl WindowReport {
  pub const HEADER: [&'static str; 13] = [
    "date",
    "size",
    "hit rate",
    "hit over miss",
    "written data",
    "read data",
    "read on hit data",
    "read on miss data",
    "deleted data",
    "CPU efficiency",
    "CPU hit efficiency",
    "CPU miss efficiency",
    "cost",
  ];

  pub(crate) fn from_counters(
    window: u64,
    date: String,
    resident_bytes: u64,
    counters: &Counters,
    wall_time_penalty: f64,
  ) -> Self {
    let penalized_miss_wall = counters.wall_miss * wall_time_penalty;
    let written = to_mb(counters.written);
    let read = to_mb(counters.read);
    let deleted = to_mb(counters.deleted);

    Self {
      window,
      date,
      size: to_mb(resident_bytes),
      hit_rate: counters.hit_rate() * 100.0,
      hit_over_miss: ratio(counters.hit as f64, counters.miss as f64) * 100.0,
      written,
      read,
      read_on_hit: to_mb(counters.read_on_hit),
      read_on_miss: to_mb(counters.read_on_miss),
      deleted,
      cpu_efficiency: ratio(
        counters.cpu_hit + counters.cpu_miss,
        counters.wall_hit + penalized_miss_wall,
      ) * 100.0,
      cpu_hit_efficiency: ratio(counters.cpu_hit, counters.wall_hit) * 100.0,
      cpu_miss_efficiency: ratio(counters.cpu_miss, penalized_miss_wall) * 100.0,
      cost: written + read + deleted,
    }
  }

  /// The row values in [`HEADER`](Self::HEADER) order.
  pub fn fields(&self) -> [String; 13] {
    [
      self.date.clone(),
      self.size.to_string(),
      self.hit_rate.to_string(),
      self.hit_over_miss.to_string(),
      self.written.to_string(),
      self.read.to_string(),
      self.read_on_hit.to_string(),
      self.read_on_miss.to_string(),
      self.deleted.to_string(),
      self.cpu_efficiency.to_string(),
      self.cpu_hit_efficiency.to_string(),
      self.cpu_miss_efficiency.to_string(),
      self.cost.to_string(),
    ]
  }
}

impl fmt::Debug for WindowReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WindowReport")
      .field("window", &self.window)
      .field("date", &self.date)
      .field("size_mb", &format!("{:.2}", self.size))
      .field("hit_rate", &format!("{:.2}%", self.hit_rate))
      .field("hit_over_miss", &format!("{:.2}%", self.hit_over_miss))
      .field("written_mb", &format!("{:.2}", self.written))
      .field("read_mb", &format!("{:.2}", self.read))
      .field("deleted_mb", &format!("{:.2}", self.deleted))
      .field("cpu_efficiency", &format!("{:.2}%", self.cpu_efficiency))
      .field("cost", &format!("{:.2}", self.cost))
      .finish_non_exhaustive()
  }
}

/// Totals for a finished (or paused) run.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
  pub name: String,
  pub records_processed: u64,
  /// Malformed records that were skipped.
  pub records_rejected: u64,
  pub windows_flushed: u64,
  pub hits: u64,
  pub misses: u64,
  /// Lifetime hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  pub written_bytes: u64,
  pub read_bytes: u64,
  pub deleted_bytes: u64,
}

impl RunSummary {
  pub(crate) fn new(
    name: &str,
    records_processed: u64,
    records_rejected: u64,
    windows_flushed: u64,
    totals: &Counters,
  ) -> Self {
    Self {
      name: name.to_string(),
      records_processed,
      records_rejected,
      windows_flushed,
      hits: totals.hit,
      misses: totals.miss,
      hit_ratio: totals.hit_rate(),
      written_bytes: totals.written,
      read_bytes: totals.read,
      deleted_bytes: totals.deleted,
    }
  }
}

impl fmt::Debug for RunSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RunSummary")
      .field("name", &self.name)
      .field("records_processed", &self.records_processed)
      .field("records_rejected", &self.records_rejected)
      .field("windows_flushed", &self.windows_flushed)
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("written_bytes", &self.written_bytes)
      .field("read_bytes", &self.read_bytes)
      .field("deleted_bytes", &self.deleted_bytes)
      .finish()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn empty_window_has_zero_ratios() {
    let report = WindowReport::from_counters(0, "d".into(), 0, &Counters::default(), 1.15);
    assert_eq!(report.hit_rate, 0.0);
    assert_eq!(report.hit_over_miss, 0.0);
    assert_eq!(report.cpu_efficiency, 0.0);
    assert_eq!(report.cpu_hit_efficiency, 0.0);
    assert_eq!(report.cpu_miss_efficiency, 0.0);
    assert_eq!(report.cost, 0.0);
  }

  #[test]
  fn efficiency_penalizes_miss_wall_time() {
    let counters = Counters {
      hit: 1,
      miss: 1,
      written: 1024 * 1024,
      read: 2 * 1024 * 1024,
      cpu_hit: 50.0,
      wall_hit: 100.0,
      cpu_miss: 46.0,
      wall_miss: 40.0,
      ..Default::default()
    };
    let report = WindowReport::from_counters(3, "d".into(), 0, &counters, 1.15);

    assert_eq!(report.hit_rate, 50.0);
    assert_eq!(report.hit_over_miss, 100.0);
    assert_eq!(report.cpu_hit_efficiency, 50.0);
    assert!((report.cpu_miss_efficiency - 100.0).abs() < 1e-9);
    assert!((report.cpu_efficiency - 96.0 / 146.0 * 100.0).abs() < 1e-9);
    assert_eq!(report.cost, 3.0);
    assert_eq!(report.fields().len(), WindowReport::HEADER.len());
  }
}
