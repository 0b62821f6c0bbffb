use crate::stats::FileStats;
use crate::FastMap;

use serde::{Deserialize, Serialize};

/// Hit/miss and traffic counters for a window or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Counters {
  pub hit: u64,
  pub miss: u64,
  pub written: u64,
  pub read: u64,
  pub read_on_hit: u64,
  pub read_on_miss: u64,
  pub deleted: u64,
  pub cpu_hit: f64,
  pub wall_hit: f64,
  pub cpu_miss: f64,
  pub wall_miss: f64,
}

impl Counters {
  /// `hit / (hit + miss)`, or 0.0 before any lookup.
  pub fn hit_rate(&self) -> f64 {
    let lookups = self.hit + self.miss;
    if lookups == 0 {
      0.0
    } else {
      self.hit as f64 / lookups as f64
    }
  }
}

/// CPU and wall time a job spent on one access, when the trace carries them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccessCost {
  pub cpu_time: Option<f64>,
  pub wall_time: Option<f64>,
}

/// A resident file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub size: u64,
  pub admitted_at: u64,
  pub last_access: u64,
}

/// The resident file set of one simulated cache and its counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheState {
  max_capacity: u64,
  residents: FastMap<String, CacheEntry>,
  size: u64,
  window: Counters,
  totals: Counters,
}

impl CacheState {
  pub fn new(max_capacity: u64) -> Self {
    Self {
      max_capacity,
      residents: FastMap::default(),
      size: 0,
      window: Counters::default(),
      totals: Counters::default(),
    }
  }

  pub fn max_capacity(&self) -> u64 {
    self.max_capacity
  }

  /// Aggregate size of all residents in bytes.
  pub fn size(&self) -> u64 {
    self.size
  }

  pub fn free_space(&self) -> u64 {
    self.max_capacity.saturating_sub(self.size)
  }

  pub fn len(&self) -> usize {
    self.residents.len()
  }

  pub fn is_empty(&self) -> bool {
    self.residents.is_empty()
  }

  pub fn contains(&self, filename: &str) -> bool {
    self.residents.contains_key(filename)
  }

  pub fn get(&self, filename: &str) -> Option<&CacheEntry> {
    self.residents.get(filename)
  }

  pub fn residents(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
    self.residents.iter().map(|(name, entry)| (name.as_str(), entry))
  }

  /// Adds a resident. Returns `false` and leaves the state untouched if the
  /// file is already resident or would not fit in the remaining capacity.
  pub fn admit(&mut self, filename: &str, size: u64, request_index: u64) -> bool {
    if self.residents.contains_key(filename) || size > self.free_space() {
      return false;
    }
    self.residents.insert(
      filename.to_string(),
      CacheEntry {
        size,
        admitted_at: request_index,
        last_access: request_index,
      },
    );
    self.size += size;
    self.window.written += size;
    self.totals.written += size;
    true
  }

  pub fn touch(&mut self, filename: &str, request_index: u64) -> bool {
    match self.residents.get_mut(filename) {
      Some(entry) => {
        entry.last_access = request_index;
        true
      }
      None => false,
    }
  }

  /// Removes a resident and returns the bytes freed.
  pub fn evict(&mut self, filename: &str) -> Option<u64> {
    let entry = self.residents.remove(filename)?;
    self.size -= entry.size;
    self.window.deleted += entry.size;
    self.totals.deleted += entry.size;
    Some(entry.size)
  }

  /// Counts one lookup of the file described by `stats`.
  pub fn record_access(&mut self, stats: &FileStats, hit: bool, cost: AccessCost) {
    for counters in [&mut self.window, &mut self.totals] {
      counters.read += stats.size;
      if hit {
        counters.hit += 1;
        counters.read_on_hit += stats.size;
        counters.cpu_hit += cost.cpu_time.unwrap_or(0.0);
        counters.wall_hit += cost.wall_time.unwrap_or(0.0);
      } else {
        counters.miss += 1;
        counters.read_on_miss += stats.size;
        counters.cpu_miss += cost.cpu_time.unwrap_or(0.0);
        counters.wall_miss += cost.wall_time.unwrap_or(0.0);
      }
    }
  }

  /// Hit rate of the current window.
  pub fn hit_rate(&self) -> f64 {
    self.window.hit_rate()
  }

  /// Resident size as a percentage of capacity.
  pub fn occupancy(&self) -> f64 {
    if self.max_capacity == 0 {
      return 0.0;
    }
    self.size as f64 / self.max_capacity as f64 * 100.0
  }

  pub fn window(&self) -> &Counters {
    &self.window
  }

  /// Counters accumulated over the whole run.
  pub fn totals(&self) -> &Counters {
    &self.totals
  }

  pub fn reset_window(&mut self) {
    self.window = Counters::default();
  }

  /// Drops every resident without counting them as deleted.
  pub fn clear(&mut self) {
    self.residents.clear();
    self.size = 0;
  }

  pub(crate) fn check_consistency(&self) -> Result<(), String> {
    let sum: u64 = self.residents.values().map(|entry| entry.size).sum();
    if sum != self.size {
      return Err(format!(
        "resident sizes add up to {} but the recorded size is {}",
        sum, self.size
      ));
    }
    if self.size > self.max_capacity {
      return Err(format!(
        "resident size {} exceeds capacity {}",
        self.size, self.max_capacity
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn stats(size: u64) -> FileStats {
    FileStats {
      size,
      hit: 0,
      miss: 0,
      last_request_index: 0,
      category: 0,
      touched_at: 0,
    }
  }

  #[test]
  fn admit_respects_capacity() {
    let mut state = CacheState::new(100);
    assert!(state.admit("a", 60, 0));
    assert!(!state.admit("b", 50, 1), "b does not fit");
    assert!(!state.admit("a", 10, 2), "a is already resident");
    assert_eq!(state.size(), 60);
    assert_eq!(state.window().written, 60);
    assert_eq!(state.occupancy(), 60.0);
  }

  #[test]
  fn evict_counts_deleted_bytes() {
    let mut state = CacheState::new(100);
    state.admit("a", 60, 0);
    assert_eq!(state.evict("a"), Some(60));
    assert_eq!(state.evict("a"), None);
    assert_eq!(state.size(), 0);
    assert_eq!(state.totals().deleted, 60);
  }

  #[test]
  fn hit_rate_is_zero_without_lookups() {
    let state = CacheState::new(100);
    assert_eq!(state.hit_rate(), 0.0);
  }

  #[test]
  fn record_access_splits_reads() {
    let mut state = CacheState::new(100);
    let cost = AccessCost {
      cpu_time: Some(2.0),
      wall_time: Some(4.0),
    };
    state.record_access(&stats(10), true, cost);
    state.record_access(&stats(30), false, cost);
    state.record_access(&stats(30), false, AccessCost::default());

    let window = state.window();
    assert_eq!((window.hit, window.miss), (1, 2));
    assert_eq!(window.read, 70);
    assert_eq!(window.read_on_hit, 10);
    assert_eq!(window.read_on_miss, 60);
    assert_eq!(window.cpu_miss, 2.0);
    assert!((state.hit_rate() - 1.0 / 3.0).abs() < 1e-12);

    state.reset_window();
    assert_eq!(state.window().hit, 0);
    assert_eq!(state.totals().hit, 1);
  }

  #[test]
  fn clear_does_not_count_deletions() {
    let mut state = CacheState::new(100);
    state.admit("a", 10, 0);
    state.clear();
    assert!(state.is_empty());
    assert_eq!(state.window().deleted, 0);
    assert!(state.check_consistency().is_ok());
  }
}
