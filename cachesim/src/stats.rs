use crate::FastMap;

use serde::{Deserialize, Serialize};

/// Per-file access counters kept by the [`StatsLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
  pub size: u64,
  pub hit: u64,
  pub miss: u64,
  /// Request index of the most recent access.
  pub last_request_index: u64,
  pub category: u32,
  // Ledger clock value at the most recent access.
  pub(crate) touched_at: u64,
}

impl FileStats {
  pub fn requests(&self) -> u64 {
    self.hit + self.miss
  }

  /// Number of records processed since this file was last accessed.
  pub fn recency(&self, clock: u64) -> u64 {
    clock.saturating_sub(self.touched_at)
  }
}

/// Map from filename to [`FileStats`].
///
/// Entries are created on first sight and only removed by an explicit purge.
/// Recency is tracked against a logical clock that advances once per record,
/// so aging every known file is a single increment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsLedger {
  entries: FastMap<String, FileStats>,
  clock: u64,
}

impl StatsLedger {
  pub fn new() -> Self {
    Self::default()
  }

  /// Ages every known file by one record.
  pub fn advance(&mut self) {
    self.clock += 1;
  }

  pub fn clock(&self) -> u64 {
    self.clock
  }

  /// Returns the stats for `filename`, creating a zeroed entry if unseen.
  ///
  /// Calling this repeatedly for the same record does not change the entry.
  pub fn get_or_create(&mut self, filename: &str, size: u64, request_index: u64) -> &mut FileStats {
    let clock = self.clock;
    self
      .entries
      .entry(filename.to_string())
      .or_insert_with(|| FileStats {
        size,
        hit: 0,
        miss: 0,
        last_request_index: request_index,
        category: 0,
        touched_at: clock,
      })
  }

  /// Records an access and returns the updated stats along with the number
  /// of requests since the previous access (0 for a first sighting).
  pub fn update(
    &mut self,
    filename: &str,
    size: u64,
    request_index: u64,
    category: u32,
    hit: bool,
  ) -> (FileStats, u64) {
    let clock = self.clock;
    let stats = self.get_or_create(filename, size, request_index);
    let since_last = request_index.saturating_sub(stats.last_request_index);

    stats.size = size;
    stats.category = category;
    stats.last_request_index = request_index;
    stats.touched_at = clock;
    if hit {
      stats.hit += 1;
    } else {
      stats.miss += 1;
    }

    (*stats, since_last)
  }

  pub fn get(&self, filename: &str) -> Option<&FileStats> {
    self.entries.get(filename)
  }

  pub fn contains(&self, filename: &str) -> bool {
    self.entries.contains_key(filename)
  }

  pub fn recency(&self, filename: &str) -> Option<u64> {
    self.entries.get(filename).map(|stats| stats.recency(self.clock))
  }

  /// Removes every entry whose recency exceeds `threshold_recency`.
  pub fn purge(&mut self, threshold_recency: u64) -> usize {
    self.purge_where(threshold_recency, |_| false)
  }

  /// Like [`purge`](Self::purge), but entries for which `keep` returns
  /// `true` survive regardless of their recency.
  pub fn purge_where<F>(&mut self, threshold_recency: u64, keep: F) -> usize
  where
    F: Fn(&str) -> bool,
  {
    let clock = self.clock;
    let before = self.entries.len();
    self
      .entries
      .retain(|name, stats| stats.recency(clock) <= threshold_recency || keep(name));
    before - self.entries.len()
  }

  /// Drops every entry for which `keep` returns `false`.
  pub fn retain<F>(&mut self, keep: F) -> usize
  where
    F: Fn(&str) -> bool,
  {
    let before = self.entries.len();
    self.entries.retain(|name, _| keep(name));
    before - self.entries.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &FileStats)> {
    self.entries.iter().map(|(name, stats)| (name.as_str(), stats))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn get_or_create_is_idempotent() {
    let mut ledger = StatsLedger::new();
    ledger.advance();
    ledger.get_or_create("a", 10, 7);
    let stats = *ledger.get_or_create("a", 99, 8);
    assert_eq!(stats.size, 10);
    assert_eq!(stats.last_request_index, 7);
    assert_eq!(stats.requests(), 0);
    assert_eq!(ledger.len(), 1);
  }

  #[test]
  fn recency_ages_once_per_advance() {
    let mut ledger = StatsLedger::new();
    ledger.advance();
    ledger.update("a", 10, 0, 0, false);
    assert_eq!(ledger.recency("a"), Some(0));

    for expected in 1..=5 {
      ledger.advance();
      assert_eq!(ledger.recency("a"), Some(expected));
    }

    ledger.advance();
    let (stats, since_last) = ledger.update("a", 10, 6, 1, true);
    assert_eq!(ledger.recency("a"), Some(0));
    assert_eq!(since_last, 6);
    assert_eq!((stats.hit, stats.miss, stats.category), (1, 1, 1));
  }

  #[test]
  fn purge_removes_only_stale_entries() {
    let mut ledger = StatsLedger::new();
    ledger.advance();
    ledger.update("old", 1, 0, 0, false);
    ledger.update("kept", 1, 0, 0, false);
    for _ in 0..10 {
      ledger.advance();
    }
    ledger.update("fresh", 1, 10, 0, false);

    let removed = ledger.purge_where(5, |name| name == "kept");
    assert_eq!(removed, 1);
    assert!(!ledger.contains("old"));
    assert!(ledger.contains("kept"));
    assert!(ledger.contains("fresh"));

    assert_eq!(ledger.purge(5), 1);
    assert!(!ledger.contains("kept"));
  }
}
