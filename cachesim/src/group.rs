use crate::{FastMap, FastSet};

use serde::{Deserialize, Serialize};

/// Running request counter and distinct member set of one file group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
  pub frequency: f64,
  members: FastSet<String>,
}

impl GroupAggregate {
  pub fn members(&self) -> usize {
    self.members.len()
  }

  pub fn contains(&self, filename: &str) -> bool {
    self.members.contains(filename)
  }

  /// Requests per distinct member, or 0.0 for an empty group.
  pub fn mean_frequency(&self) -> f64 {
    if self.members.is_empty() {
      0.0
    } else {
      self.frequency / self.members.len() as f64
    }
  }
}

/// One [`GroupAggregate`] per logical group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupTable {
  groups: FastMap<String, GroupAggregate>,
}

impl GroupTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Counts one request from `filename` against `group`.
  pub fn record(&mut self, group: &str, filename: &str) -> &GroupAggregate {
    let aggregate = self.groups.entry(group.to_string()).or_default();
    aggregate.frequency += 1.0;
    if !aggregate.members.contains(filename) {
      aggregate.members.insert(filename.to_string());
    }
    aggregate
  }

  pub fn get(&self, group: &str) -> Option<&GroupAggregate> {
    self.groups.get(group)
  }

  pub fn len(&self) -> usize {
    self.groups.len()
  }

  pub fn is_empty(&self) -> bool {
    self.groups.is_empty()
  }

  pub fn reset(&mut self) {
    self.groups.clear();
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn record_grows_frequency_and_members() {
    let mut table = GroupTable::new();
    table.record("g", "a");
    table.record("g", "a");
    let aggregate = table.record("g", "b").clone();

    assert_eq!(aggregate.frequency, 3.0);
    assert_eq!(aggregate.members(), 2);
    assert_eq!(aggregate.mean_frequency(), 1.5);
    assert!(aggregate.contains("a"));
  }

  #[test]
  fn reset_forgets_every_group() {
    let mut table = GroupTable::new();
    table.record("g", "a");
    table.record("h", "b");
    assert_eq!(table.len(), 2);
    table.reset();
    assert!(table.is_empty());
    assert!(table.get("g").is_none());
  }
}
