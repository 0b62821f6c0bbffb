use super::{AdmissionDecision, CachePolicy, RejectReason, Request};
use crate::group::{GroupAggregate, GroupTable};
use crate::state::CacheState;
use crate::{FastMap, FastSet};

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// `size / (frequency / members) ^ exponent`.
///
/// Lower weights are more valuable. An empty or reset group has no frequency
/// yet, which makes every member infinitely heavy.
pub fn weight(size: u64, aggregate: Option<&GroupAggregate>, exponent: f64) -> f64 {
  let mean_frequency = aggregate.map(GroupAggregate::mean_frequency).unwrap_or(0.0);
  size as f64 / mean_frequency.powf(exponent)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Resident {
  size: u64,
  group: String,
  weight: f64,
  seq: u64,
}

// Ordered heaviest first, then oldest admission first.
#[derive(Debug, Clone)]
struct IndexKey {
  weight: f64,
  seq: u64,
  filename: String,
}

impl IndexKey {
  fn of(filename: &str, resident: &Resident) -> Self {
    Self {
      weight: resident.weight,
      seq: resident.seq,
      filename: filename.to_string(),
    }
  }
}

impl Ord for IndexKey {
  fn cmp(&self, other: &Self) -> Ordering {
    other
      .weight
      .total_cmp(&self.weight)
      .then(self.seq.cmp(&other.seq))
      .then_with(|| self.filename.cmp(&other.filename))
  }
}

impl PartialOrd for IndexKey {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for IndexKey {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for IndexKey {}

/// A policy that keeps the files whose group is requested most often per
/// byte.
///
/// Every access refreshes the weights of the resident files in the accessed
/// group. A missed file is admitted if it fits, or if enough strictly heavier
/// residents can be evicted to make room. Otherwise it is rejected and the
/// cache is left as it was.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWeightedCost {
  exponent: f64,
  groups: GroupTable,
  residents: FastMap<String, Resident>,
  group_residents: FastMap<String, FastSet<String>>,
  #[serde(skip)]
  index: BTreeSet<IndexKey>,
  next_seq: u64,
}

impl GroupWeightedCost {
  pub fn new(exponent: f64) -> Self {
    Self {
      exponent,
      groups: GroupTable::new(),
      residents: FastMap::default(),
      group_residents: FastMap::default(),
      index: BTreeSet::new(),
      next_seq: 0,
    }
  }

  pub fn exponent(&self) -> f64 {
    self.exponent
  }

  pub fn groups(&self) -> &GroupTable {
    &self.groups
  }

  /// Weight a file of `size` in `group` would have right now.
  pub fn weight_of(&self, group: &str, size: u64) -> f64 {
    weight(size, self.groups.get(group), self.exponent)
  }

  pub fn resident_weight(&self, filename: &str) -> Option<f64> {
    self.residents.get(filename).map(|resident| resident.weight)
  }

  /// Resident files, heaviest first.
  pub fn residents_by_weight(&self) -> impl Iterator<Item = (&str, f64)> {
    self
      .index
      .iter()
      .map(|key| (key.filename.as_str(), key.weight))
  }

  pub(crate) fn rebuild_index(&mut self) {
    self.index = self
      .residents
      .iter()
      .map(|(name, resident)| IndexKey::of(name, resident))
      .collect();
  }

  fn refresh_group(&mut self, group: &str) {
    let Some(members) = self.group_residents.get(group) else {
      return;
    };
    let weight_now = |size| weight(size, self.groups.get(group), self.exponent);

    for name in members {
      if let Some(resident) = self.residents.get_mut(name) {
        let updated = weight_now(resident.size);
        if updated.total_cmp(&resident.weight) != Ordering::Equal {
          self.index.remove(&IndexKey::of(name, resident));
          resident.weight = updated;
          self.index.insert(IndexKey::of(name, resident));
        }
      }
    }
  }

  fn track(&mut self, request: &Request<'_>, weight: f64) {
    let resident = Resident {
      size: request.size,
      group: request.group.to_string(),
      weight,
      seq: self.next_seq,
    };
    self.next_seq += 1;
    self.index.insert(IndexKey::of(request.filename, &resident));
    self
      .group_residents
      .entry(request.group.to_string())
      .or_default()
      .insert(request.filename.to_string());
    self.residents.insert(request.filename.to_string(), resident);
  }

  fn untrack(&mut self, filename: &str) -> Option<u64> {
    let resident = self.residents.remove(filename)?;
    self.index.remove(&IndexKey::of(filename, &resident));
    if let Some(members) = self.group_residents.get_mut(&resident.group) {
      members.remove(filename);
      if members.is_empty() {
        self.group_residents.remove(&resident.group);
      }
    }
    Some(resident.size)
  }
}

impl CachePolicy for GroupWeightedCost {
  fn on_access(&mut self, request: &Request<'_>, _state: &CacheState) {
    self.groups.record(request.group, request.filename);
    self.refresh_group(request.group);
  }

  fn on_admit(&mut self, request: &Request<'_>, state: &CacheState) -> AdmissionDecision {
    if request.size > state.max_capacity() {
      return AdmissionDecision::Reject(RejectReason::Oversized);
    }

    let candidate = self.weight_of(request.group, request.size);
    let mut free = state.free_space();
    if request.size <= free {
      self.track(request, candidate);
      return AdmissionDecision::Admit;
    }

    // Plan the evictions first so that a failed scan changes nothing.
    let mut victims = Vec::new();
    for key in &self.index {
      if key.weight <= candidate || free >= request.size {
        break;
      }
      if let Some(resident) = self.residents.get(&key.filename) {
        free += resident.size;
        victims.push(key.filename.clone());
      }
    }

    if free < request.size {
      trace!(
        filename = request.filename,
        weight = candidate,
        "no cheaper victims"
      );
      return AdmissionDecision::Reject(RejectReason::NoCheaperVictims);
    }

    for victim in &victims {
      self.untrack(victim);
    }
    self.track(request, candidate);
    AdmissionDecision::AdmitAndEvict(victims)
  }

  fn on_remove(&mut self, filename: &str) {
    self.untrack(filename);
  }

  fn evict(&mut self, bytes_to_free: u64) -> (Vec<String>, u64) {
    let mut victims = Vec::new();
    let mut freed = 0;

    while freed < bytes_to_free {
      let Some(worst) = self.index.first().map(|key| key.filename.clone()) else {
        break;
      };
      freed += self.untrack(&worst).unwrap_or(0);
      victims.push(worst);
    }

    (victims, freed)
  }

  fn eviction_order(&self) -> Vec<String> {
    self.index.iter().map(|key| key.filename.clone()).collect()
  }

  fn tracks(&self, filename: &str) -> bool {
    self.residents.contains_key(filename)
  }

  fn tracked_len(&self) -> usize {
    self.residents.len()
  }

  fn clear(&mut self) {
    self.residents.clear();
    self.group_residents.clear();
    self.index.clear();
  }

  /// Stale resident weights are recomputed on their group's next access.
  fn reset_weights(&mut self) {
    self.groups.reset();
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn request<'a>(filename: &'a str, group: &'a str, size: u64) -> Request<'a> {
    Request {
      filename,
      size,
      group,
      hit: false,
      index: 0,
    }
  }

  #[test]
  fn weight_follows_group_frequency() {
    let mut table = GroupTable::new();
    table.record("g", "a");
    assert_eq!(weight(100, table.get("g"), 1.0), 100.0);

    table.record("g", "a");
    table.record("g", "a");
    table.record("g", "b");
    // 4 requests over 2 members
    assert_eq!(weight(100, table.get("g"), 2.0), 25.0);
    assert!(weight(100, None, 2.0).is_infinite());
  }

  #[test]
  fn index_orders_heaviest_then_oldest() {
    let mut policy = GroupWeightedCost::new(1.0);
    let state = CacheState::new(u64::MAX);
    for (name, group, size) in [("a", "g1", 10), ("b", "g2", 30), ("c", "g3", 10)] {
      let req = request(name, group, size);
      policy.on_access(&req, &state);
      policy.on_admit(&req, &state);
    }

    let order: Vec<_> = policy.residents_by_weight().map(|(name, _)| name).collect();
    assert_eq!(order, vec!["b", "a", "c"]);
  }

  #[test]
  fn access_refreshes_sibling_weights() {
    let mut policy = GroupWeightedCost::new(1.0);
    let state = CacheState::new(u64::MAX);
    let a = request("a", "g", 100);
    policy.on_access(&a, &state);
    policy.on_admit(&a, &state);
    assert_eq!(policy.resident_weight("a"), Some(100.0));

    // A request for a sibling changes the group mean to 2 / 2 = 1.
    let b = request("b", "g", 100);
    policy.on_access(&b, &state);
    assert_eq!(policy.resident_weight("a"), Some(100.0));

    let hit = Request { hit: true, ..a };
    policy.on_access(&hit, &state);
    // 3 requests over 2 members
    assert_eq!(policy.resident_weight("a"), Some(100.0 / 1.5));
  }

  #[test]
  fn rebuild_index_matches_residents() {
    let mut policy = GroupWeightedCost::new(1.0);
    let state = CacheState::new(u64::MAX);
    for (name, size) in [("a", 5), ("b", 7)] {
      let req = request(name, name, size);
      policy.on_access(&req, &state);
      policy.on_admit(&req, &state);
    }
    let expected = policy.eviction_order();

    let bytes = bincode::serialize(&policy).unwrap();
    let mut restored: GroupWeightedCost = bincode::deserialize(&bytes).unwrap();
    assert!(restored.eviction_order().is_empty(), "Index is not serialized");
    restored.rebuild_index();
    assert_eq!(restored.eviction_order(), expected);
  }
}
