use super::lru_list::LruList;
use super::{AdmissionDecision, CachePolicy, RejectReason, Request};
use crate::state::CacheState;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// A policy that evicts the least recently used files.
///
/// Files never touched again leave in admission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixedRecency {
  list: LruList<String>,
}

impl FixedRecency {
  pub fn new() -> Self {
    Self {
      list: LruList::new(),
    }
  }

  /// Total size of the tracked files.
  pub fn tracked_bytes(&self) -> u64 {
    self.list.current_total_size()
  }
}

impl CachePolicy for FixedRecency {
  /// A hit makes the file the most recently used.
  fn on_access(&mut self, request: &Request<'_>, _state: &CacheState) {
    if request.hit {
      self.list.move_to_front(request.filename);
    }
  }

  /// Admits the file, evicting least recently used files until it fits.
  fn on_admit(&mut self, request: &Request<'_>, state: &CacheState) -> AdmissionDecision {
    if request.size > state.max_capacity() {
      return AdmissionDecision::Reject(RejectReason::Oversized);
    }

    let mut free = state.free_space();
    let mut victims = Vec::new();
    while free < request.size {
      match self.list.pop_back() {
        Some((victim, size)) => {
          trace!(victim = %victim, size, "lru victim");
          free += size;
          victims.push(victim);
        }
        None => break,
      }
    }

    self.list.push_front(request.filename.to_string(), request.size);

    if victims.is_empty() {
      AdmissionDecision::Admit
    } else {
      AdmissionDecision::AdmitAndEvict(victims)
    }
  }

  fn on_remove(&mut self, filename: &str) {
    self.list.remove(filename);
  }

  fn evict(&mut self, bytes_to_free: u64) -> (Vec<String>, u64) {
    let mut victims = Vec::new();
    let mut freed = 0;

    while freed < bytes_to_free {
      match self.list.pop_back() {
        Some((victim, size)) => {
          freed += size;
          victims.push(victim);
        }
        None => break,
      }
    }

    (victims, freed)
  }

  fn eviction_order(&self) -> Vec<String> {
    self.list.iter_lru().map(|(name, _)| name.clone()).collect()
  }

  fn tracks(&self, filename: &str) -> bool {
    self.list.contains(filename)
  }

  fn tracked_len(&self) -> usize {
    self.list.len()
  }

  fn clear(&mut self) {
    self.list.clear();
  }
}
