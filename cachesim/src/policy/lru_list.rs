use std::borrow::Borrow;
use std::hash::Hash;

use crate::FastMap;

use generational_arena::{Arena, Index};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub(crate) struct Node<K> {
  pub(crate) key: K,
  pub(crate) size: u64,
  pub(crate) next: Option<Index>,
  pub(crate) prev: Option<Index>,
}

// Serialized form of the list: keys with their sizes, least recent first.
#[derive(Serialize, Deserialize)]
pub(crate) struct LruOrder<K> {
  entries: Vec<(K, u64)>,
}

// A size-tracking LRU list over an arena of nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
  from = "LruOrder<K>",
  into = "LruOrder<K>",
  bound(serialize = "K: Serialize", deserialize = "K: Deserialize<'de>")
)]
pub(crate) struct LruList<K: Eq + Hash + Clone> {
  // Arena stores all nodes contiguously.
  pub(crate) nodes: Arena<Node<K>>,
  // O(1) lookup of a key to its node index in the arena.
  pub(crate) lookup: FastMap<K, Index>,
  // Head is the most-recently-used item.
  pub(crate) head: Option<Index>,
  // Tail is the least-recently-used item.
  pub(crate) tail: Option<Index>,
  // Total size of all items in the list.
  pub(crate) current_size: u64,
}

impl<K: Eq + Hash + Clone> Default for LruList<K> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K: Eq + Hash + Clone> LruList<K> {
  pub fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: FastMap::default(),
      head: None,
      tail: None,
      current_size: 0,
    }
  }

  // Unlinks a node without removing it from the arena or the lookup map.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_node_idx = node.prev;
    let next_node_idx = node.next;

    if let Some(prev_idx) = prev_node_idx {
      self.nodes[prev_idx].next = next_node_idx;
    } else {
      self.head = next_node_idx;
    }

    if let Some(next_idx) = next_node_idx {
      self.nodes[next_idx].prev = prev_node_idx;
    } else {
      self.tail = prev_node_idx;
    }
  }

  // Makes an arena node the new head.
  fn push_front_node(&mut self, index: Index) {
    let old_head_idx = self.head;
    self.nodes[index].next = old_head_idx;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head_idx {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  pub fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.lookup.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.lookup.len()
  }

  pub fn current_total_size(&self) -> u64 {
    self.current_size
  }

  pub fn push_front(&mut self, key: K, size: u64) {
    if let Some(&index) = self.lookup.get(&key) {
      let old_size = self.nodes[index].size;
      self.current_size = self.current_size.saturating_sub(old_size) + size;
      self.nodes[index].size = size;
      self.move_to_front(&key);
    } else {
      let new_node = Node {
        key: key.clone(),
        size,
        next: None,
        prev: None,
      };
      let index = self.nodes.insert(new_node);
      self.lookup.insert(key, index);
      self.current_size += size;
      self.push_front_node(index);
    }
  }

  pub fn move_to_front<Q>(&mut self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    if let Some(&index) = self.lookup.get(key) {
      if self.head != Some(index) {
        self.unlink(index);
        self.push_front_node(index);
      }
    }
  }

  pub fn pop_back(&mut self) -> Option<(K, u64)> {
    let tail_index = self.tail?;
    let key = self.nodes.get(tail_index)?.key.clone();
    let size = self.remove(&key)?;
    Some((key, size))
  }

  pub fn remove<Q>(&mut self, key: &Q) -> Option<u64>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    let node = self.nodes.remove(index)?;
    self.current_size = self.current_size.saturating_sub(node.size);
    Some(node.size)
  }

  /// Keys with their sizes, least recently used first.
  pub fn iter_lru(&self) -> LruIter<'_, K> {
    LruIter {
      list: self,
      current: self.tail,
    }
  }

  pub fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
    self.current_size = 0;
  }

  // Order of keys from head to tail.
  #[cfg(test)]
  pub(crate) fn keys_as_vec(&self) -> Vec<K> {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}

pub(crate) struct LruIter<'a, K: Eq + Hash + Clone> {
  list: &'a LruList<K>,
  current: Option<Index>,
}

impl<'a, K: Eq + Hash + Clone> Iterator for LruIter<'a, K> {
  type Item = (&'a K, u64);

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.list.nodes.get(self.current?)?;
    self.current = node.prev;
    Some((&node.key, node.size))
  }
}

impl<K: Eq + Hash + Clone> From<LruOrder<K>> for LruList<K> {
  fn from(order: LruOrder<K>) -> Self {
    let mut list = LruList::new();
    for (key, size) in order.entries {
      list.push_front(key, size);
    }
    list
  }
}

impl<K: Eq + Hash + Clone> From<LruList<K>> for LruOrder<K> {
  fn from(list: LruList<K>) -> Self {
    let entries = list
      .iter_lru()
      .map(|(key, size)| (key.clone(), size))
      .collect();
    LruOrder { entries }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn new_list_is_empty() {
    let list = LruList::<i32>::new();
    assert!(list.keys_as_vec().is_empty(), "New list keys should be empty");
    assert!(
      list.lookup.is_empty(),
      "New list lookup map should be empty"
    );
    assert_eq!(list.current_total_size(), 0, "New list size should be zero");
    assert!(!list.contains(&123), "New list should not contain any key");
  }

  #[test]
  fn push_front_new_items() {
    let mut list = LruList::new();

    list.push_front(10, 5);
    assert!(list.contains(&10));
    assert_eq!(list.current_total_size(), 5);
    assert_eq!(list.keys_as_vec(), vec![10]);

    list.push_front(20, 2);
    assert_eq!(list.current_total_size(), 7, "Size should be 5 + 2");
    assert_eq!(list.len(), 2);
    assert_eq!(
      list.keys_as_vec(),
      vec![20, 10],
      "Newest item should be at the front"
    );
  }

  #[test]
  fn push_front_existing_item_updates_size() {
    let mut list = LruList::new();
    list.push_front(1, 10);
    list.push_front(2, 20);

    // New size = (30 - 10) + 5 = 25
    list.push_front(1, 5);
    assert_eq!(list.current_total_size(), 25, "Size should be updated");
    assert_eq!(list.keys_as_vec(), vec![1, 2], "Order should be updated");
  }

  #[test]
  fn move_to_front_reorders() {
    let mut list = LruList::new();
    list.push_front(1, 1);
    list.push_front(2, 1);
    list.push_front(3, 1);

    list.move_to_front(&1);
    assert_eq!(list.keys_as_vec(), vec![1, 3, 2]);
    list.move_to_front(&99);
    assert_eq!(list.keys_as_vec(), vec![1, 3, 2], "Unknown keys are ignored");
  }

  #[test]
  fn pop_back_evicts_least_recent() {
    let mut list = LruList::new();
    list.push_front(1, 1); // least recent
    list.push_front(2, 2);
    list.push_front(3, 3);

    assert_eq!(
      list.pop_back(),
      Some((1, 1)),
      "pop_back should return the LRU key and its size"
    );
    assert_eq!(list.current_total_size(), 5);
    assert!(!list.contains(&1));
    assert_eq!(list.keys_as_vec(), vec![3, 2]);

    list.pop_back();
    list.pop_back();
    assert_eq!(list.pop_back(), None, "pop_back on empty list returns None");
    assert_eq!(list.current_total_size(), 0);
  }

  #[test]
  fn remove_item_from_middle() {
    let mut list = LruList::new();
    list.push_front(1, 1);
    list.push_front(2, 2);
    list.push_front(3, 3);

    assert_eq!(list.remove(&2), Some(2));
    assert_eq!(list.remove(&99), None);
    assert_eq!(list.current_total_size(), 4, "Size should be 6 - 2");
    assert_eq!(list.keys_as_vec(), vec![3, 1]);
  }

  #[test]
  fn iter_lru_walks_tail_to_head() {
    let mut list = LruList::new();
    list.push_front("a", 1);
    list.push_front("b", 2);
    list.push_front("c", 3);
    list.move_to_front(&"a");

    let order: Vec<_> = list.iter_lru().map(|(k, size)| (*k, size)).collect();
    assert_eq!(order, vec![("b", 2), ("c", 3), ("a", 1)]);
  }

  #[test]
  fn order_survives_serialization() {
    let mut list = LruList::new();
    list.push_front("a".to_string(), 1);
    list.push_front("b".to_string(), 2);
    list.push_front("c".to_string(), 3);
    list.move_to_front(&"a".to_string());

    let bytes = bincode::serialize(&list).unwrap();
    let restored: LruList<String> = bincode::deserialize(&bytes).unwrap();

    assert_eq!(restored.keys_as_vec(), list.keys_as_vec());
    assert_eq!(restored.current_total_size(), 6);
  }

  #[test]
  fn clear_resets_list() {
    let mut list = LruList::new();
    list.push_front(1, 10);
    list.push_front(2, 20);

    list.clear();

    assert!(list.keys_as_vec().is_empty());
    assert!(list.lookup.is_empty());
    assert_eq!(list.current_total_size(), 0);
    assert!(!list.contains(&1));
  }
}
