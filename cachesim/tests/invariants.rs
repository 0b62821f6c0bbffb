// cachesim/tests/invariants.rs

mod common;

use common::*;
use fibre_cachesim::policy::{CachePolicy, PolicyConfig};
use fibre_cachesim::window::Windowing;
use fibre_cachesim::{SimulationBuilder, SimulationDriver};

fn check(driver: &SimulationDriver) {
  let state = driver.state();
  assert!(state.size() <= state.max_capacity(), "capacity exceeded");

  let sum: u64 = state.residents().map(|(_, entry)| entry.size).sum();
  assert_eq!(sum, state.size(), "resident sizes drifted");

  assert_eq!(driver.policy().tracked_len(), state.len());
  for (name, _) in state.residents() {
    assert!(driver.ledger().contains(name), "{} has no ledger entry", name);
    assert!(driver.policy().tracks(name), "{} is not tracked", name);
  }
}

fn stress(policy: PolicyConfig, seed: u64) {
  let trace = synthetic_trace(seed, 4_000, 600, 20, 8);
  let mut driver = SimulationBuilder::new()
    .capacity(60_000)
    .policy(policy)
    .windowing(Windowing::Day)
    .purge(1, 300)
    .reset_weights_on_rollover(seed % 2 == 0)
    .build()
    .unwrap();

  for record in trace {
    let filename = record.filename.clone().unwrap();
    let was_resident = driver.state().contains(&filename);
    let outcome = driver.process_record(record).unwrap();

    assert_eq!(outcome.hit, was_resident);
    assert!(!outcome.swept.contains(&filename), "{} swept by its own record", filename);
    if outcome.admitted {
      assert!(!outcome.hit);
      assert!(driver.state().contains(&filename));
    }
    if outcome.rejection.is_some() {
      assert!(!outcome.admitted);
      assert!(outcome.evicted.is_empty());
    }
    check(&driver);
  }
}

#[test]
fn test_fixed_recency_invariants() {
  for seed in 0..3 {
    stress(PolicyConfig::FixedRecency, seed);
  }
}

#[test]
fn test_group_weighted_cost_invariants() {
  for seed in 0..3 {
    stress(weighted(2.0), seed);
  }
}

#[test]
fn test_watermarked_invariants() {
  for seed in 0..3 {
    stress(watermarked(95.0, 75.0, 0.5), seed);
  }
}

#[test]
fn test_watermark_sweeps_leave_cache_below_high_mark() {
  let trace = synthetic_trace(11, 3_000, 500, 10, 3);
  let mut driver = build_driver(watermarked(80.0, 40.0, 1.0), 30_000);

  for record in trace {
    driver.process_record(record).unwrap();
    assert!(driver.state().occupancy() <= 80.0);
  }
}
