// cachesim/tests/watermark_policy.rs

mod common;

use common::*;
use fibre_cachesim::error::OracleError;
use fibre_cachesim::policy::{CachePolicy, Policy};
use fibre_cachesim::{FeatureVector, OracleAction, Phase, RejectReason};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn fill_ten_percent_files(driver: &mut fibre_cachesim::SimulationDriver, count: usize) {
  for i in 0..count {
    let name = format!("f{}", i);
    driver.process_record(grec(&name, &name, 100)).unwrap();
  }
}

#[test]
fn test_candidate_above_threshold_is_rejected() {
  let mut driver = build_driver(watermarked(95.0, 75.0, 0.5), 10_000);

  let first = driver.process_record(grec("a", "ga", 100)).unwrap();
  assert!(first.admitted, "No threshold before any weight is seen");

  let heavy = driver.process_record(grec("b", "gb", 300)).unwrap();
  assert!(!heavy.admitted);
  assert_eq!(heavy.rejection, Some(RejectReason::AboveThreshold));

  // The median of [100, 300] is 200.
  let light = driver.process_record(grec("c", "gc", 50)).unwrap();
  assert!(light.admitted);
  assert_eq!(resident_names(&driver), vec!["a", "c"]);

  match driver.policy() {
    Policy::WatermarkedGroupWeightedCost(policy) => {
      assert_eq!(policy.threshold(), Some(100.0));
    }
    other => panic!("unexpected policy {}", other.name()),
  }
}

#[test]
fn test_no_sweep_at_or_below_high_watermark() {
  let mut driver = build_driver(watermarked(80.0, 50.0, 1.0), 1000);
  fill_ten_percent_files(&mut driver, 8);

  assert_eq!(driver.state().occupancy(), 80.0);
  assert_eq!(driver.state().len(), 8);
}

#[test]
fn test_sweep_runs_down_below_low_watermark() {
  let mut driver = build_driver(watermarked(80.0, 50.0, 1.0), 1000);
  fill_ten_percent_files(&mut driver, 8);

  let outcome = driver.process_record(grec("f8", "f8", 100)).unwrap();
  assert!(outcome.admitted);
  assert_eq!(outcome.swept, vec!["f0", "f1", "f2", "f3", "f4"]);
  assert_eq!(driver.state().size(), 400);
  assert!(driver.state().occupancy() < 50.0);
  assert_eq!(driver.policy().tracked_len(), driver.state().len());
  assert_eq!(driver.state().window().deleted, 500);
}

#[test]
fn test_sweep_keeps_the_file_just_admitted() {
  let mut driver = build_driver(watermarked(80.0, 50.0, 1.0), 1000);
  driver.process_record(grec("h0", "h0", 150)).unwrap();
  fill_ten_percent_files(&mut driver, 6);
  assert_eq!(driver.state().size(), 750);

  // h1 ties with h0 as the heaviest resident, so it would be the second victim.
  let outcome = driver.process_record(grec("h1", "h1", 150)).unwrap();
  assert!(outcome.admitted);
  assert_eq!(outcome.swept, vec!["h0", "f0", "f1", "f2"]);
  assert!(driver.state().contains("h1"));
  assert_eq!(driver.state().size(), 450);
  assert_eq!(driver.state().window().deleted, 450);
}

#[test]
fn test_oracle_can_keep_every_resident() {
  let eviction_calls = Arc::new(AtomicUsize::new(0));
  let calls = eviction_calls.clone();
  let oracle = move |phase: Phase, _features: &FeatureVector| -> Result<OracleAction, OracleError> {
    match phase {
      Phase::Admission => Ok(OracleAction::Apply),
      Phase::Eviction => {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(OracleAction::Skip)
      }
    }
  };
  let mut driver = build_driver(watermarked(80.0, 50.0, 1.0), 1000).with_oracle(oracle);
  fill_ten_percent_files(&mut driver, 9);

  assert_eq!(driver.state().len(), 9);
  assert_eq!(driver.state().size(), 900);
  assert_eq!(
    eviction_calls.load(Ordering::SeqCst),
    8,
    "Every resident but the file just admitted is offered once"
  );
}

#[test]
fn test_oracle_failure_during_sweep_falls_back_to_eviction() {
  let oracle = |phase: Phase, _features: &FeatureVector| -> Result<OracleAction, OracleError> {
    match phase {
      Phase::Admission => Ok(OracleAction::Apply),
      Phase::Eviction => Err(OracleError::Unavailable("model offline".into())),
    }
  };
  let mut driver = build_driver(watermarked(80.0, 50.0, 1.0), 1000).with_oracle(oracle);
  fill_ten_percent_files(&mut driver, 8);

  let outcome = driver.process_record(grec("f8", "f8", 100)).unwrap();
  assert_eq!(outcome.swept.len(), 5);
  assert_eq!(driver.state().size(), 400);
}

#[test]
fn test_oracle_picks_which_residents_leave() {
  // Keep even-numbered files, let odd ones go.
  let oracle = |phase: Phase, features: &FeatureVector| -> Result<OracleAction, OracleError> {
    match phase {
      Phase::Admission => Ok(OracleAction::Apply),
      Phase::Eviction if features.category == 1.0 => Ok(OracleAction::Apply),
      Phase::Eviction => Ok(OracleAction::Skip),
    }
  };
  let mut driver = build_driver(watermarked(80.0, 50.0, 1.0), 1000).with_oracle(oracle);
  for i in 0..9 {
    let name = format!("f{}", i);
    driver
      .process_record(grec(&name, &name, 100).category((i % 2) as u32))
      .unwrap();
  }

  assert_eq!(
    resident_names(&driver),
    vec!["f0", "f2", "f4", "f6", "f8"],
    "Odd files were released until the sweep ran out of candidates"
  );
}
