#![allow(dead_code)]

use fibre_cachesim::policy::{PolicyConfig, WatermarkSettings, Watermarks, WeightedSettings};
use fibre_cachesim::window::Windowing;
use fibre_cachesim::{RawRecord, SimulationBuilder, SimulationDriver};

use rand::prelude::*;
use rand_distr::Distribution;
use rand_pcg::Pcg64;

pub const DAY: i64 = 86_400;
// 2017-01-01T00:00:00Z
pub const DAY_ONE: i64 = 1_483_228_800;

pub fn rec(filename: &str, size: u64) -> RawRecord {
  RawRecord::new(filename, size)
}

/// A record in an explicit group.
pub fn grec(filename: &str, group: &str, size: u64) -> RawRecord {
  RawRecord::new(filename, size).group(group)
}

pub fn weighted(exponent: f64) -> PolicyConfig {
  PolicyConfig::GroupWeightedCost(WeightedSettings { exponent })
}

pub fn watermarked(high: f64, low: f64, percentile: f64) -> PolicyConfig {
  PolicyConfig::WatermarkedGroupWeightedCost(WatermarkSettings {
    exponent: 1.0,
    watermarks: Watermarks::new(high, low),
    percentile,
    ..Default::default()
  })
}

// Helper to build a manually windowed driver for testing purposes.
pub fn build_driver(policy: PolicyConfig, capacity: u64) -> SimulationDriver {
  SimulationBuilder::new()
    .name("test")
    .capacity(capacity)
    .policy(policy)
    .windowing(Windowing::Manual)
    .build()
    .unwrap()
}

/// Feeds `records` through the driver and returns the hit flag of each.
pub fn classify(driver: &mut SimulationDriver, records: &[RawRecord]) -> Vec<bool> {
  records
    .iter()
    .cloned()
    .map(|record| driver.process_record(record).unwrap().hit)
    .collect()
}

pub fn resident_names(driver: &SimulationDriver) -> Vec<String> {
  let mut names: Vec<String> = driver
    .state()
    .residents()
    .map(|(name, _)| name.to_string())
    .collect();
  names.sort();
  names
}

/// A reproducible trace with Zipf-distributed popularity over `files` files
/// spread across `groups` groups, spanning `days` days.
pub fn synthetic_trace(seed: u64, len: usize, files: u64, groups: u64, days: i64) -> Vec<RawRecord> {
  let mut rng = Pcg64::seed_from_u64(seed);
  let zipf = rand_distr::Zipf::new(files as f64, 1.01).unwrap();
  let per_day = (len as i64 / days.max(1)).max(1);

  (0..len)
    .map(|i| {
      let file = zipf.sample(&mut rng) as u64;
      let group = file % groups;
      let size = 1 + (file * 7919) % 1000;
      let day = DAY_ONE + (i as i64 / per_day) * DAY + rng.random_range(0..3600);
      RawRecord::new(format!("/store/mc/C{}/P{}/AOD/f{}.root", group, group, file), size)
        .day(day)
        .category((file % 2) as u32)
        .timing(rng.random_range(1.0..10.0), rng.random_range(10.0..20.0))
    })
    .collect()
}
