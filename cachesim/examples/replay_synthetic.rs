use fibre_cachesim::policy::{PolicyConfig, WatermarkSettings, Watermarks, WeightedSettings};
use fibre_cachesim::window::Windowing;
use fibre_cachesim::{DelimitedSink, RawRecord, SimulationBuilder};

use tracing_subscriber::EnvFilter;

const DAY_ONE: i64 = 1_483_228_800;

// A small hand-rolled trace: a handful of hot datasets re-read every day and
// a stream of one-off files competing for the same space.
fn build_trace() -> Vec<RawRecord> {
  let mut trace = Vec::new();
  for day in 0..3 {
    let day_start = DAY_ONE + day * 86_400;
    for round in 0..20 {
      let hot = round % 5;
      trace.push(
        RawRecord::new(format!("/store/data/Run2017/Hot/AOD/file{}.root", hot), 400 << 20)
          .day(day_start + round * 60)
          .category(1)
          .timing(30.0, 40.0),
      );
      trace.push(
        RawRecord::new(
          format!("/store/mc/Fall17/Cold{}/AODSIM/file{}.root", round, day),
          900 << 20,
        )
        .day(day_start + round * 60 + 30)
        .timing(10.0, 40.0),
      );
    }
  }
  trace
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let trace = build_trace();
  let policies = [
    PolicyConfig::FixedRecency,
    PolicyConfig::GroupWeightedCost(WeightedSettings::default()),
    PolicyConfig::WatermarkedGroupWeightedCost(WatermarkSettings {
      watermarks: Watermarks::new(90.0, 70.0),
      ..Default::default()
    }),
  ];

  for policy in policies {
    let mut driver = SimulationBuilder::new()
      .name(policy.build().name())
      .capacity(4 << 30)
      .policy(policy)
      .windowing(Windowing::Day)
      .build()
      .expect("Failed to build simulation");

    println!("\n== {} ==", driver.name());
    let mut sink = DelimitedSink::new(std::io::stdout());
    let summary = driver
      .run(trace.iter().cloned(), &mut sink)
      .expect("Simulation failed");
    println!("{:#?}", summary);
  }
}
