use fibre_cachesim::{MemorySink, RawRecord, SimulationConfig, SimulationDriver};

const CONFIG: &str = r#"
name: resumable
capacity: 1GiB
policy:
  kind: group_weighted_cost
  exponent: 2.0
window:
  kind: requests
  count: 4
purge:
  every_windows: 2
  recency_threshold: 100
"#;

fn main() {
  let config = SimulationConfig::from_yaml_str(CONFIG).expect("Invalid configuration");
  let trace: Vec<RawRecord> = (0..12)
    .map(|i| RawRecord::new(format!("/store/user/alice/ntuple_{}.root", i % 5), 300 << 20))
    .collect();

  let mut driver = SimulationDriver::new(config).expect("Failed to build simulation");
  let mut sink = MemorySink::new();
  for record in &trace[..6] {
    let outcome = driver.process_record(record.clone()).expect("Malformed record");
    println!("#{} hit={} evicted={:?}", outcome.index, outcome.hit, outcome.evicted);
  }

  // Persist between windows, then pick up where we left off.
  let blob = driver.snapshot().expect("Snapshot failed");
  println!("\nSnapshot is {} bytes after {} records.\n", blob.len(), driver.records_processed());
  let mut resumed = SimulationDriver::restore(&blob).expect("Restore failed");

  let summary = resumed
    .run(trace[6..].iter().cloned(), &mut sink)
    .expect("Simulation failed");
  for report in &sink.reports {
    println!("{:?}", report);
  }
  println!("\n{:#?}", summary);
}
