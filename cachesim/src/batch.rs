use crate::config::SimulationConfig;
use crate::driver::SimulationDriver;
use crate::error::{Result, SimError};
use crate::metrics::RunSummary;
use crate::record::RawRecord;
use crate::sink::SharedSink;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::info;

/// Runs several independent simulations over the same trace in parallel.
///
/// Each configuration gets its own driver. Nothing is shared between runs
/// except the sink.
#[derive(Debug, Default, Clone)]
pub struct SimulationBatch {
  configs: Vec<SimulationConfig>,
  threads: Option<usize>,
}

impl SimulationBatch {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_config(mut self, config: SimulationConfig) -> Self {
    self.configs.push(config);
    self
  }

  /// Sets the number of worker threads. Defaults to the number of CPUs.
  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = Some(threads.max(1));
    self
  }

  pub fn len(&self) -> usize {
    self.configs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.configs.is_empty()
  }

  /// Replays `trace` once per configuration. Summaries come back in the
  /// order the configurations were added.
  pub fn run(&self, trace: &[RawRecord], sink: &SharedSink) -> Result<Vec<RunSummary>> {
    for config in &self.configs {
      config.validate()?;
    }

    let threads = self.threads.unwrap_or_else(num_cpus::get).max(1);
    let pool = ThreadPoolBuilder::new()
      .num_threads(threads)
      .thread_name(|i| format!("fibre-cachesim-{}", i))
      .build()
      .map_err(|e| SimError::Pool(e.to_string()))?;

    info!(runs = self.configs.len(), threads, records = trace.len(), "starting simulation batch");

    pool.install(|| {
      self
        .configs
        .par_iter()
        .map(|config| -> Result<RunSummary> {
          let mut driver = SimulationDriver::new(config.clone())?;
          let mut sink = sink.clone();
          driver.run(trace.iter().cloned(), &mut sink)
        })
        .collect()
    })
  }
}
