use crate::config::SimulationConfig;
use crate::error::{BuildError, RecordError, Result, SnapshotError};
use crate::metrics::{to_mb, RunSummary, WindowReport};
use crate::oracle::{DecisionOracle, FeatureVector, OracleAction, Phase};
use crate::policy::{AdmissionDecision, CachePolicy, Policy, RejectReason, Request};
use crate::record::{FileRecord, RawRecord};
use crate::sink::WindowSink;
use crate::snapshot::{self, SnapshotBody, SnapshotBodyRef};
use crate::state::{AccessCost, CacheState};
use crate::stats::{FileStats, StatsLedger};
use crate::window::WindowTracker;

use std::fmt;

use futures_util::stream::{Stream, StreamExt};
use futures_util::pin_mut;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// How far a run has progressed through its trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Progress {
  pub(crate) next_index: u64,
  pub(crate) processed: u64,
  pub(crate) rejected: u64,
  pub(crate) windows_flushed: u64,
  pub(crate) tracker: WindowTracker,
}

/// What happened while processing one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
  pub index: u64,
  /// The file was resident before the record was processed.
  pub hit: bool,
  pub admitted: bool,
  /// Files evicted to make room for this one.
  pub evicted: Vec<String>,
  pub rejection: Option<RejectReason>,
  /// Files evicted by a watermark sweep after this record.
  pub swept: Vec<String>,
  /// Report of the window this record closed, if any.
  pub flushed: Option<WindowReport>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ResidentMeans {
  recency: f64,
  frequency: f64,
  size: f64,
}

/// Replays a trace against one simulated cache.
///
/// Records are processed strictly in order. Each record ages the ledger, is
/// classified as a hit or a miss, goes through the policy (and the decision
/// oracle, if one is attached), and updates the counters of the current
/// window. Windows are flushed as reports when the trace crosses a window
/// boundary.
pub struct SimulationDriver {
  config: SimulationConfig,
  policy: Policy,
  state: CacheState,
  ledger: StatsLedger,
  progress: Progress,
  oracle: Option<Box<dyn DecisionOracle>>,
}

impl fmt::Debug for SimulationDriver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SimulationDriver")
      .field("name", &self.config.name)
      .field("policy", &self.policy.name())
      .field("capacity", &self.state.max_capacity())
      .field("resident_bytes", &self.state.size())
      .field("records_processed", &self.progress.processed)
      .field("has_oracle", &self.oracle.is_some())
      .finish_non_exhaustive()
  }
}

impl SimulationDriver {
  pub fn new(config: SimulationConfig) -> Result<Self, BuildError> {
    config.validate()?;
    let policy = config.policy.build();
    let state = CacheState::new(config.capacity);
    Ok(Self {
      config,
      policy,
      state,
      ledger: StatsLedger::new(),
      progress: Progress::default(),
      oracle: None,
    })
  }

  pub fn with_oracle<O>(mut self, oracle: O) -> Self
  where
    O: DecisionOracle + 'static,
  {
    self.oracle = Some(Box::new(oracle));
    self
  }

  pub fn set_oracle(&mut self, oracle: Option<Box<dyn DecisionOracle>>) {
    self.oracle = oracle;
  }

  pub fn config(&self) -> &SimulationConfig {
    &self.config
  }

  pub fn name(&self) -> &str {
    &self.config.name
  }

  pub fn policy(&self) -> &Policy {
    &self.policy
  }

  pub fn state(&self) -> &CacheState {
    &self.state
  }

  pub fn ledger(&self) -> &StatsLedger {
    &self.ledger
  }

  pub fn records_processed(&self) -> u64 {
    self.progress.processed
  }

  /// Malformed records skipped so far.
  pub fn records_rejected(&self) -> u64 {
    self.progress.rejected
  }

  pub fn windows_flushed(&self) -> u64 {
    self.progress.windows_flushed
  }

  /// Processes one record.
  ///
  /// A malformed record is counted, logged and returned as an error without
  /// touching any simulation state.
  pub fn process_record(&mut self, raw: RawRecord) -> Result<RecordOutcome, RecordError> {
    let record = match raw.into_record(self.progress.next_index) {
      Ok(record) => record,
      Err(error) => {
        self.progress.rejected += 1;
        warn!(run = %self.config.name, %error, "skipping malformed record");
        return Err(error);
      }
    };

    let flushed = if self
      .progress
      .tracker
      .crosses(self.config.windowing, record.day)
    {
      Some(self.close_window())
    } else {
      None
    };
    self.progress.tracker.observe(record.day);
    self.progress.next_index += 1;
    self.progress.processed += 1;
    self.ledger.advance();

    let hit = self.state.contains(&record.filename);
    let (stats, since_last) = self.ledger.update(
      &record.filename,
      record.size,
      record.index,
      record.category,
      hit,
    );
    self.state.record_access(
      &stats,
      hit,
      AccessCost {
        cpu_time: record.cpu_time,
        wall_time: record.wall_time,
      },
    );

    let request = Request {
      filename: &record.filename,
      size: record.size,
      group: &record.group,
      hit,
      index: record.index,
    };

    let decision = if hit || self.oracle.is_none() {
      self.policy.decide(&request, &self.state)
    } else {
      self.policy.on_access(&request, &self.state);
      let features = self.features(&stats, since_last, self.resident_means());
      match self.consult(Phase::Admission, &features) {
        Some(OracleAction::Skip) => AdmissionDecision::Reject(RejectReason::Declined),
        _ => self.policy.on_admit(&request, &self.state),
      }
    };

    if hit {
      self.state.touch(&record.filename, record.index);
    }

    let mut outcome = RecordOutcome {
      index: record.index,
      hit,
      admitted: false,
      evicted: Vec::new(),
      rejection: None,
      swept: Vec::new(),
      flushed,
    };
    self.apply(&record, decision, &mut outcome);
    trace!(
      index = record.index,
      filename = %record.filename,
      size = record.size,
      hit,
      admitted = outcome.admitted,
      "record processed"
    );

    self.enforce_watermarks(&record.filename, &mut outcome);
    Ok(outcome)
  }

  fn apply(&mut self, record: &FileRecord, decision: AdmissionDecision, outcome: &mut RecordOutcome) {
    match decision {
      AdmissionDecision::NoOp => {}
      AdmissionDecision::Admit => self.admit(record, outcome),
      AdmissionDecision::AdmitAndEvict(victims) => {
        for victim in victims {
          if let Some(freed) = self.state.evict(&victim) {
            debug!(victim = %victim, freed, "evicted to make room");
          }
          outcome.evicted.push(victim);
        }
        self.admit(record, outcome);
      }
      AdmissionDecision::Reject(reason) => {
        debug!(filename = %record.filename, size = record.size, ?reason, "admission rejected");
        outcome.rejection = Some(reason);
      }
    }
  }

  fn admit(&mut self, record: &FileRecord, outcome: &mut RecordOutcome) {
    if self.state.admit(&record.filename, record.size, record.index) {
      outcome.admitted = true;
    } else {
      // Keep the policy in step with the resident set.
      warn!(filename = %record.filename, size = record.size, "policy admitted a file that does not fit");
      self.policy.on_remove(&record.filename);
    }
  }

  /// Runs an eviction cycle when occupancy is above the high watermark.
  ///
  /// Without an oracle, residents are evicted worst-first until occupancy
  /// drops below the low watermark. With an oracle, every resident is offered
  /// for eviction in the same order until the low watermark is reached or
  /// all of them have been visited. The file of the current record is never
  /// swept, so an admitted file is still resident when the record completes.
  fn enforce_watermarks(&mut self, current: &str, outcome: &mut RecordOutcome) {
    let Some(marks) = self.policy.watermarks() else {
      return;
    };
    let before = self.state.occupancy();
    if before <= marks.high {
      return;
    }

    if self.oracle.is_some() {
      let means = self.resident_means();
      for victim in self.policy.eviction_order() {
        if self.state.occupancy() < marks.low {
          break;
        }
        if victim == current {
          continue;
        }
        let action = match self.ledger.get(&victim).copied() {
          Some(stats) => {
            let since_last = outcome.index.saturating_sub(stats.last_request_index);
            let features = self.features(&stats, since_last, means);
            self.consult(Phase::Eviction, &features)
          }
          None => None,
        };
        if action != Some(OracleAction::Skip) {
          self.policy.on_remove(&victim);
          self.state.evict(&victim);
          outcome.swept.push(victim);
        }
      }
    } else {
      for victim in self.policy.eviction_order() {
        if self.state.occupancy() < marks.low {
          break;
        }
        if victim == current {
          continue;
        }
        self.policy.on_remove(&victim);
        self.state.evict(&victim);
        outcome.swept.push(victim);
      }
    }

    debug!(
      run = %self.config.name,
      before,
      after = self.state.occupancy(),
      swept = outcome.swept.len(),
      "watermark sweep"
    );
  }

  fn consult(&mut self, phase: Phase, features: &FeatureVector) -> Option<OracleAction> {
    let oracle = self.oracle.as_mut()?;
    match oracle.decide(phase, features) {
      Ok(action) => Some(action),
      Err(error) => {
        warn!(?phase, %error, "decision oracle failed, falling back to the policy");
        None
      }
    }
  }

  fn resident_means(&self) -> ResidentMeans {
    let count = self.state.len();
    if count == 0 {
      return ResidentMeans::default();
    }

    let clock = self.ledger.clock();
    let mut means = ResidentMeans::default();
    for (name, entry) in self.state.residents() {
      if let Some(stats) = self.ledger.get(name) {
        means.recency += stats.recency(clock) as f64;
        means.frequency += stats.requests() as f64;
      }
      means.size += to_mb(entry.size);
    }

    let count = count as f64;
    ResidentMeans {
      recency: means.recency / count,
      frequency: means.frequency / count,
      size: means.size / count,
    }
  }

  fn features(&self, stats: &FileStats, since_last: u64, means: ResidentMeans) -> FeatureVector {
    FeatureVector {
      size: to_mb(stats.size),
      total_requests: stats.requests() as f64,
      recency_delta: since_last as f64,
      category: if stats.category == 0 { 0.0 } else { 1.0 },
      mean_recency: means.recency,
      mean_frequency: means.frequency,
      mean_size: means.size,
    }
  }

  fn close_window(&mut self) -> WindowReport {
    let window = self.progress.windows_flushed;
    let report = WindowReport::from_counters(
      window,
      self.progress.tracker.label(window),
      self.state.size(),
      self.state.window(),
      self.config.wall_time_penalty,
    );
    info!(
      run = %self.config.name,
      window,
      date = %report.date,
      hit_rate = report.hit_rate,
      "window flushed"
    );

    self.state.reset_window();
    self.progress.windows_flushed += 1;
    self.progress.tracker.reset();

    let rollover = self.config.rollover;
    if rollover.clear_cache {
      self.state.clear();
      self.policy.clear();
    }
    if rollover.clear_ledger {
      let state = &self.state;
      let dropped = self.ledger.retain(|name| state.contains(name));
      debug!(run = %self.config.name, dropped, "ledger cleared");
    }
    if rollover.reset_weights {
      self.policy.reset_weights();
    }
    if let Some(purge) = self.config.purge {
      if self.progress.windows_flushed % purge.every_windows == 0 {
        self.purge(purge.recency_threshold);
      }
    }

    report
  }

  /// Closes the current window and returns its report. Returns `None` if no
  /// record was processed since the last window closed.
  pub fn end_window(&mut self) -> Option<WindowReport> {
    if self.progress.tracker.is_empty() {
      return None;
    }
    Some(self.close_window())
  }

  /// Flushes the trailing partial window at the end of a trace.
  pub fn finish(&mut self) -> Option<WindowReport> {
    self.end_window()
  }

  /// Drops ledger entries idle for more than `recency_threshold` records.
  /// Resident files are always kept. Call this between windows only.
  pub fn purge(&mut self, recency_threshold: u64) -> usize {
    let state = &self.state;
    let removed = self
      .ledger
      .purge_where(recency_threshold, |name| state.contains(name));
    info!(
      run = %self.config.name,
      removed,
      remaining = self.ledger.len(),
      "ledger purged"
    );
    removed
  }

  pub fn summary(&self) -> RunSummary {
    RunSummary::new(
      &self.config.name,
      self.progress.processed,
      self.progress.rejected,
      self.progress.windows_flushed,
      self.state.totals(),
    )
  }

  fn step<S>(&mut self, raw: RawRecord, sink: &mut S) -> Result<()>
  where
    S: WindowSink + ?Sized,
  {
    // Malformed records were already counted and logged.
    if let Ok(outcome) = self.process_record(raw) {
      if let Some(report) = outcome.flushed {
        sink.write_report(&self.config.name, &report)?;
      }
    }
    Ok(())
  }

  fn complete<S>(&mut self, sink: &mut S) -> Result<RunSummary>
  where
    S: WindowSink + ?Sized,
  {
    if let Some(report) = self.finish() {
      sink.write_report(&self.config.name, &report)?;
    }
    sink.finish()?;

    let summary = self.summary();
    info!(
      run = %summary.name,
      records = summary.records_processed,
      rejected = summary.records_rejected,
      windows = summary.windows_flushed,
      hit_ratio = summary.hit_ratio,
      "run finished"
    );
    Ok(summary)
  }

  /// Replays `records`, writing each window report to `sink`, and flushes
  /// the final window at the end.
  pub fn run<I, S>(&mut self, records: I, sink: &mut S) -> Result<RunSummary>
  where
    I: IntoIterator<Item = RawRecord>,
    S: WindowSink + ?Sized,
  {
    for raw in records {
      self.step(raw, sink)?;
    }
    self.complete(sink)
  }

  /// Like [`run`](Self::run), for records that arrive asynchronously.
  pub async fn run_stream<St, S>(&mut self, records: St, sink: &mut S) -> Result<RunSummary>
  where
    St: Stream<Item = RawRecord>,
    S: WindowSink + ?Sized,
  {
    pin_mut!(records);
    while let Some(raw) = records.next().await {
      self.step(raw, sink)?;
    }
    self.complete(sink)
  }

  /// Serializes the complete simulation state into an opaque blob.
  ///
  /// The decision oracle is not part of the snapshot.
  pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
    snapshot::encode(&SnapshotBodyRef {
      config: &self.config,
      policy: &self.policy,
      state: &self.state,
      ledger: &self.ledger,
      progress: &self.progress,
    })
  }

  /// Rebuilds a driver from a blob written by [`snapshot`](Self::snapshot).
  ///
  /// The restored driver continues exactly where the snapshot was taken.
  pub fn restore(bytes: &[u8]) -> Result<Self, SnapshotError> {
    let SnapshotBody {
      config,
      mut policy,
      state,
      ledger,
      progress,
    } = snapshot::decode(bytes)?;
    policy.rebuild_indices();

    let driver = Self {
      config,
      policy,
      state,
      ledger,
      progress,
      oracle: None,
    };
    driver.check_consistency()?;
    Ok(driver)
  }

  fn check_consistency(&self) -> Result<(), SnapshotError> {
    self.config.validate()?;
    if self.state.max_capacity() != self.config.capacity {
      return Err(SnapshotError::Inconsistent(format!(
        "cache capacity {} differs from configured capacity {}",
        self.state.max_capacity(),
        self.config.capacity
      )));
    }
    if self.config.policy.build().name() != self.policy.name() {
      return Err(SnapshotError::Inconsistent(format!(
        "policy '{}' does not match the configured policy",
        self.policy.name()
      )));
    }
    self
      .state
      .check_consistency()
      .map_err(SnapshotError::Inconsistent)?;

    for (name, _) in self.state.residents() {
      if !self.ledger.contains(name) {
        return Err(SnapshotError::Inconsistent(format!(
          "resident '{}' has no ledger entry",
          name
        )));
      }
      if !self.policy.tracks(name) {
        return Err(SnapshotError::Inconsistent(format!(
          "resident '{}' is not tracked by the policy",
          name
        )));
      }
    }
    if self.policy.tracked_len() != self.state.len() {
      return Err(SnapshotError::Inconsistent(format!(
        "policy tracks {} files but {} are resident",
        self.policy.tracked_len(),
        self.state.len()
      )));
    }
    Ok(())
  }
}
