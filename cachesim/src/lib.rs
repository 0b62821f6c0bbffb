//! A trace-driven cache simulation engine for comparing admission and
//! eviction strategies offline.
//!
//! # Features
//! - **Policies**: plain LRU (`FixedRecency`), cost-weighted group policies
//!   (`GroupWeightedCost`) and a variant with an admission threshold and
//!   capacity watermarks (`WatermarkedGroupWeightedCost`).
//! - **Windowed reports**: per-day or per-N-request statistics with hit rate,
//!   traffic and CPU efficiency, written to pluggable sinks.
//! - **Decision oracle**: an optional external decision maker consulted on
//!   admissions and watermark sweeps.
//! - **Persistence**: snapshot and restore a run between windows.
//! - **Batches**: run many configurations over one trace in parallel
//!   (`bulk` feature).

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod driver;
pub mod error;
pub mod group;
pub mod metrics;
pub mod oracle;
pub mod policy;
pub mod record;
pub mod sink;
pub mod state;
pub mod stats;
pub mod window;

// Internal, crate-only modules
mod snapshot;

#[cfg(feature = "bulk")]
pub mod batch;

pub(crate) type FastMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
pub(crate) type FastSet<K> = std::collections::HashSet<K, ahash::RandomState>;

// Re-export the primary user-facing types for convenience
#[cfg(feature = "bulk")]
pub use batch::SimulationBatch;
pub use builder::SimulationBuilder;
pub use config::SimulationConfig;
pub use driver::{RecordOutcome, SimulationDriver};
pub use error::{Result, SimError};
pub use metrics::{RunSummary, WindowReport};
pub use oracle::{DecisionOracle, FeatureVector, OracleAction, Phase};
pub use policy::{AdmissionDecision, CachePolicy, Policy, PolicyConfig, RejectReason};
pub use record::RawRecord;
pub use sink::{DelimitedSink, MemorySink, SharedSink, WindowSink};
pub use snapshot::SCHEMA_VERSION;
