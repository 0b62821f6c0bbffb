use thiserror::Error;

/// Errors that can occur when building a simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
  /// The simulated cache was configured with a capacity of zero bytes.
  #[error("simulated cache capacity cannot be zero")]
  ZeroCapacity,
  /// The weight exponent is negative or not a finite number.
  #[error("weight exponent must be finite and non-negative, got {0}")]
  InvalidExponent(f64),
  /// Watermarks must satisfy `0 <= low < high <= 100`.
  #[error("watermarks must satisfy 0 <= low < high <= 100, got high={high} low={low}")]
  InvalidWatermarks { high: f64, low: f64 },
  /// The admission threshold percentile lies outside `[0, 1]`.
  #[error("threshold percentile must lie in [0, 1], got {0}")]
  InvalidPercentile(f64),
  #[error("threshold window must hold at least one weight")]
  ZeroThresholdWindow,
  #[error("request-count windows must span at least one request")]
  ZeroWindowSize,
  #[error("purge cadence must be at least one window")]
  ZeroPurgeCadence,
  /// The wall-time penalty applied to misses must be finite and positive.
  #[error("wall-time penalty must be finite and positive, got {0}")]
  InvalidPenalty(f64),
}

/// Errors raised while locating, reading or validating a YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("configuration file not found: {0}")]
  NotFound(String),

  #[error("failed to read configuration file: {0}")]
  Read(#[from] std::io::Error),

  #[error("failed to parse configuration: {0}")]
  Parse(#[from] serde_yaml::Error),

  #[error("invalid configuration value for '{field}': {message}")]
  InvalidValue { field: String, message: String },

  #[error(transparent)]
  Build(#[from] BuildError),
}

/// A trace record that cannot be simulated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
  #[error("record has no filename")]
  MissingFilename,
  #[error("record for '{0}' has no size")]
  MissingSize(String),
  #[error("record for '{0}' has a size of zero")]
  ZeroSize(String),
}

/// Failures reported by a remote decision oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
  #[error("decision oracle is unavailable: {0}")]
  Unavailable(String),
  #[error("decision oracle returned an invalid response: {0}")]
  InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
  #[error("failed to write window report: {0}")]
  Io(#[from] std::io::Error),
}

/// Errors produced while writing or restoring a simulation snapshot.
///
/// Restoring never yields partially restored state: any of these errors
/// means nothing was built.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("failed to encode snapshot: {0}")]
  Encode(#[source] bincode::Error),

  #[error("failed to decode snapshot body: {0}")]
  Decode(#[source] bincode::Error),

  #[error("snapshot blob does not start with the expected header")]
  BadMagic,

  #[error("snapshot schema version {found} is not supported (expected {expected})")]
  SchemaMismatch { expected: u16, found: u16 },

  #[error("snapshot state is inconsistent: {0}")]
  Inconsistent(String),

  #[error("snapshot carries an invalid configuration: {0}")]
  Build(#[from] BuildError),
}

/// The main error type for `fibre_cachesim`.
#[derive(Debug, Error)]
pub enum SimError {
  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Record(#[from] RecordError),

  #[error(transparent)]
  Sink(#[from] SinkError),

  #[error(transparent)]
  Snapshot(#[from] SnapshotError),

  #[error("failed to start simulation worker pool: {0}")]
  Pool(String),
}

/// A specialized `Result` type for `fibre_cachesim` operations.
pub type Result<T, E = SimError> = std::result::Result<T, E>;
