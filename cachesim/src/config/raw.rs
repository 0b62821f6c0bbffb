use serde::Deserialize;

// --- Top Level Config ---
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfigRaw {
  #[serde(default = "default_name")]
  pub name: String,
  /// Bytes, or a string with a unit such as "100TB" or "512MiB".
  pub capacity: CapacityRaw,
  #[serde(default)]
  pub policy: PolicyConfigRaw,
  #[serde(default)]
  pub window: WindowConfigRaw,
  #[serde(default)]
  pub rollover: RolloverRaw,
  #[serde(default)]
  pub purge: Option<PurgeRaw>,
  #[serde(default = "default_wall_time_penalty")]
  pub wall_time_penalty: f64,
}

fn default_name() -> String {
  "simulation".to_string()
}

fn default_wall_time_penalty() -> f64 {
  crate::metrics::DEFAULT_WALL_TIME_PENALTY
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CapacityRaw {
  Bytes(u64),
  Text(String),
}

// --- Policy Config ---
#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)] // "kind" determines the enum variant
pub enum PolicyConfigRaw {
  #[default]
  FixedRecency,
  GroupWeightedCost(WeightedPolicyRaw),
  WatermarkedGroupWeightedCost(WatermarkedPolicyRaw),
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WeightedPolicyRaw {
  #[serde(default = "default_exponent")]
  pub exponent: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WatermarkedPolicyRaw {
  #[serde(default = "default_exponent")]
  pub exponent: f64,
  #[serde(default = "default_high_watermark")]
  pub high_watermark: f64,
  #[serde(default = "default_low_watermark")]
  pub low_watermark: f64,
  #[serde(default = "default_percentile")]
  pub percentile: f64,
  #[serde(default = "default_threshold_window")]
  pub threshold_window: usize,
}

fn default_exponent() -> f64 {
  crate::policy::DEFAULT_EXPONENT
}

fn default_high_watermark() -> f64 {
  95.0
}

fn default_low_watermark() -> f64 {
  75.0
}

fn default_percentile() -> f64 {
  crate::policy::DEFAULT_PERCENTILE
}

fn default_threshold_window() -> usize {
  crate::policy::DEFAULT_THRESHOLD_WINDOW
}

// --- Windowing ---
#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum WindowConfigRaw {
  #[default]
  Day,
  Requests { count: u64 },
  Manual,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RolloverRaw {
  #[serde(default)]
  pub clear_cache: bool,
  #[serde(default)]
  pub clear_ledger: bool,
  #[serde(default)]
  pub reset_weights: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PurgeRaw {
  #[serde(default = "default_purge_every")]
  pub every_windows: u64,
  #[serde(default = "default_recency_threshold")]
  pub recency_threshold: u64,
}

fn default_purge_every() -> u64 {
  7
}

fn default_recency_threshold() -> u64 {
  210_000
}
