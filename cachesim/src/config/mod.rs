// YAML configuration: raw structs mirror the file, processed ones are validated.

pub mod processed;
pub mod raw;

pub use processed::{process_raw_config, PurgeSchedule, Rollover, SimulationConfig};

use crate::error::ConfigError;

use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::debug;

const DEFAULT_CONFIG_BASE_NAME: &str = "fibre_cachesim";
const DEFAULT_CONFIG_EXTENSION: &str = "yaml";

impl SimulationConfig {
  /// Parses and validates a YAML document.
  pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
    let raw: raw::SimulationConfigRaw = serde_yaml::from_str(yaml)?;
    process_raw_config(raw)
  }

  /// Reads, parses and validates a YAML file.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    debug!(path = %path.display(), "loading simulation config");
    let reader = BufReader::new(File::open(path)?);
    let raw: raw::SimulationConfigRaw = serde_yaml::from_reader(reader)?;
    process_raw_config(raw)
  }
}

/// Finds a configuration file in `dir`, trying `fibre_cachesim.<env>.yaml`
/// before `fibre_cachesim.yaml`.
///
/// The environment comes from `environment_suffix`, then `FIBRE_ENV`, then
/// `APP_ENV`.
pub fn find_config_file(dir: &Path, environment_suffix: Option<&str>) -> Result<PathBuf, ConfigError> {
  let env_from_var = environment_suffix
    .map(|s| s.to_string())
    .or_else(|| env::var("FIBRE_ENV").ok())
    .or_else(|| env::var("APP_ENV").ok());

  let mut files_to_check: Vec<String> = Vec::new();
  if let Some(env_str) = &env_from_var {
    if !env_str.is_empty() {
      files_to_check.push(format!(
        "{}.{}.{}",
        DEFAULT_CONFIG_BASE_NAME, env_str, DEFAULT_CONFIG_EXTENSION
      ));
    }
  }
  files_to_check.push(format!(
    "{}.{}",
    DEFAULT_CONFIG_BASE_NAME, DEFAULT_CONFIG_EXTENSION
  ));

  for file_name in &files_to_check {
    let path = dir.join(file_name);
    if path.is_file() {
      return Ok(path);
    }
  }

  Err(ConfigError::NotFound(format!(
    "Searched for: {:?} in {:?}. Provide a config file or check FIBRE_ENV/APP_ENV.",
    files_to_check, dir
  )))
}
