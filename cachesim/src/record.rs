use crate::error::RecordError;

use serde::{Deserialize, Serialize};

/// A single trace row as delivered by a record source.
///
/// Every field is optional at this stage so that malformed rows can be
/// reported instead of failing deserialization of a whole trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
  #[serde(default)]
  pub filename: Option<String>,
  /// Size in bytes.
  #[serde(default)]
  pub size: Option<u64>,
  /// Explicit group label. Derived from the filename when absent.
  #[serde(default)]
  pub group: Option<String>,
  /// Request time in unix seconds.
  #[serde(default)]
  pub day: Option<i64>,
  /// Data category tag, e.g. 0 for simulated data and 1 for real data.
  #[serde(default)]
  pub category: u32,
  #[serde(default)]
  pub cpu_time: Option<f64>,
  #[serde(default)]
  pub wall_time: Option<f64>,
}

impl RawRecord {
  pub fn new(filename: impl Into<String>, size: u64) -> Self {
    Self {
      filename: Some(filename.into()),
      size: Some(size),
      ..Default::default()
    }
  }

  pub fn group(mut self, group: impl Into<String>) -> Self {
    self.group = Some(group.into());
    self
  }

  pub fn day(mut self, unix_secs: i64) -> Self {
    self.day = Some(unix_secs);
    self
  }

  pub fn category(mut self, category: u32) -> Self {
    self.category = category;
    self
  }

  /// Attaches the job's CPU and wall time, used for the efficiency columns.
  pub fn timing(mut self, cpu_time: f64, wall_time: f64) -> Self {
    self.cpu_time = Some(cpu_time);
    self.wall_time = Some(wall_time);
    self
  }

  /// Validates the row and stamps it with its position in the trace.
  pub fn into_record(self, index: u64) -> Result<FileRecord, RecordError> {
    let filename = match self.filename {
      Some(name) if !name.is_empty() => name,
      _ => return Err(RecordError::MissingFilename),
    };
    let size = match self.size {
      Some(0) => return Err(RecordError::ZeroSize(filename)),
      Some(size) => size,
      None => return Err(RecordError::MissingSize(filename)),
    };
    let group = match self.group {
      Some(group) if !group.is_empty() => group,
      _ => group_of(&filename),
    };

    Ok(FileRecord {
      filename,
      size,
      group,
      index,
      day: self.day,
      category: self.category,
      cpu_time: self.cpu_time,
      wall_time: self.wall_time,
    })
  }
}

/// A validated trace record.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
  pub filename: String,
  pub size: u64,
  pub group: String,
  /// Monotonically increasing request index within the run.
  pub index: u64,
  pub day: Option<i64>,
  pub category: u32,
  pub cpu_time: Option<f64>,
  pub wall_time: Option<f64>,
}

/// Derives the logical group of a file from its path.
///
/// Paths shaped like `/store/<type>/<campaign>/<process>/<tier>/...` map to
/// `/<type>/<campaign>/<process>/<tier>/`. Shorter paths fall back to their
/// parent directory, and bare names form a group of their own.
pub fn group_of(filename: &str) -> String {
  let parts: Vec<&str> = filename.split('/').filter(|part| !part.is_empty()).collect();
  if parts.len() >= 6 {
    return format!("/{}/{}/{}/{}/", parts[1], parts[2], parts[3], parts[4]);
  }

  match filename.rfind('/') {
    Some(pos) if pos > 0 => filename[..=pos].to_string(),
    _ => filename.to_string(),
  }
}
