//! Snapshot blobs: a fixed header followed by a bincode body.
//!
//! The header is the magic `FCSIM` plus a little-endian schema version.
//! Blobs written by a different schema version are refused rather than
//! migrated.

use crate::config::SimulationConfig;
use crate::driver::Progress;
use crate::error::SnapshotError;
use crate::policy::Policy;
use crate::state::CacheState;
use crate::stats::StatsLedger;

use serde::{Deserialize, Serialize};

const MAGIC: &[u8; 5] = b"FCSIM";
const HEADER_LEN: usize = MAGIC.len() + 2;

/// Version of the snapshot body layout.
pub const SCHEMA_VERSION: u16 = 1;

#[derive(Serialize)]
pub(crate) struct SnapshotBodyRef<'a> {
  pub(crate) config: &'a SimulationConfig,
  pub(crate) policy: &'a Policy,
  pub(crate) state: &'a CacheState,
  pub(crate) ledger: &'a StatsLedger,
  pub(crate) progress: &'a Progress,
}

// Owned mirror of `SnapshotBodyRef`; both encode identically.
#[derive(Deserialize)]
pub(crate) struct SnapshotBody {
  pub(crate) config: SimulationConfig,
  pub(crate) policy: Policy,
  pub(crate) state: CacheState,
  pub(crate) ledger: StatsLedger,
  pub(crate) progress: Progress,
}

pub(crate) fn encode(body: &SnapshotBodyRef<'_>) -> Result<Vec<u8>, SnapshotError> {
  let encoded = bincode::serialize(body).map_err(SnapshotError::Encode)?;
  let mut blob = Vec::with_capacity(HEADER_LEN + encoded.len());
  blob.extend_from_slice(MAGIC);
  blob.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
  blob.extend_from_slice(&encoded);
  Ok(blob)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<SnapshotBody, SnapshotError> {
  if bytes.len() < HEADER_LEN || !bytes.starts_with(MAGIC) {
    return Err(SnapshotError::BadMagic);
  }
  let found = u16::from_le_bytes([bytes[MAGIC.len()], bytes[MAGIC.len() + 1]]);
  if found != SCHEMA_VERSION {
    return Err(SnapshotError::SchemaMismatch {
      expected: SCHEMA_VERSION,
      found,
    });
  }
  bincode::deserialize(&bytes[HEADER_LEN..]).map_err(SnapshotError::Decode)
}
