//! Runtime configuration.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Result;
use crate::DFS_IPC_NAME;

/// Default upper bound on parallel sampling workers.
pub const DEFAULT_MAX_PARALLEL_WORKERS: usize = 16;

/// Configuration for backend clients.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DfsConfig {
    /// Local socket name of an out-of-process backend.
    pub ipc_name: String,
    /// On-disk location of the evaluation cache; `None` keeps it temporary.
    pub cache_path: Option<PathBuf>,
    /// Upper bound on `worker_count` for parallel sampling.
    pub max_parallel_workers: usize,
}

impl Default for DfsConfig {
    fn default() -> Self {
        Self {
            ipc_name: DFS_IPC_NAME.to_string(),
            cache_path: None,
            max_parallel_workers: DEFAULT_MAX_PARALLEL_WORKERS,
        }
    }
}

impl DfsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
