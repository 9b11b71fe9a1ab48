//! Sidecar recording what the persisted pool was built for
//!
//! Pool indices only mean something for the batch size they were cut with. When the
//! configured batch size differs from the manifest, the pool is rebuilt; a different line
//! count only gets a warning, since the index itself was reused.

use chrono::{DateTime, Utc};
use linebatch_common::{LinebatchError, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateManifest {
    pub batch_size: u64,
    pub line_count: u64,
    pub dataset: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Result of comparing a stored manifest with the running configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestCheck {
    Unchanged,
    BatchSizeChanged { previous: u64 },
    LineCountChanged { previous: u64 },
}

impl StateManifest {
    pub fn new(dataset: impl Into<PathBuf>, batch_size: u64, line_count: u64) -> Self {
        Self {
            batch_size,
            line_count,
            dataset: dataset.into(),
            created_at: Utc::now(),
        }
    }

    /// `Ok(None)` when no manifest was written yet
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| LinebatchError::corrupt_state(path, e.to_string()))
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, |out| out.write_all(&json))
    }

    /// A batch size change takes precedence since it forces a rebuild
    pub fn check(&self, batch_size: u64, line_count: u64) -> ManifestCheck {
        if self.batch_size != batch_size {
            ManifestCheck::BatchSizeChanged {
                previous: self.batch_size,
            }
        } else if self.line_count != line_count {
            ManifestCheck::LineCountChanged {
                previous: self.line_count,
            }
        } else {
            ManifestCheck::Unchanged
        }
    }
}
