//! Batch pool: indices not yet reported complete (random mode)
//!
//! Selection does not remove; only an explicit completion does. A batch handed to a
//! worker that dies stays in the pool and will be picked again later.

use linebatch_common::{LinebatchError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::write_atomic;

/// Outcome of [`BatchPool::complete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Removed { remaining: usize },
    /// The index was not in the pool, typically a duplicate completion
    AlreadyRemoved,
}

/// In-memory mirror of the pool file, sorted ascending. Written through on every removal.
#[derive(Debug, Clone)]
pub struct BatchPool {
    path: PathBuf,
    remaining: Vec<u64>,
}

impl BatchPool {
    /// Load the pool at `path`, or create `0..total_batches` there if none exists
    pub fn initialize(path: impl Into<PathBuf>, total_batches: u64) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            let pool = Self::load(&path)?;
            info!(path = %path.display(), batches_left = pool.len(), "Resuming batch pool");
            return Ok(pool);
        }
        Self::rebuild(path, total_batches)
    }

    /// Overwrite whatever is at `path` with the full `0..total_batches` pool
    pub fn rebuild(path: impl Into<PathBuf>, total_batches: u64) -> Result<Self> {
        let pool = Self {
            path: path.into(),
            remaining: (0..total_batches).collect(),
        };
        pool.persist()?;
        info!(path = %pool.path.display(), total_batches, "Initialized batch pool");
        Ok(pool)
    }

    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LinebatchError::StateMissing(path))
            },
            Err(e) => return Err(e.into()),
        };

        let mut remaining = contents
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<u64>().map_err(|e| {
                    LinebatchError::corrupt_state(&path, format!("entry '{}': {}", entry, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Hand-edited files may be unordered or repeat an index
        remaining.sort_unstable();
        remaining.dedup();

        Ok(Self { path, remaining })
    }

    /// Re-read the pool file, picking up edits made on disk
    pub fn reload(&mut self) -> Result<()> {
        self.remaining = Self::load(&self.path)?.remaining;
        info!(path = %self.path.display(), batches_left = self.len(), "Reloaded batch pool");
        Ok(())
    }

    /// Uniform random pick among remaining indices, without removing it
    pub fn take_one<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u64> {
        self.remaining.choose(rng).copied()
    }

    /// Remove `batch_index` and persist the pool before returning
    pub fn complete(&mut self, batch_index: u64) -> Result<Completion> {
        let Ok(pos) = self.remaining.binary_search(&batch_index) else {
            debug!(batch_index, "Batch already removed from pool");
            return Ok(Completion::AlreadyRemoved);
        };

        self.remaining.remove(pos);
        if let Err(e) = self.persist() {
            // Memory must not run ahead of the file
            self.remaining.insert(pos, batch_index);
            return Err(e);
        }

        Ok(Completion::Removed {
            remaining: self.remaining.len(),
        })
    }

    pub fn contains(&self, batch_index: u64) -> bool {
        self.remaining.binary_search(&batch_index).is_ok()
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn indices(&self) -> &[u64] {
        &self.remaining
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        write_atomic(&self.path, |out| {
            for (i, index) in self.remaining.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                write!(out, "{}", index)?;
            }
            Ok(())
        })
    }
}
