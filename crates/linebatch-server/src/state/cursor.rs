//! Progress cursor: last acknowledged batch (sequential mode)

use chrono::{SecondsFormat, Utc};
use linebatch_common::protocol::NO_PROGRESS;
use linebatch_common::{LinebatchError, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::write_atomic;

/// Outcome of [`ProgressCursor::skip`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    Skipped,
    /// Only the next batch can be skipped
    NotNext { expected: u64 },
}

#[derive(Debug, Clone)]
pub struct ProgressCursor {
    path: PathBuf,
    ledger_path: PathBuf,
    /// `NO_PROGRESS` or a batch index
    last_completed: i64,
}

impl ProgressCursor {
    /// Read the cursor file. Missing or unreadable means nothing was completed yet.
    pub fn load(path: impl Into<PathBuf>, ledger_path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_completed = read_marker(&path);
        Self {
            path,
            ledger_path: ledger_path.into(),
            last_completed,
        }
    }

    pub fn reload(&mut self) {
        self.last_completed = read_marker(&self.path);
    }

    pub fn last_completed(&self) -> i64 {
        self.last_completed
    }

    /// Next batch to serve
    pub fn current(&self) -> u64 {
        // last_completed >= -1, so one past it always fits in u64
        u64::try_from(self.last_completed).map_or(0, |done| done + 1)
    }

    /// Overwrite the marker. No ordering check: moving backwards replays batches, `-1` resets.
    pub fn advance(&mut self, last_completed: i64) -> Result<()> {
        if last_completed < NO_PROGRESS {
            return Err(LinebatchError::Parse(format!(
                "last completed batch must be >= {}, got {}",
                NO_PROGRESS, last_completed
            )));
        }

        write_atomic(&self.path, |out| write!(out, "{}", last_completed))?;
        self.last_completed = last_completed;
        Ok(())
    }

    /// Move past the current batch without processing it, recording why in the skip ledger
    pub fn skip(&mut self, batch_index: u64, reason: &str) -> Result<SkipOutcome> {
        let expected = self.current();
        if batch_index != expected {
            return Ok(SkipOutcome::NotNext { expected });
        }

        let marker = i64::try_from(batch_index)
            .map_err(|_| LinebatchError::Parse(format!("batch index {} too large", batch_index)))?;

        let reason = single_line(reason);
        self.append_ledger(batch_index, &reason)?;
        warn!(batch_index, reason = %reason, "Skipping batch");

        self.advance(marker)?;
        Ok(SkipOutcome::Skipped)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    fn append_ledger(&self, batch_index: u64, reason: &str) -> Result<()> {
        let mut ledger = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.ledger_path)?;
        writeln!(
            ledger,
            "{}\tbatch={}\treason={}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            batch_index,
            reason
        )?;
        ledger.sync_data()?;
        Ok(())
    }
}

fn read_marker(path: &Path) -> i64 {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No progress file, starting from batch 0");
            return NO_PROGRESS;
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Progress file unreadable, starting from batch 0");
            return NO_PROGRESS;
        },
    };

    match contents.trim().parse::<i64>() {
        Ok(value) if value >= NO_PROGRESS => value,
        _ => {
            info!(
                path = %path.display(),
                contents = %contents.trim(),
                "Progress file invalid, starting from batch 0"
            );
            NO_PROGRESS
        },
    }
}

fn single_line(reason: &str) -> String {
    let reason = reason.split_whitespace().collect::<Vec<_>>().join(" ");
    if reason.is_empty() {
        "unspecified".to_string()
    } else {
        reason
    }
}
