//! Line index: byte offset of every line start in the dataset
//!
//! Built by one sequential scan and persisted as one decimal offset per line, so a
//! restarted coordinator loads it instead of rescanning a multi-gigabyte file. A
//! persisted index is trusted as-is; if the dataset changes, delete the index file.

use linebatch_common::{LinebatchError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::state::write_atomic;

/// Read buffer for the scan
const SCAN_BUFFER_BYTES: usize = 1 << 20;

/// Emit a progress event every this many lines while scanning
const PROGRESS_EVERY_LINES: u64 = 1_000_000;

/// Ordered line-start offsets. `offsets[0] == 0`, strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineIndex {
    offsets: Vec<u64>,
}

impl LineIndex {
    /// Wrap offsets after checking the ordering invariants
    pub fn from_offsets(offsets: Vec<u64>) -> Result<Self> {
        if let Some(&first) = offsets.first() {
            if first != 0 {
                return Err(LinebatchError::CorruptIndex {
                    line: 0,
                    reason: format!("first offset is {}, expected 0", first),
                });
            }
        }

        if let Some(pos) = offsets.windows(2).position(|w| w[0] >= w[1]) {
            return Err(LinebatchError::CorruptIndex {
                line: pos + 1,
                reason: format!(
                    "offset {} does not follow {}",
                    offsets[pos + 1],
                    offsets[pos]
                ),
            });
        }

        Ok(Self { offsets })
    }

    /// Scan `dataset` from offset 0 and record every line start
    pub fn build(dataset: &Path) -> Result<Self> {
        let file = match File::open(dataset) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LinebatchError::DatasetNotFound(dataset.to_path_buf()))
            },
            Err(e) => return Err(e.into()),
        };

        info!(dataset = %dataset.display(), "Building line index");
        let index = Self::scan(BufReader::with_capacity(SCAN_BUFFER_BYTES, file))?;
        info!(lines = index.line_count(), "Line index built");

        Ok(index)
    }

    /// Record line starts of any buffered reader. A trailing line without `\n` counts.
    pub fn scan<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut offsets = Vec::new();
        let mut position = 0u64;
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }

            offsets.push(position);
            position += read as u64;

            if offsets.len() as u64 % PROGRESS_EVERY_LINES == 0 {
                info!(lines = offsets.len(), bytes = position, "Indexing dataset");
            }
        }

        Ok(Self { offsets })
    }

    /// Load a persisted index, validating every record
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::with_capacity(SCAN_BUFFER_BYTES, File::open(path)?);
        let mut offsets = Vec::new();

        for (line, record) in reader.lines().enumerate() {
            let record = record?;
            let offset = record.trim().parse::<u64>().map_err(|e| LinebatchError::CorruptIndex {
                line,
                reason: format!("'{}' is not an offset: {}", record, e),
            })?;
            offsets.push(offset);
        }

        let index = Self::from_offsets(offsets)?;
        debug!(path = %path.display(), lines = index.line_count(), "Line index loaded");
        Ok(index)
    }

    /// Write one offset per line, replacing `path` atomically
    pub fn persist(&self, path: &Path) -> Result<()> {
        write_atomic(path, |out| {
            for offset in &self.offsets {
                writeln!(out, "{}", offset)?;
            }
            Ok(())
        })?;
        info!(path = %path.display(), lines = self.line_count(), "Line index persisted");
        Ok(())
    }

    /// Load the persisted index, or build and persist it when none exists
    ///
    /// The dataset has to exist either way; the index is useless without it.
    pub fn ensure(dataset: &Path, index_path: &Path) -> Result<Self> {
        if !dataset.is_file() {
            return Err(LinebatchError::DatasetNotFound(dataset.to_path_buf()));
        }

        if index_path.exists() {
            info!(path = %index_path.display(), "Line index exists, skipping scan");
            return Self::load(index_path);
        }

        let index = Self::build(dataset)?;
        index.persist(index_path)?;
        Ok(index)
    }

    pub fn line_count(&self) -> u64 {
        self.offsets.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Byte offset where `line` starts
    pub fn offset(&self, line: u64) -> Option<u64> {
        usize::try_from(line).ok().and_then(|i| self.offsets.get(i).copied())
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }
}
