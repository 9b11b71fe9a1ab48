//! Batch index to line range to byte range, and reading exactly that slice

use linebatch_common::Result;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use super::LineIndex;

/// Byte slice of the dataset holding one batch. `end == None` reads to EOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

/// Maps batch indices onto the dataset
///
/// Holds no file handle: every [`resolve`](Self::resolve) opens the dataset read-only,
/// so any number of requests can read concurrently.
#[derive(Debug, Clone)]
pub struct BatchResolver {
    dataset: PathBuf,
    index: Arc<LineIndex>,
    batch_size: u64,
}

impl BatchResolver {
    pub fn new(dataset: impl Into<PathBuf>, index: Arc<LineIndex>, batch_size: u64) -> Self {
        Self {
            dataset: dataset.into(),
            index,
            batch_size,
        }
    }

    pub fn dataset(&self) -> &Path {
        &self.dataset
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn line_count(&self) -> u64 {
        self.index.line_count()
    }

    /// `ceil(line_count / batch_size)`
    pub fn total_batches(&self) -> u64 {
        if self.batch_size == 0 {
            return 0;
        }
        self.line_count().div_ceil(self.batch_size)
    }

    /// Lines of `batch_index`, clipped to the line count. `None` past the end.
    pub fn line_range(&self, batch_index: u64) -> Option<Range<u64>> {
        let start = batch_index.checked_mul(self.batch_size)?;
        if start >= self.line_count() {
            return None;
        }
        let end = start.saturating_add(self.batch_size).min(self.line_count());
        Some(start..end)
    }

    pub fn byte_range(&self, batch_index: u64) -> Option<ByteRange> {
        let lines = self.line_range(batch_index)?;
        Some(ByteRange {
            start: self.index.offset(lines.start)?,
            end: self.index.offset(lines.end),
        })
    }

    /// Read the lines of `batch_index`, terminators stripped. Empty past the end.
    pub fn resolve(&self, batch_index: u64) -> Result<Vec<String>> {
        let (Some(lines), Some(bytes)) = (self.line_range(batch_index), self.byte_range(batch_index))
        else {
            return Ok(Vec::new());
        };

        let mut file = File::open(&self.dataset)?;
        file.seek(SeekFrom::Start(bytes.start))?;
        let limit = bytes.end.map_or(u64::MAX, |end| end - bytes.start);
        let mut reader = BufReader::new(file.take(limit));

        let wanted = (lines.end - lines.start) as usize;
        let mut out = Vec::with_capacity(wanted);
        let mut buf = Vec::new();

        while out.len() < wanted {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            out.push(decode_line(&buf, lines.start + out.len() as u64));
        }

        Ok(out)
    }
}

fn decode_line(raw: &[u8], line: u64) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

    match String::from_utf8_lossy(raw) {
        Cow::Borrowed(text) => text.to_string(),
        Cow::Owned(text) => {
            warn!(line, "Dataset line is not valid UTF-8, invalid bytes replaced");
            text
        },
    }
}
