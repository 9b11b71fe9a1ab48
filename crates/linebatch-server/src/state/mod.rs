//! Durable coordinator state
//!
//! - `pool`: remaining batch indices for random mode
//! - `cursor`: last acknowledged batch for sequential mode, plus the skip ledger
//! - `manifest`: parameters the persisted pool was built for
//!
//! Pool, cursor and manifest files are replaced through [`write_atomic`], so readers see
//! either the old or the new contents and never a torn write. The skip ledger is
//! append-only.

pub mod cursor;
pub mod manifest;
pub mod pool;

pub use cursor::{ProgressCursor, SkipOutcome};
pub use manifest::{ManifestCheck, StateManifest};
pub use pool::{BatchPool, Completion};

use atomic_write_file::AtomicWriteFile;
use linebatch_common::Result;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write `path` through a temporary sibling file that is fsynced and renamed into place
///
/// If `write` fails the temporary file is discarded and `path` is left untouched.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut atomic = AtomicWriteFile::options().open(path)?;

    match fill(atomic.as_file_mut(), write) {
        Ok(()) => atomic.commit().map_err(Into::into),
        Err(e) => {
            // Keep the original error; a failed discard only leaves a stray temp file
            let _ = atomic.discard();
            Err(e.into())
        },
    }
}

fn fill<F>(file: &mut File, write: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut writer = BufWriter::new(&mut *file);
    write(&mut writer)?;
    writer.flush()?;
    drop(writer);
    file.sync_all()
}
