//! Coordinator: composes index, resolver, pool and cursor behind the HTTP handlers
//!
//! Built once by [`Coordinator::open`] and cloned into every handler through axum state.
//! File I/O runs on the blocking thread pool; the pool and the cursor each sit behind
//! their own mutex, so random and sequential workers never wait on each other.

use linebatch_common::protocol::StatusSnapshot;
use linebatch_common::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::Config;
use crate::dataset::{BatchResolver, LineIndex};
use crate::error::{AppError, AppResult};
use crate::state::{
    BatchPool, Completion, ManifestCheck, ProgressCursor, SkipOutcome, StateManifest,
};

/// Answer to a random-mode work request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkAssignment {
    Assigned {
        batch_index: u64,
        /// Pool size when the batch was picked, this batch included
        batches_left: usize,
        lines: Vec<String>,
    },
    EndOfWork,
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: BatchResolver,
    pool: Mutex<BatchPool>,
    cursor: Mutex<ProgressCursor>,
}

impl Coordinator {
    /// Startup sequence: index, manifest, pool, cursor
    ///
    /// Blocking; a missing dataset, a corrupt index or a corrupt pool is fatal here.
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.state.dir)?;

        let index = LineIndex::ensure(&config.dataset.path, &config.state.index_path())?;
        let resolver = BatchResolver::new(
            config.dataset.path.clone(),
            Arc::new(index),
            config.dataset.batch_size,
        );
        let line_count = resolver.line_count();
        let batch_size = resolver.batch_size();
        let total_batches = resolver.total_batches();

        let manifest_path = config.state.manifest_path();
        let previous = StateManifest::load(&manifest_path)?;
        let check = previous
            .as_ref()
            .map(|manifest| manifest.check(batch_size, line_count));

        let pool = match check {
            Some(ManifestCheck::BatchSizeChanged { previous }) => {
                warn!(
                    previous_batch_size = previous,
                    batch_size, "Batch size changed since the pool was built, rebuilding pool"
                );
                BatchPool::rebuild(config.state.pool_path(), total_batches)?
            },
            Some(ManifestCheck::LineCountChanged { previous }) => {
                warn!(
                    previous_line_count = previous,
                    line_count,
                    "Line count differs from the state manifest; delete the line index if the dataset changed"
                );
                BatchPool::initialize(config.state.pool_path(), total_batches)?
            },
            Some(ManifestCheck::Unchanged) | None => {
                BatchPool::initialize(config.state.pool_path(), total_batches)?
            },
        };

        if check != Some(ManifestCheck::Unchanged) {
            StateManifest::new(config.dataset.path.clone(), batch_size, line_count)
                .persist(&manifest_path)?;
        }

        let cursor = ProgressCursor::load(config.state.cursor_path(), config.state.skip_ledger_path());

        info!(
            line_count,
            batch_size,
            total_batches,
            batches_left = pool.len(),
            last_completed_batch = cursor.last_completed(),
            "Coordinator ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                resolver,
                pool: Mutex::new(pool),
                cursor: Mutex::new(cursor),
            }),
        })
    }

    pub fn resolver(&self) -> &BatchResolver {
        &self.inner.resolver
    }

    // ------------------------------------------------------------------------
    // Random mode
    // ------------------------------------------------------------------------

    /// Pick a pending batch without removing it and read its lines
    pub async fn request_work(&self) -> AppResult<WorkAssignment> {
        self.run_blocking(|inner| {
            let picked = {
                let pool = inner.pool()?;
                pool.take_one(&mut rand::thread_rng())
                    .map(|batch_index| (batch_index, pool.len()))
            };

            let Some((batch_index, batches_left)) = picked else {
                return Ok(WorkAssignment::EndOfWork);
            };

            let lines = inner.resolver.resolve(batch_index)?;
            if lines.is_empty() {
                warn!(
                    batch_index,
                    line_count = inner.resolver.line_count(),
                    "Pooled batch resolves to no lines; pool and dataset disagree"
                );
                return Ok(WorkAssignment::EndOfWork);
            }

            Ok(WorkAssignment::Assigned {
                batch_index,
                batches_left,
                lines,
            })
        })
        .await
    }

    pub async fn report_complete(&self, batch_index: u64) -> AppResult<Completion> {
        self.run_blocking(move |inner| {
            let completion = inner.pool()?.complete(batch_index)?;
            match completion {
                Completion::Removed { remaining } => {
                    info!(batch_index, batches_left = remaining, "Batch completed")
                },
                Completion::AlreadyRemoved => {
                    info!(batch_index, "Batch was already removed, ignoring")
                },
            }
            Ok(completion)
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Sequential mode
    // ------------------------------------------------------------------------

    pub fn fetch_progress(&self) -> AppResult<i64> {
        Ok(self.inner.cursor()?.last_completed())
    }

    /// Overwrite the cursor; `-1` resets to the beginning
    pub async fn set_progress(&self, last_completed_batch: i64) -> AppResult<()> {
        if last_completed_batch < linebatch_common::protocol::NO_PROGRESS {
            return Err(AppError::bad_request(format!(
                "last_completed_batch must be >= -1, got {}",
                last_completed_batch
            )));
        }

        self.run_blocking(move |inner| {
            inner.cursor()?.advance(last_completed_batch)?;
            info!(last_completed_batch, "Progress updated");
            Ok(())
        })
        .await
    }

    /// Lines of `batch_index`, or `None` past the end. No state change.
    pub async fn request_batch(&self, batch_index: u64) -> AppResult<Option<Vec<String>>> {
        self.run_blocking(move |inner| {
            let lines = inner.resolver.resolve(batch_index)?;
            Ok((!lines.is_empty()).then_some(lines))
        })
        .await
    }

    /// Advance past the next batch without processing it
    pub async fn skip_batch(&self, batch_index: u64, reason: String) -> AppResult<()> {
        self.run_blocking(move |inner| match inner.cursor()?.skip(batch_index, &reason)? {
            SkipOutcome::Skipped => Ok(()),
            SkipOutcome::NotNext { expected } => Err(AppError::Rejected(format!(
                "Batch #{} is not the next batch; only #{} can be skipped",
                batch_index, expected
            ))),
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    pub fn status(&self) -> AppResult<StatusSnapshot> {
        let resolver = &self.inner.resolver;
        Ok(StatusSnapshot {
            line_count: resolver.line_count(),
            batch_size: resolver.batch_size(),
            total_batches: resolver.total_batches(),
            batches_left: self.inner.pool()?.len(),
            last_completed_batch: self.inner.cursor()?.last_completed(),
        })
    }

    /// Re-read pool and cursor files after an operator edited them
    pub async fn reload_state(&self) -> AppResult<StatusSnapshot> {
        self.run_blocking(|inner| {
            inner.pool()?.reload()?;
            inner.cursor()?.reload();
            Ok(())
        })
        .await?;
        self.status()
    }

    async fn run_blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Inner) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner)).await?
    }
}

impl Inner {
    fn pool(&self) -> AppResult<MutexGuard<'_, BatchPool>> {
        self.pool
            .lock()
            .map_err(|_| AppError::internal("batch pool lock poisoned"))
    }

    fn cursor(&self) -> AppResult<MutexGuard<'_, ProgressCursor>> {
        self.cursor
            .lock()
            .map_err(|_| AppError::internal("progress cursor lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linebatch_common::LinebatchError;
    use tempfile::TempDir;

    fn dataset(dir: &TempDir, lines: usize) -> std::path::PathBuf {
        let path = dir.path().join("data.jsonl");
        let body: String = (0..lines).map(|i| format!("{{\"id\":{}}}\n", i)).collect();
        std::fs::write(&path, body).unwrap();
        path
    }

    fn open(dir: &TempDir, lines: usize, batch_size: u64) -> Coordinator {
        let config = Config::for_dataset(dataset(dir, lines), dir.path().join("state"), batch_size);
        Coordinator::open(&config).unwrap()
    }

    #[test]
    fn test_open_requires_dataset() {
        let dir = TempDir::new().unwrap();
        let config = Config::for_dataset(dir.path().join("missing.jsonl"), dir.path(), 32);
        assert!(matches!(
            Coordinator::open(&config),
            Err(LinebatchError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_open_writes_state_files() {
        let dir = TempDir::new().unwrap();
        let coordinator = open(&dir, 70, 32);
        let state = dir.path().join("state");

        assert!(state.join("line_index.txt").exists());
        assert_eq!(std::fs::read_to_string(state.join("batch_pool.txt")).unwrap(), "0,1,2");
        let manifest = StateManifest::load(&state.join("state_manifest.json")).unwrap().unwrap();
        assert_eq!((manifest.batch_size, manifest.line_count), (32, 70));

        let status = coordinator.status().unwrap();
        assert_eq!(status.total_batches, 3);
        assert_eq!(status.last_completed_batch, -1);
    }

    #[tokio::test]
    async fn test_random_mode_drains_pool() {
        let dir = TempDir::new().unwrap();
        let coordinator = open(&dir, 70, 32);

        let mut seen = Vec::new();
        loop {
            match coordinator.request_work().await.unwrap() {
                WorkAssignment::Assigned { batch_index, lines, .. } => {
                    assert!(!lines.is_empty());
                    coordinator.report_complete(batch_index).await.unwrap();
                    seen.push(batch_index);
                },
                WorkAssignment::EndOfWork => break,
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(
            coordinator.report_complete(1).await.unwrap(),
            Completion::AlreadyRemoved
        );
    }

    #[tokio::test]
    async fn test_pooled_batch_past_end_is_end_of_work() {
        let dir = TempDir::new().unwrap();
        let coordinator = open(&dir, 10, 32);
        std::fs::write(dir.path().join("state/batch_pool.txt"), "5").unwrap();
        coordinator.reload_state().await.unwrap();

        assert_eq!(coordinator.request_work().await.unwrap(), WorkAssignment::EndOfWork);
    }

    #[tokio::test]
    async fn test_changed_batch_size_rebuilds_pool() {
        let dir = TempDir::new().unwrap();
        let coordinator = open(&dir, 70, 32);
        coordinator.report_complete(0).await.unwrap();
        coordinator.set_progress(1).await.unwrap();
        drop(coordinator);

        let same = open(&dir, 70, 32);
        assert_eq!(same.status().unwrap().batches_left, 2);

        let resized = open(&dir, 70, 10);
        let status = resized.status().unwrap();
        assert_eq!(status.total_batches, 7);
        assert_eq!(status.batches_left, 7);
        // Cursor is independent of the pool
        assert_eq!(status.last_completed_batch, 1);
    }

    #[tokio::test]
    async fn test_sequential_progress_and_skip() {
        let dir = TempDir::new().unwrap();
        let coordinator = open(&dir, 70, 32);

        assert_eq!(coordinator.fetch_progress().unwrap(), -1);
        coordinator.set_progress(0).await.unwrap();
        assert!(matches!(
            coordinator.set_progress(-2).await,
            Err(AppError::BadRequest(_))
        ));

        assert!(matches!(
            coordinator.skip_batch(2, "poison".into()).await,
            Err(AppError::Rejected(_))
        ));
        coordinator.skip_batch(1, "poison".into()).await.unwrap();
        assert_eq!(coordinator.fetch_progress().unwrap(), 1);

        let lines = coordinator.request_batch(2).await.unwrap().unwrap();
        assert_eq!(lines.len(), 6);
        assert_eq!(coordinator.request_batch(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reload_with_missing_pool_is_an_error() {
        let dir = TempDir::new().unwrap();
        let coordinator = open(&dir, 70, 32);
        std::fs::remove_file(dir.path().join("state/batch_pool.txt")).unwrap();

        assert!(matches!(
            coordinator.reload_state().await,
            Err(AppError::Linebatch(LinebatchError::StateMissing(_)))
        ));
    }
}
