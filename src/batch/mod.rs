//! Batch file operations (§4.4): pre-count, per-file progress, error
//! accumulation, cross-backend copy semantics.
//!
//! Follows the same worker-thread/cancel-flag/shared-buffer shape as
//! `crate::tasks` (itself grounded on the teacher's spawn-a-worker
//! pattern) — a batch operation is really just another background task
//! whose "results" are progress counters instead of search hits.

pub mod archive_ops;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;

use crate::cache::MetadataCache;
use crate::error::TfmResult;
use crate::path::registry::BackendRegistry;
use crate::path::{copy_between, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Copy,
    Move,
    Delete,
    ArchiveCreate,
    ArchiveExtract,
}

/// One error recorded against a specific source during execution
/// (§4.4: "record error context, continue").
#[derive(Debug, Clone)]
pub struct BatchItemError {
    pub path: Path,
    pub message: String,
}

/// Live counters a batch operation updates as it runs; the UI polls a
/// clone of this under its own short lock acquisition (§5: "reader on
/// the main thread acquires briefly to copy a slice for display").
#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    pub total_files: u64,
    pub processed: u64,
    pub errors: Vec<BatchItemError>,
    pub current_item: Option<Path>,
    pub finished: bool,
}

pub struct BatchHandle {
    cancel: Arc<AtomicBool>,
    progress: Arc<Mutex<BatchProgress>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl BatchHandle {
    pub(crate) fn from_parts(
        cancel: Arc<AtomicBool>,
        progress: Arc<Mutex<BatchProgress>>,
        worker: std::thread::JoinHandle<()>,
    ) -> Self {
        BatchHandle { cancel, progress, worker: Some(worker) }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> BatchProgress {
        self.progress.lock().expect("batch progress mutex poisoned").clone()
    }

    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for BatchHandle {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Starts a copy/move/delete batch over `sources` into `destination`
/// (archives use `archive_ops::spawn_create`/`spawn_extract` instead,
/// since they stream through a single container writer rather than
/// performing one backend operation per source).
pub fn spawn(
    kind: BatchKind,
    sources: Vec<Path>,
    destination: Option<Path>,
    registry: Arc<BackendRegistry>,
    cache: Arc<MetadataCache>,
    runtime: Handle,
) -> BatchHandle {
    assert!(!matches!(kind, BatchKind::ArchiveCreate | BatchKind::ArchiveExtract));

    let cancel = Arc::new(AtomicBool::new(false));
    let progress = Arc::new(Mutex::new(BatchProgress::default()));

    let worker_cancel = cancel.clone();
    let worker_progress = progress.clone();
    let worker = std::thread::spawn(move || {
        runtime.block_on(run(kind, sources, destination, registry, cache, worker_cancel, worker_progress.clone()));
        worker_progress.lock().expect("batch progress mutex poisoned").finished = true;
    });

    BatchHandle { cancel, progress, worker: Some(worker) }
}

/// Pre-count phase: walks every source once, counting individual files
/// (directory contents included) so the total is known before any work
/// starts (§4.4).
async fn count_files(registry: &BackendRegistry, path: &Path) -> u64 {
    let Ok(backend) = registry.resolve(path) else { return 0 };
    match backend.is_dir(path).await {
        Ok(true) => {
            let mut total = 0u64;
            if let Ok(entries) = backend.iterdir(path).await {
                for entry in entries {
                    total += Box::pin(count_files(registry, &entry.path)).await;
                }
            }
            total
        }
        _ => 1,
    }
}

/// Same pre-count walk, exposed to `archive_ops` (which pre-counts
/// archive members rather than destination-side files).
pub(crate) async fn count_files_pub(registry: &BackendRegistry, path: &Path) -> u64 {
    count_files(registry, path).await
}

async fn run(
    kind: BatchKind,
    sources: Vec<Path>,
    destination: Option<Path>,
    registry: Arc<BackendRegistry>,
    cache: Arc<MetadataCache>,
    cancel: Arc<AtomicBool>,
    progress: Arc<Mutex<BatchProgress>>,
) {
    let mut total = 0u64;
    for source in &sources {
        total += count_files(&registry, source).await;
    }
    progress.lock().expect("batch progress mutex poisoned").total_files = total;

    for source in sources {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        let dest = destination.as_ref().map(|d| d.join(&source.name()));
        execute_one(kind, &registry, &cache, &source, dest.as_ref(), &cancel, &progress).await;
    }
}

fn invalidate_for(cache: &MetadataCache, path: &Path) {
    let bucket = path.authority().unwrap_or_else(|| path.scheme()).to_string();
    cache.invalidate_key(&bucket, path.key());
    let parent = path.parent();
    let parent_bucket = parent.authority().unwrap_or_else(|| parent.scheme()).to_string();
    cache.invalidate_prefix(&parent_bucket, parent.key());
}

async fn execute_one(
    kind: BatchKind,
    registry: &BackendRegistry,
    cache: &MetadataCache,
    source: &Path,
    dest: Option<&Path>,
    cancel: &Arc<AtomicBool>,
    progress: &Arc<Mutex<BatchProgress>>,
) {
    {
        let mut guard = progress.lock().expect("batch progress mutex poisoned");
        guard.current_item = Some(source.clone());
    }

    let result = match kind {
        BatchKind::Copy => do_copy(registry, cache, source, dest, cancel, progress).await,
        BatchKind::Move => do_move(registry, cache, source, dest, cancel, progress).await,
        BatchKind::Delete => do_delete(registry, cache, source, cancel, progress).await,
        BatchKind::ArchiveCreate | BatchKind::ArchiveExtract => unreachable!(),
    };

    if let Err(err) = result {
        let mut guard = progress.lock().expect("batch progress mutex poisoned");
        guard.errors.push(BatchItemError { path: source.clone(), message: err.to_string() });
    }
}

async fn do_copy(
    registry: &BackendRegistry,
    cache: &MetadataCache,
    source: &Path,
    dest: Option<&Path>,
    cancel: &Arc<AtomicBool>,
    progress: &Arc<Mutex<BatchProgress>>,
) -> TfmResult<()> {
    let dest = dest.ok_or_else(|| crate::error::TfmError::InvalidName("copy requires a destination".into()))?;
    let from_backend = registry.resolve(source)?;
    let to_backend = registry.resolve(dest)?;

    if from_backend.is_dir(source).await? {
        if let Err(err) = to_backend.mkdir(dest).await {
            if !matches!(err, crate::error::TfmError::AlreadyExists(_)) {
                return Err(err);
            }
        }
        for entry in from_backend.iterdir(source).await? {
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            let child_dest = dest.join(&entry.name);
            Box::pin(do_copy(registry, cache, &entry.path, Some(&child_dest), cancel, progress)).await?;
        }
        return Ok(());
    }

    let same_backend = source.scheme() == dest.scheme() && source.authority() == dest.authority();
    if same_backend {
        from_backend.copy_to(source, dest).await?;
    } else {
        copy_between(from_backend.as_ref(), source, to_backend.as_ref(), dest).await?;
    }
    invalidate_for(cache, dest);
    bump_processed(progress);
    Ok(())
}

async fn do_move(
    registry: &BackendRegistry,
    cache: &MetadataCache,
    source: &Path,
    dest: Option<&Path>,
    cancel: &Arc<AtomicBool>,
    progress: &Arc<Mutex<BatchProgress>>,
) -> TfmResult<()> {
    let dest = dest.ok_or_else(|| crate::error::TfmError::InvalidName("move requires a destination".into()))?;
    let from_backend = registry.resolve(source)?;
    registry.resolve(dest)?;

    let same_backend = source.scheme() == dest.scheme() && source.authority() == dest.authority();
    let is_dir = from_backend.is_dir(source).await?;

    if is_dir && !from_backend.supports_directory_rename() {
        // Directory-rename gating (§4.4): refuse rather than silently
        // degrade to an expensive copy-tree-then-delete-tree.
        return Err(crate::error::TfmError::Unsupported(format!(
            "{source} is a directory and its backend does not support directory rename"
        )));
    }

    if same_backend {
        from_backend.rename(source, dest).await?;
        invalidate_for(cache, source);
        invalidate_for(cache, dest);
        bump_processed(progress);
        return Ok(());
    }

    // Cross-backend: copy then delete. A delete failure after a
    // successful copy leaves the destination copy in place and reports
    // the error (Open Question decision, see DESIGN.md) rather than
    // attempting to roll back a write that may itself fail.
    do_copy(registry, cache, source, Some(dest), cancel, progress).await?;
    if from_backend.is_dir(source).await? {
        from_backend.rmtree(source).await?;
    } else {
        from_backend.unlink(source).await?;
    }
    invalidate_for(cache, source);
    Ok(())
}

async fn do_delete(
    registry: &BackendRegistry,
    cache: &MetadataCache,
    source: &Path,
    _cancel: &Arc<AtomicBool>,
    progress: &Arc<Mutex<BatchProgress>>,
) -> TfmResult<()> {
    let backend = registry.resolve(source)?;
    if backend.is_dir(source).await? {
        backend.rmtree(source).await?;
    } else {
        backend.unlink(source).await?;
    }
    invalidate_for(cache, source);
    bump_processed(progress);
    Ok(())
}

fn bump_processed(progress: &Arc<Mutex<BatchProgress>>) {
    let mut guard = progress.lock().expect("batch progress mutex poisoned");
    guard.processed += 1;
}
