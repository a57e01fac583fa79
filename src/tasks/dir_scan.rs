//! Directory scan for the jump-to-path dialog (§4.3): enumerate
//! directories under a root, same worker/cancel/buffer machinery as
//! search, filtering hidden entries context-aware — if the root itself
//! sits inside a hidden tree, descendants aren't re-filtered.

use std::sync::Arc;

use tokio::runtime::Handle;

use super::{CancelFlag, ResultBuffer, TaskHandle};
use crate::path::{Backend, Path};

#[derive(Debug, Clone)]
pub struct ScannedDir {
    pub path: Path,
}

pub fn spawn(
    backend: Arc<dyn Backend>,
    root: Path,
    show_hidden: bool,
    max_results: usize,
    runtime: Handle,
) -> TaskHandle<ScannedDir> {
    let cancel = CancelFlag::new();
    let buffer = Arc::new(ResultBuffer::new());

    // If the root itself is already inside a hidden tree, every
    // descendant is implicitly "shown" already having opted in by
    // navigating there — don't re-filter on hidden-ness below it.
    let root_is_hidden = root.parts().iter().any(|part| part.starts_with('.'));
    let filter_hidden = !show_hidden && !root_is_hidden;

    let worker_cancel = cancel.clone();
    let worker_buffer = buffer.clone();
    let worker = std::thread::spawn(move || {
        walk(&backend, &root, filter_hidden, max_results, &worker_cancel, &worker_buffer, &runtime);
        worker_buffer.mark_finished();
    });

    TaskHandle::new(cancel, buffer, worker)
}

fn walk(
    backend: &Arc<dyn Backend>,
    dir: &Path,
    filter_hidden: bool,
    max_results: usize,
    cancel: &CancelFlag,
    buffer: &ResultBuffer<ScannedDir>,
    runtime: &Handle,
) {
    if cancel.is_cancelled() || buffer.len() >= max_results {
        return;
    }
    let entries = match runtime.block_on(backend.iterdir(dir)) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries {
        if cancel.is_cancelled() {
            return;
        }
        if !entry.is_dir {
            continue;
        }
        if filter_hidden && entry.is_hidden {
            continue;
        }
        if buffer.len() >= max_results {
            buffer.mark_truncated();
            return;
        }
        buffer.push(ScannedDir { path: entry.path.clone() });
        walk(backend, &entry.path, filter_hidden, max_results, cancel, buffer, runtime);
    }
}
