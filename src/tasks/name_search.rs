//! Filename search (§4.3): recursive `iterdir` walk, each entry's name
//! matched against a case-insensitive glob; continues into every
//! subdirectory regardless of match, truncating at `max_results`.

use std::sync::Arc;

use glob::Pattern;
use tokio::runtime::Handle;

use super::{CancelFlag, ResultBuffer, TaskHandle};
use crate::path::{Backend, Path};

#[derive(Debug, Clone)]
pub struct NameMatch {
    pub path: Path,
    pub is_dir: bool,
}

pub fn spawn(
    backend: Arc<dyn Backend>,
    root: Path,
    pattern: String,
    max_results: usize,
    runtime: Handle,
) -> TaskHandle<NameMatch> {
    let cancel = CancelFlag::new();
    let buffer = Arc::new(ResultBuffer::new());

    let worker_cancel = cancel.clone();
    let worker_buffer = buffer.clone();
    let worker = std::thread::spawn(move || {
        let compiled = Pattern::new(&pattern.to_lowercase()).ok();
        walk(&backend, &root, compiled.as_ref(), max_results, &worker_cancel, &worker_buffer, &runtime);
        worker_buffer.mark_finished();
    });

    TaskHandle::new(cancel, buffer, worker)
}

fn walk(
    backend: &Arc<dyn Backend>,
    dir: &Path,
    pattern: Option<&Pattern>,
    max_results: usize,
    cancel: &CancelFlag,
    buffer: &ResultBuffer<NameMatch>,
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
        if buffer.len() >= max_results {
            buffer.mark_truncated();
            return;
        }
        let matched = match pattern {
            Some(p) => p.matches(&entry.name.to_lowercase()),
            None => true,
        };
        if matched {
            buffer.push(NameMatch { path: entry.path.clone(), is_dir: entry.is_dir });
        }
        if entry.is_dir {
            walk(backend, &entry.path, pattern, max_results, cancel, buffer, runtime);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::local::LocalBackend;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn finds_nested_matches_and_recurses_past_misses() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/needle.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("hay.txt"), b"x").unwrap();

        let backend: Arc<dyn Backend> = Arc::new(LocalBackend);
        let root = Path::parse(dir.path().to_str().unwrap());
        let handle = spawn(backend, root, "needle*".to_string(), 10_000, Handle::current());

        let buf = handle.buffer().clone();
        for _ in 0..200 {
            if buf.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let results = buf.snapshot_from(0);
        assert_eq!(results.len(), 1);
        assert!(results[0].path.name() == "needle.txt");
        handle.cancel();
    }
}
