//! Content search (§4.3): recursive walk, each file passed through
//! text-file detection and a size ceiling before being scanned line by
//! line against a regex.

use std::sync::Arc;

use regex::RegexBuilder;
use tokio::runtime::Handle;

use super::{CancelFlag, ResultBuffer, TaskHandle};
use crate::path::{Backend, Path};
use crate::util::text_detect::{self, TextKind};

#[derive(Debug, Clone)]
pub struct ContentMatch {
    pub path: Path,
    pub line_number: usize,
    pub line_text: String,
    pub match_start: usize,
    pub match_end: usize,
}

/// Files larger than this are skipped outright rather than streamed —
/// a content-search task has no business holding gigabyte files in
/// memory for a line scan (§4.3 "below a size ceiling").
pub const DEFAULT_SIZE_CEILING: u64 = 32 * 1024 * 1024;

pub fn spawn(
    backend: Arc<dyn Backend>,
    root: Path,
    pattern: String,
    case_insensitive: bool,
    max_results: usize,
    size_ceiling: u64,
    runtime: Handle,
) -> TaskHandle<ContentMatch> {
    let cancel = CancelFlag::new();
    let buffer = Arc::new(ResultBuffer::new());

    let worker_cancel = cancel.clone();
    let worker_buffer = buffer.clone();
    let worker = std::thread::spawn(move || {
        let regex = RegexBuilder::new(&pattern).case_insensitive(case_insensitive).build();
        if let Ok(regex) = regex {
            walk(&backend, &root, &regex, max_results, size_ceiling, &worker_cancel, &worker_buffer, &runtime);
        }
        worker_buffer.mark_finished();
    });

    TaskHandle::new(cancel, buffer, worker)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    backend: &Arc<dyn Backend>,
    dir: &Path,
    regex: &regex::Regex,
    max_results: usize,
    size_ceiling: u64,
    cancel: &CancelFlag,
    buffer: &ResultBuffer<ContentMatch>,
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
        if entry.is_dir {
            walk(backend, &entry.path, regex, max_results, size_ceiling, cancel, buffer, runtime);
            continue;
        }
        if entry.size.map(|s| s > size_ceiling).unwrap_or(false) {
            continue;
        }
        scan_file(backend, &entry.path, regex, max_results, cancel, buffer, runtime);
    }
}

fn scan_file(
    backend: &Arc<dyn Backend>,
    path: &Path,
    regex: &regex::Regex,
    max_results: usize,
    cancel: &CancelFlag,
    buffer: &ResultBuffer<ContentMatch>,
    runtime: &Handle,
) {
    let data = match runtime.block_on(backend.read_bytes(path)) {
        Ok(data) => data,
        Err(_) => return,
    };
    let kind = text_detect::classify(&data);
    if kind == TextKind::Binary {
        return;
    }
    let Some(text) = text_detect::decode(&data, kind) else { return };
    for (idx, line) in text.lines().enumerate() {
        if cancel.is_cancelled() || buffer.len() >= max_results {
            if buffer.len() >= max_results {
                buffer.mark_truncated();
            }
            return;
        }
        if let Some(m) = regex.find(line) {
            buffer.push(ContentMatch {
                path: path.clone(),
                line_number: idx + 1,
                line_text: line.to_string(),
                match_start: m.start(),
                match_end: m.end(),
            });
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
    async fn matches_lines_and_skips_binary_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello world\nneedle here\n").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"\0\0needle\0\0").unwrap();

        let backend: Arc<dyn Backend> = Arc::new(LocalBackend);
        let root = Path::parse(dir.path().to_str().unwrap());
        let handle = spawn(backend, root, "needle".to_string(), false, 10_000, DEFAULT_SIZE_CEILING, Handle::current());

        let buf = handle.buffer().clone();
        for _ in 0..200 {
            if buf.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let results = buf.snapshot_from(0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_number, 2);
        handle.cancel();
    }
}
