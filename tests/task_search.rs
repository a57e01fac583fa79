//! Background search tasks: result-buffer monotonicity, truncation at
//! `max_results`, and cancellation (Testable Properties 6-7).

use std::sync::Arc;
use std::time::Duration;

use tfm::path::local::LocalBackend;
use tfm::path::{Backend, Path};
use tfm::tasks::{content_search, name_search};
use tokio::runtime::Handle;

fn wait_for_finish<T>(buf: &Arc<tfm::tasks::ResultBuffer<T>>) {
    for _ in 0..500 {
        if buf.is_finished() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("task did not finish in time");
}

#[tokio::test]
async fn name_search_results_only_grow_and_never_shrink() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        std::fs::write(dir.path().join(format!("match_{i}.txt")), b"x").unwrap();
    }
    std::fs::write(dir.path().join("skip.md"), b"x").unwrap();

    let backend: Arc<dyn Backend> = Arc::new(LocalBackend);
    let root = Path::parse(dir.path().to_str().unwrap());
    let handle = name_search::spawn(backend, root, "match_*".to_string(), 10_000, Handle::current());
    let buf = handle.buffer().clone();

    let mut last_len = 0;
    for _ in 0..500 {
        let len = buf.snapshot_from(0).len();
        assert!(len >= last_len, "result count shrank from {last_len} to {len}");
        last_len = len;
        if buf.is_finished() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(last_len, 20);
    handle.cancel();
}

#[tokio::test]
async fn name_search_truncates_at_max_results_and_marks_it() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..10 {
        std::fs::write(dir.path().join(format!("n{i}.txt")), b"x").unwrap();
    }

    let backend: Arc<dyn Backend> = Arc::new(LocalBackend);
    let root = Path::parse(dir.path().to_str().unwrap());
    let handle = name_search::spawn(backend, root, "*".to_string(), 3, Handle::current());
    let buf = handle.buffer().clone();
    wait_for_finish(&buf);

    assert_eq!(buf.snapshot_from(0).len(), 3);
    assert!(buf.is_truncated());
    handle.cancel();
}

#[tokio::test]
async fn content_search_finds_match_and_reports_correct_line() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"first line\nsecond has NEEDLE in it\nthird\n").unwrap();

    let backend: Arc<dyn Backend> = Arc::new(LocalBackend);
    let root = Path::parse(dir.path().to_str().unwrap());
    let handle = content_search::spawn(
        backend,
        root,
        "needle".to_string(),
        true,
        1000,
        content_search::DEFAULT_SIZE_CEILING,
        Handle::current(),
    );
    let buf = handle.buffer().clone();
    wait_for_finish(&buf);

    let results = buf.snapshot_from(0);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].line_number, 2);
    handle.cancel();
}

#[tokio::test]
async fn cancel_stops_the_worker_without_hanging() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..50 {
        std::fs::write(dir.path().join(format!("f{i}.txt")), b"x").unwrap();
    }
    let backend: Arc<dyn Backend> = Arc::new(LocalBackend);
    let root = Path::parse(dir.path().to_str().unwrap());
    let handle = name_search::spawn(backend, root, "*".to_string(), 10_000, Handle::current());
    handle.cancel();
    // Cancellation is observed at the next suspension point; joining must
    // not hang regardless of how far the walk had gotten.
    handle.join();
}
