//! Batch copy/move/delete: progress monotonicity, error accumulation,
//! and the directory-rename refusal invariant (Testable Properties 8-9).

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tfm::batch::{self, BatchKind};
use tfm::cache::MetadataCache;
use tfm::error::TfmResult;
use tfm::path::local::LocalBackend;
use tfm::path::registry::BackendRegistry;
use tfm::path::{Backend, DirEntry, Path, Stat};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Handle;

fn wait_for_finish(handle: &batch::BatchHandle) {
    for _ in 0..500 {
        if handle.snapshot().finished {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("batch did not finish in time");
}

fn registry() -> Arc<BackendRegistry> {
    Arc::new(BackendRegistry::new())
}

fn cache() -> Arc<MetadataCache> {
    Arc::new(MetadataCache::new(100, Duration::from_secs(60)))
}

#[tokio::test]
async fn copy_file_reaches_destination_and_reports_full_progress() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("src.txt"), b"payload").unwrap();

    let src = Path::parse(dir.path().join("src.txt").to_str().unwrap());
    let dest_dir = Path::parse(dir.path().join("out").to_str().unwrap());
    std::fs::create_dir(dir.path().join("out")).unwrap();

    let handle = batch::spawn(BatchKind::Copy, vec![src], Some(dest_dir), registry(), cache(), Handle::current());
    wait_for_finish(&handle);
    let progress = handle.snapshot();

    assert!(progress.errors.is_empty());
    assert_eq!(progress.processed, progress.total_files);
    assert_eq!(std::fs::read(dir.path().join("out/src.txt")).unwrap(), b"payload");
}

#[tokio::test]
async fn move_file_removes_the_source() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("src.txt"), b"payload").unwrap();
    std::fs::create_dir(dir.path().join("out")).unwrap();

    let src = Path::parse(dir.path().join("src.txt").to_str().unwrap());
    let dest_dir = Path::parse(dir.path().join("out").to_str().unwrap());

    let handle = batch::spawn(BatchKind::Move, vec![src], Some(dest_dir), registry(), cache(), Handle::current());
    wait_for_finish(&handle);

    assert!(!dir.path().join("src.txt").exists());
    assert!(dir.path().join("out/src.txt").exists());
}

#[tokio::test]
async fn delete_removes_file_and_bumps_progress() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("gone.txt"), b"x").unwrap();
    let target = Path::parse(dir.path().join("gone.txt").to_str().unwrap());

    let handle = batch::spawn(BatchKind::Delete, vec![target], None, registry(), cache(), Handle::current());
    wait_for_finish(&handle);
    let progress = handle.snapshot();

    assert!(!dir.path().join("gone.txt").exists());
    assert_eq!(progress.processed, 1);
}

#[tokio::test]
async fn copy_of_missing_source_is_recorded_as_an_error_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let missing = Path::parse(dir.path().join("nope.txt").to_str().unwrap());
    let dest_dir = Path::parse(dir.path().join("out").to_str().unwrap());
    std::fs::create_dir(dir.path().join("out")).unwrap();

    let handle = batch::spawn(BatchKind::Copy, vec![missing], Some(dest_dir), registry(), cache(), Handle::current());
    wait_for_finish(&handle);
    let progress = handle.snapshot();

    assert_eq!(progress.errors.len(), 1);
}

/// A backend that proxies every operation to `LocalBackend` except that
/// it reports no directory-rename support, exercising §4.4's gating
/// without needing a genuinely distinct second filesystem.
struct NoDirRenameBackend(LocalBackend);

#[async_trait]
impl Backend for NoDirRenameBackend {
    fn is_remote(&self) -> bool {
        self.0.is_remote()
    }

    fn supports_directory_rename(&self) -> bool {
        false
    }

    async fn exists(&self, path: &Path) -> TfmResult<bool> {
        self.0.exists(path).await
    }

    async fn is_file(&self, path: &Path) -> TfmResult<bool> {
        self.0.is_file(path).await
    }

    async fn is_dir(&self, path: &Path) -> TfmResult<bool> {
        self.0.is_dir(path).await
    }

    async fn stat(&self, path: &Path) -> TfmResult<Stat> {
        self.0.stat(path).await
    }

    async fn iterdir(&self, path: &Path) -> TfmResult<Vec<DirEntry>> {
        self.0.iterdir(path).await
    }

    async fn read_bytes(&self, path: &Path) -> TfmResult<Vec<u8>> {
        self.0.read_bytes(path).await
    }

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> TfmResult<()> {
        self.0.write_bytes(path, data).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> TfmResult<()> {
        self.0.rename(from, to).await
    }

    async fn unlink(&self, path: &Path) -> TfmResult<()> {
        self.0.unlink(path).await
    }

    async fn mkdir(&self, path: &Path) -> TfmResult<()> {
        self.0.mkdir(path).await
    }

    async fn rmdir(&self, path: &Path) -> TfmResult<()> {
        self.0.rmdir(path).await
    }

    async fn rmtree(&self, path: &Path) -> TfmResult<()> {
        self.0.rmtree(path).await
    }

    async fn copy_to(&self, from: &Path, to: &Path) -> TfmResult<()> {
        self.0.copy_to(from, to).await
    }

    async fn open_reader(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncRead + Send>>> {
        self.0.open_reader(path).await
    }

    async fn open_writer(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncWrite + Send>>> {
        self.0.open_writer(path).await
    }
}

#[tokio::test]
async fn moving_a_directory_is_refused_when_the_backend_cannot_rename_directories() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("src_dir")).unwrap();
    std::fs::write(dir.path().join("src_dir/inner.txt"), b"x").unwrap();
    std::fs::create_dir(dir.path().join("out")).unwrap();

    let mut registry = BackendRegistry::new();
    // Re-register the `file` scheme with the rename-refusing wrapper so
    // every local path resolves through it for this test.
    registry.register("file", None, Arc::new(NoDirRenameBackend(LocalBackend)));
    let registry = Arc::new(registry);

    let src = Path::parse(dir.path().join("src_dir").to_str().unwrap());
    let dest_dir = Path::parse(dir.path().join("out").to_str().unwrap());

    let handle = batch::spawn(BatchKind::Move, vec![src], Some(dest_dir), registry, cache(), Handle::current());
    wait_for_finish(&handle);
    let progress = handle.snapshot();

    assert_eq!(progress.errors.len(), 1);
    assert!(dir.path().join("src_dir/inner.txt").exists(), "source must be left untouched on refusal");
}

#[tokio::test]
async fn cancelling_a_multi_file_batch_stops_further_processing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("out")).unwrap();
    for i in 0..20 {
        std::fs::write(dir.path().join(format!("f{i}.txt")), b"x").unwrap();
    }
    let sources: Vec<Path> = (0..20).map(|i| Path::parse(dir.path().join(format!("f{i}.txt")).to_str().unwrap())).collect();
    let dest_dir = Path::parse(dir.path().join("out").to_str().unwrap());

    let handle = batch::spawn(BatchKind::Copy, sources, Some(dest_dir), registry(), cache(), Handle::current());
    handle.cancel();
    handle.join();
    // No assertion on exact progress count (the race is inherent), only
    // that cancelling never hangs and never panics.
}
