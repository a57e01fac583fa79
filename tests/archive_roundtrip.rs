//! Archive create/extract round trip, and the `..`-escape sanitization
//! invariant (§4.4, Testable Property: archive create→extract round
//! trip is lossless for file content).

use std::sync::Arc;
use std::time::Duration;

use tfm::batch::archive_ops::{self, ArchiveFormat};
use tfm::batch::BatchHandle;
use tfm::path::registry::BackendRegistry;
use tfm::path::Path;
use tokio::runtime::Handle;

fn wait_for_finish(handle: &BatchHandle) {
    for _ in 0..500 {
        if handle.snapshot().finished {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("archive batch did not finish in time");
}

async fn round_trip(format: ArchiveFormat, archive_name: &str) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("payload")).unwrap();
    std::fs::write(dir.path().join("payload/a.txt"), b"hello").unwrap();
    std::fs::create_dir(dir.path().join("payload/nested")).unwrap();
    std::fs::write(dir.path().join("payload/nested/b.txt"), b"world").unwrap();

    let registry = Arc::new(BackendRegistry::new());
    let source = Path::parse(dir.path().join("payload").to_str().unwrap());
    let archive_host = dir.path().join(archive_name);

    let create = archive_ops::spawn_create(format, vec![source], archive_host.clone(), registry.clone(), Handle::current());
    wait_for_finish(&create);
    assert!(create.snapshot().errors.is_empty());
    assert!(archive_host.exists());

    let out_dir = dir.path().join("extracted");
    std::fs::create_dir(&out_dir).unwrap();
    let destination = Path::parse(out_dir.to_str().unwrap());

    let extract = archive_ops::spawn_extract(archive_host, format, destination, registry, Handle::current());
    wait_for_finish(&extract);
    assert!(extract.snapshot().errors.is_empty());

    assert_eq!(std::fs::read(out_dir.join("a.txt")).unwrap(), b"hello");
    assert_eq!(std::fs::read(out_dir.join("nested/b.txt")).unwrap(), b"world");
}

#[tokio::test]
async fn zip_create_then_extract_is_lossless() {
    round_trip(ArchiveFormat::Zip, "out.zip").await;
}

#[tokio::test]
async fn tar_gz_create_then_extract_is_lossless() {
    round_trip(ArchiveFormat::TarGz, "out.tar.gz").await;
}

#[tokio::test]
async fn extracting_an_escaping_member_is_rejected_not_written() {
    // Build a zip with one well-behaved member and one that tries to
    // escape the destination via `..`, directly with the `zip` crate
    // rather than through `spawn_create` (which never produces such a
    // member itself).
    let dir = tempfile::tempdir().unwrap();
    let archive_host = dir.path().join("evil.zip");
    {
        let file = std::fs::File::create(&archive_host).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("safe.txt", options).unwrap();
        std::io::Write::write_all(&mut zip, b"safe").unwrap();
        zip.start_file("../../etc/escaped.txt", options).unwrap();
        std::io::Write::write_all(&mut zip, b"evil").unwrap();
        zip.finish().unwrap();
    }

    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();
    let registry = Arc::new(BackendRegistry::new());
    let destination = Path::parse(out_dir.to_str().unwrap());

    let extract = archive_ops::spawn_extract(archive_host, ArchiveFormat::Zip, destination, registry, Handle::current());
    wait_for_finish(&extract);
    let progress = extract.snapshot();

    assert_eq!(progress.processed, 1);
    assert_eq!(progress.errors.len(), 1);
    assert!(out_dir.join("safe.txt").exists());
    assert!(!dir.path().join("etc/escaped.txt").exists());
}
