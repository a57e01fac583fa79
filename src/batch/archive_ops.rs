//! Archive create/extract (§4.4), driven through the same
//! `BatchHandle`/`BatchProgress` machinery as copy/move/delete.
//!
//! Both directions need a synchronous `Write`/`Read` + `Seek` host file
//! (`zip::ZipWriter` requires `Seek` to backpatch its central directory,
//! `tar::Builder` just wants `Write`), so — unlike copy/move, which
//! stream through the async `Backend` trait — the archive container
//! itself is always a local file. Per-file payloads on the source/
//! destination side still go through `Backend::read_bytes`/
//! `write_bytes`, so S3/SFTP members are fully supported; only the
//! container file is constrained to disk.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;

use super::{count_files_pub, BatchHandle, BatchItemError, BatchProgress};
use crate::error::{TfmError, TfmResult};
use crate::path::registry::BackendRegistry;
use crate::path::{Backend, Path};
use crate::util::archive_path::sanitize_extract_target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

pub fn spawn_create(
    format: ArchiveFormat,
    sources: Vec<Path>,
    archive_host_path: std::path::PathBuf,
    registry: Arc<BackendRegistry>,
    runtime: Handle,
) -> BatchHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let progress = Arc::new(Mutex::new(BatchProgress::default()));

    let worker_cancel = cancel.clone();
    let worker_progress = progress.clone();
    let worker = std::thread::spawn(move || {
        runtime.block_on(run_create(format, sources, archive_host_path, registry, worker_cancel, worker_progress.clone()));
        worker_progress.lock().expect("batch progress mutex poisoned").finished = true;
    });

    BatchHandle::from_parts(cancel, progress, worker)
}

pub fn spawn_extract(
    archive_host_path: std::path::PathBuf,
    format: ArchiveFormat,
    destination: Path,
    registry: Arc<BackendRegistry>,
    runtime: Handle,
) -> BatchHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let progress = Arc::new(Mutex::new(BatchProgress::default()));

    let worker_cancel = cancel.clone();
    let worker_progress = progress.clone();
    let worker = std::thread::spawn(move || {
        runtime.block_on(run_extract(archive_host_path, format, destination, registry, worker_cancel, worker_progress.clone()));
        worker_progress.lock().expect("batch progress mutex poisoned").finished = true;
    });

    BatchHandle::from_parts(cancel, progress, worker)
}

async fn run_create(
    format: ArchiveFormat,
    sources: Vec<Path>,
    archive_host_path: std::path::PathBuf,
    registry: Arc<BackendRegistry>,
    cancel: Arc<AtomicBool>,
    progress: Arc<Mutex<BatchProgress>>,
) {
    let mut total = 0u64;
    for source in &sources {
        total += count_files_pub(&registry, source).await;
    }
    progress.lock().expect("batch progress mutex poisoned").total_files = total;

    let mut members = Vec::new();
    for source in &sources {
        // A directory source contributes its own contents at the
        // archive root; a file source contributes itself, named
        // relative to its parent (so the file's own name survives).
        let Ok(backend) = registry.resolve(source) else { continue };
        let relative_root = match backend.is_dir(source).await {
            Ok(true) => source.clone(),
            _ => source.parent(),
        };
        collect_members(&registry, source, &relative_root, &mut members).await;
    }

    let file = match std::fs::File::create(&archive_host_path) {
        Ok(f) => f,
        Err(e) => {
            progress.lock().expect("batch progress mutex poisoned").errors.push(BatchItemError {
                path: Path::parse(archive_host_path.to_string_lossy().as_ref()),
                message: e.to_string(),
            });
            return;
        }
    };

    match format {
        ArchiveFormat::Zip => write_zip(file, &registry, &members, &cancel, &progress).await,
        ArchiveFormat::TarGz => write_tar_gz(file, &registry, &members, &cancel, &progress).await,
    }
}

/// Recursively walks one source, pairing each file with the
/// archive-relative name it should carry, relative to `relative_root`
/// (§4.4: "preserves directory structure relative to each source's
/// parent" — a directory source's own parent is its own contents, so
/// its interior structure is preserved without the directory's own name
/// becoming a leading path component; a file source's parent is its
/// containing directory, so the file's own name is kept).
async fn collect_members(
    registry: &BackendRegistry,
    path: &Path,
    relative_root: &Path,
    out: &mut Vec<(Path, String)>,
) {
    let Ok(backend) = registry.resolve(path) else { return };
    match backend.is_dir(path).await {
        Ok(true) => {
            if let Ok(entries) = backend.iterdir(path).await {
                for entry in entries {
                    Box::pin(collect_members(registry, &entry.path, relative_root, out)).await;
                }
            }
        }
        Ok(false) => {
            let relative = relative_name(relative_root, path);
            out.push((path.clone(), relative));
        }
        Err(_) => {}
    }
}

fn relative_name(root: &Path, path: &Path) -> String {
    let root_key = root.key().trim_end_matches('/');
    let path_key = path.key();
    path_key.strip_prefix(root_key).unwrap_or(path_key).trim_start_matches('/').to_string()
}

async fn write_zip(
    file: std::fs::File,
    registry: &BackendRegistry,
    members: &[(Path, String)],
    cancel: &Arc<AtomicBool>,
    progress: &Arc<Mutex<BatchProgress>>,
) {
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (path, name) in members {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        {
            let mut guard = progress.lock().expect("batch progress mutex poisoned");
            guard.current_item = Some(path.clone());
        }
        if let Err(err) = append_zip_member(&mut zip, registry, path, name, options).await {
            progress
                .lock()
                .expect("batch progress mutex poisoned")
                .errors
                .push(BatchItemError { path: path.clone(), message: err.to_string() });
            continue;
        }
        let mut guard = progress.lock().expect("batch progress mutex poisoned");
        guard.processed += 1;
    }
    let _ = zip.finish();
}

async fn append_zip_member(
    zip: &mut zip::ZipWriter<std::fs::File>,
    registry: &BackendRegistry,
    path: &Path,
    name: &str,
    options: zip::write::SimpleFileOptions,
) -> TfmResult<()> {
    let backend = registry.resolve(path)?;
    let data = backend.read_bytes(path).await?;
    zip.start_file(name, options).map_err(|e| TfmError::DecodingFailure(e.to_string()))?;
    zip.write_all(&data)?;
    Ok(())
}

async fn write_tar_gz(
    file: std::fs::File,
    registry: &BackendRegistry,
    members: &[(Path, String)],
    cancel: &Arc<AtomicBool>,
    progress: &Arc<Mutex<BatchProgress>>,
) {
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, name) in members {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        {
            let mut guard = progress.lock().expect("batch progress mutex poisoned");
            guard.current_item = Some(path.clone());
        }
        if let Err(err) = append_tar_member(&mut builder, registry, path, name).await {
            progress
                .lock()
                .expect("batch progress mutex poisoned")
                .errors
                .push(BatchItemError { path: path.clone(), message: err.to_string() });
            continue;
        }
        let mut guard = progress.lock().expect("batch progress mutex poisoned");
        guard.processed += 1;
    }
    if let Ok(encoder) = builder.into_inner() {
        let _ = encoder.finish();
    }
}

async fn append_tar_member(
    builder: &mut tar::Builder<flate2::write::GzEncoder<std::fs::File>>,
    registry: &BackendRegistry,
    path: &Path,
    name: &str,
) -> TfmResult<()> {
    let backend = registry.resolve(path)?;
    let data = backend.read_bytes(path).await?;
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data.as_slice())?;
    Ok(())
}

async fn run_extract(
    archive_host_path: std::path::PathBuf,
    format: ArchiveFormat,
    destination: Path,
    registry: Arc<BackendRegistry>,
    cancel: Arc<AtomicBool>,
    progress: Arc<Mutex<BatchProgress>>,
) {
    let members = match format {
        ArchiveFormat::Zip => list_zip_members(&archive_host_path),
        ArchiveFormat::TarGz => list_tar_gz_members(&archive_host_path),
    };
    let members = match members {
        Ok(m) => m,
        Err(e) => {
            progress.lock().expect("batch progress mutex poisoned").errors.push(BatchItemError {
                path: destination.clone(),
                message: e.to_string(),
            });
            return;
        }
    };

    progress.lock().expect("batch progress mutex poisoned").total_files = members.len() as u64;

    for name in members {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        let Some(target) = sanitize_extract_target(&destination, &name) else {
            progress.lock().expect("batch progress mutex poisoned").errors.push(BatchItemError {
                path: destination.join(&name),
                message: "archive member escapes destination directory".to_string(),
            });
            continue;
        };
        {
            let mut guard = progress.lock().expect("batch progress mutex poisoned");
            guard.current_item = Some(target.clone());
        }
        let result = extract_one(&archive_host_path, format, &name, &target, &registry).await;
        if let Err(err) = result {
            progress.lock().expect("batch progress mutex poisoned").errors.push(BatchItemError {
                path: target,
                message: err.to_string(),
            });
            continue;
        }
        let mut guard = progress.lock().expect("batch progress mutex poisoned");
        guard.processed += 1;
    }
}

async fn extract_one(
    archive_host_path: &std::path::Path,
    format: ArchiveFormat,
    member_name: &str,
    target: &Path,
    registry: &BackendRegistry,
) -> TfmResult<()> {
    let data = match format {
        ArchiveFormat::Zip => read_zip_member(archive_host_path, member_name)?,
        ArchiveFormat::TarGz => read_tar_gz_member(archive_host_path, member_name)?,
    };
    let backend = registry.resolve(target)?;
    ensure_parent_dirs(backend.as_ref(), target).await?;
    backend.write_bytes(target, &data).await
}

/// Creates every missing ancestor directory of `target`, top-down, so a
/// member nested several levels deep materializes even when the archive
/// never stored its own directory entries.
async fn ensure_parent_dirs(backend: &dyn Backend, target: &Path) -> TfmResult<()> {
    let mut missing = Vec::new();
    let mut current = target.parent();
    loop {
        if backend.is_dir(&current).await.unwrap_or(false) {
            break;
        }
        let next = current.parent();
        if next == current {
            break;
        }
        missing.push(current.clone());
        current = next;
    }
    for dir in missing.into_iter().rev() {
        if let Err(err) = backend.mkdir(&dir).await {
            if !matches!(err, TfmError::AlreadyExists(_)) {
                return Err(err);
            }
        }
    }
    Ok(())
}

fn list_zip_members(host_path: &std::path::Path) -> TfmResult<Vec<String>> {
    let file = std::fs::File::open(host_path)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut names = Vec::new();
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        if !entry.is_dir() {
            names.push(entry.name().to_string());
        }
    }
    Ok(names)
}

fn read_zip_member(host_path: &std::path::Path, name: &str) -> TfmResult<Vec<u8>> {
    let file = std::fs::File::open(host_path)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut entry = zip.by_name(name)?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

fn list_tar_gz_members(host_path: &std::path::Path) -> TfmResult<Vec<String>> {
    let file = std::fs::File::open(host_path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if !entry.header().entry_type().is_dir() {
            names.push(entry.path()?.to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

fn read_tar_gz_member(host_path: &std::path::Path, name: &str) -> TfmResult<Vec<u8>> {
    let file = std::fs::File::open(host_path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_name = entry.path()?.to_string_lossy().into_owned();
        if entry_name == name {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            return Ok(buf);
        }
    }
    Err(TfmError::NotFound(name.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relative_name_strips_parent_prefix() {
        let root = Path::parse("/a/b");
        let file = Path::parse("/a/b/c/d.txt");
        assert_eq!(relative_name(&root, &file), "c/d.txt");
    }
}
