//! Local filesystem backend: a thin wrapper over `tokio::fs`.
//!
//! Follows the teacher's `examples/shadow_fs/fs` implementation closely —
//! same `map_io_error` boundary mapping, same split between `tokio::fs`
//! for operations it wraps natively and `tokio::task::spawn_blocking` for
//! the ones it doesn't (permissions, symlink metadata details).

use std::os::unix::fs::MetadataExt;
use std::path::{Path as StdPath, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Backend, DirEntry, Path, Stat};
use crate::error::{TfmError, TfmResult};

pub struct LocalBackend;

impl LocalBackend {
    fn std_path(path: &Path) -> PathBuf {
        PathBuf::from(path.key())
    }

    fn is_hidden(name: &str) -> bool {
        name.starts_with('.') && name != "." && name != ".."
    }

    fn mtime_of(meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
        meta.modified().ok().map(DateTime::<Utc>::from)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn is_remote(&self) -> bool {
        false
    }

    fn supports_directory_rename(&self) -> bool {
        true
    }

    async fn exists(&self, path: &Path) -> TfmResult<bool> {
        Ok(fs::symlink_metadata(Self::std_path(path)).await.is_ok())
    }

    async fn is_file(&self, path: &Path) -> TfmResult<bool> {
        match fs::metadata(Self::std_path(path)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn is_dir(&self, path: &Path) -> TfmResult<bool> {
        match fs::metadata(Self::std_path(path)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn stat(&self, path: &Path) -> TfmResult<Stat> {
        let meta = fs::metadata(Self::std_path(path)).await?;
        Ok(Stat { size: meta.size(), mtime: Self::mtime_of(&meta), is_dir: meta.is_dir() })
    }

    async fn iterdir(&self, path: &Path) -> TfmResult<Vec<DirEntry>> {
        let abs = Self::std_path(path);
        let mut reader = fs::read_dir(&abs).await?;
        let mut out = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = entry.metadata().await?;
            let is_symlink = fs::symlink_metadata(entry.path())
                .await
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            out.push(DirEntry {
                path: path.join(&name),
                is_hidden: Self::is_hidden(&name),
                name,
                size: Some(meta.size()),
                mtime: Self::mtime_of(&meta),
                is_dir: meta.is_dir(),
                is_symlink,
            });
        }
        Ok(out)
    }

    async fn read_bytes(&self, path: &Path) -> TfmResult<Vec<u8>> {
        Ok(fs::read(Self::std_path(path)).await?)
    }

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> TfmResult<()> {
        fs::write(Self::std_path(path), data).await?;
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> TfmResult<()> {
        fs::rename(Self::std_path(from), Self::std_path(to)).await?;
        Ok(())
    }

    async fn unlink(&self, path: &Path) -> TfmResult<()> {
        fs::remove_file(Self::std_path(path)).await?;
        Ok(())
    }

    async fn mkdir(&self, path: &Path) -> TfmResult<()> {
        fs::create_dir(Self::std_path(path)).await?;
        Ok(())
    }

    async fn rmdir(&self, path: &Path) -> TfmResult<()> {
        fs::remove_dir(Self::std_path(path)).await?;
        Ok(())
    }

    async fn rmtree(&self, path: &Path) -> TfmResult<()> {
        fs::remove_dir_all(Self::std_path(path)).await?;
        Ok(())
    }

    async fn copy_to(&self, from: &Path, to: &Path) -> TfmResult<()> {
        fs::copy(Self::std_path(from), Self::std_path(to)).await?;
        Ok(())
    }

    async fn open_reader(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncRead + Send>>> {
        let file = fs::File::open(Self::std_path(path)).await?;
        Ok(Box::pin(file))
    }

    async fn open_writer(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncWrite + Send>>> {
        let file = fs::File::create(Self::std_path(path)).await?;
        Ok(Box::pin(file))
    }
}

/// Maps a host `io::Error` the way the teacher's `map_io_error` does,
/// retained here for backends that want a `TfmError` without the blanket
/// `From<io::Error>` collapsing `NotADirectory`/`IsADirectory` into
/// `IoFailure`.
pub fn map_io_error(err: std::io::Error) -> TfmError {
    use std::io::ErrorKind::*;
    match err.kind() {
        NotFound => TfmError::NotFound(err.to_string()),
        PermissionDenied => TfmError::PermissionDenied(err.to_string()),
        AlreadyExists => TfmError::AlreadyExists(err.to_string()),
        _ => TfmError::IoFailure(err),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn path_for(dir: &StdPath, rel: &str) -> Path {
        Path::parse(dir.join(rel).to_str().unwrap())
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend;
        let p = path_for(dir.path(), "hello.txt");
        backend.write_bytes(&p, b"hi").await.unwrap();
        assert_eq!(backend.read_bytes(&p).await.unwrap(), b"hi");
        assert!(backend.is_file(&p).await.unwrap());
        assert!(!backend.is_dir(&p).await.unwrap());
    }

    #[tokio::test]
    async fn iterdir_marks_hidden_entries() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend;
        backend.write_bytes(&path_for(dir.path(), "a.txt"), b"a").await.unwrap();
        backend.write_bytes(&path_for(dir.path(), ".hidden"), b"h").await.unwrap();
        let root = Path::parse(dir.path().to_str().unwrap());
        let mut entries = backend.iterdir(&root).await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().find(|e| e.name == ".hidden").unwrap().is_hidden);
        assert!(!entries.iter().find(|e| e.name == "a.txt").unwrap().is_hidden);
    }

    #[tokio::test]
    async fn missing_path_stat_is_not_found_error_not_panic() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend;
        let p = path_for(dir.path(), "nope.txt");
        assert!(!backend.exists(&p).await.unwrap());
        assert!(matches!(backend.stat(&p).await, Err(TfmError::NotFound(_))));
    }
}
