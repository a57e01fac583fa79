//! Read-only archive-virtual backend (§4.1 "archive container"): zip,
//! tar.gz, and (per the supplemented read support) plain tar and
//! tar.bz2, exposed as a synthetic directory hierarchy over an
//! index built once from the container's central directory / entry
//! list. Every mutating operation fails with `Unsupported` — archives
//! are navigable, not writable, namespaces.
//!
//! The teacher carries no archive code; grounded on
//! `examples/stencila-stencila/Cargo.toml`'s `flate2` dependency for the
//! compression stack.

use std::collections::BTreeMap;
use std::io::Read;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Backend, DirEntry, Path, Stat};
use crate::error::{TfmError, TfmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarPlain,
    TarGz,
    TarBz2,
}

impl ArchiveKind {
    /// Sniffs the container type from its host file name, the way a
    /// file association table matches by extension (§6).
    pub fn from_name(name: &str) -> Option<ArchiveKind> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
            Some(ArchiveKind::TarBz2)
        } else if lower.ends_with(".tar") {
            Some(ArchiveKind::TarPlain)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    size: u64,
    is_dir: bool,
}

/// A fully-enumerated, in-memory index of one archive's contents,
/// keyed by the in-container path (`/`-separated, no leading slash).
/// Built once at open time; the backend never re-reads the container's
/// directory structure for `stat`/`iterdir`, only for `read_bytes`.
pub struct ArchiveIndex {
    host_path: std::path::PathBuf,
    kind: ArchiveKind,
    entries: BTreeMap<String, IndexedEntry>,
}

impl ArchiveIndex {
    pub fn open(host_path: std::path::PathBuf, kind: ArchiveKind) -> TfmResult<Self> {
        let entries = match kind {
            ArchiveKind::Zip => Self::index_zip(&host_path)?,
            ArchiveKind::TarPlain | ArchiveKind::TarGz | ArchiveKind::TarBz2 => {
                Self::index_tar(&host_path, kind)?
            }
        };
        Ok(ArchiveIndex { host_path, kind, entries })
    }

    fn index_zip(host_path: &std::path::Path) -> TfmResult<BTreeMap<String, IndexedEntry>> {
        let file = std::fs::File::open(host_path)?;
        let mut zip = zip::ZipArchive::new(file)?;
        let mut entries = BTreeMap::new();
        for i in 0..zip.len() {
            let entry = zip.by_index(i)?;
            let name = entry.name().trim_end_matches('/').to_string();
            if name.is_empty() {
                continue;
            }
            entries.insert(name, IndexedEntry { size: entry.size(), is_dir: entry.is_dir() });
            Self::insert_ancestor_dirs(&mut entries, &name);
        }
        Ok(entries)
    }

    fn index_tar(
        host_path: &std::path::Path,
        kind: ArchiveKind,
    ) -> TfmResult<BTreeMap<String, IndexedEntry>> {
        let file = std::fs::File::open(host_path)?;
        let mut entries = BTreeMap::new();
        let boxed_reader: Box<dyn Read> = match kind {
            ArchiveKind::TarGz => Box::new(flate2::read::GzDecoder::new(file)),
            ArchiveKind::TarBz2 => {
                return Err(TfmError::Unsupported(
                    "tar.bz2 reading requires a bzip2 decoder not carried in this build".into(),
                ))
            }
            ArchiveKind::TarPlain => Box::new(file),
            ArchiveKind::Zip => unreachable!(),
        };
        let mut archive = tar::Archive::new(boxed_reader);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().trim_end_matches('/').to_string();
            if name.is_empty() {
                continue;
            }
            let is_dir = entry.header().entry_type().is_dir();
            entries.insert(name.clone(), IndexedEntry { size: entry.header().size()?, is_dir });
            Self::insert_ancestor_dirs(&mut entries, &name);
        }
        Ok(entries)
    }

    fn insert_ancestor_dirs(entries: &mut BTreeMap<String, IndexedEntry>, name: &str) {
        let mut parent = name;
        while let Some(idx) = parent.rfind('/') {
            parent = &parent[..idx];
            entries.entry(parent.to_string()).or_insert(IndexedEntry { size: 0, is_dir: true });
        }
    }
}

/// Backend over one already-opened `ArchiveIndex`. `Path::key()` is the
/// in-container path; the host archive file itself is fixed at
/// construction, matching §4.1's "archive paths are scoped to one
/// already-open container, not resolved afresh per path."
pub struct ArchiveBackend {
    index: Arc<ArchiveIndex>,
}

impl ArchiveBackend {
    pub fn new(index: Arc<ArchiveIndex>) -> Self {
        ArchiveBackend { index }
    }

    fn in_container_key(path: &Path) -> String {
        path.key().trim_start_matches('/').to_string()
    }

    fn unsupported(op: &str) -> TfmError {
        TfmError::Unsupported(format!("{op} is not supported on an archive-virtual path"))
    }
}

#[async_trait]
impl Backend for ArchiveBackend {
    fn is_remote(&self) -> bool {
        false
    }

    fn supports_directory_rename(&self) -> bool {
        false
    }

    async fn exists(&self, path: &Path) -> TfmResult<bool> {
        let key = Self::in_container_key(path);
        Ok(key.is_empty() || self.index.entries.contains_key(&key))
    }

    async fn is_file(&self, path: &Path) -> TfmResult<bool> {
        let key = Self::in_container_key(path);
        Ok(self.index.entries.get(&key).map(|e| !e.is_dir).unwrap_or(false))
    }

    async fn is_dir(&self, path: &Path) -> TfmResult<bool> {
        let key = Self::in_container_key(path);
        if key.is_empty() {
            return Ok(true);
        }
        Ok(self.index.entries.get(&key).map(|e| e.is_dir).unwrap_or(false))
    }

    async fn stat(&self, path: &Path) -> TfmResult<Stat> {
        let key = Self::in_container_key(path);
        if key.is_empty() {
            return Ok(Stat { size: 0, mtime: None, is_dir: true });
        }
        let entry = self
            .index
            .entries
            .get(&key)
            .ok_or_else(|| TfmError::NotFound(path.to_string()))?;
        Ok(Stat { size: entry.size, mtime: None, is_dir: entry.is_dir })
    }

    async fn iterdir(&self, path: &Path) -> TfmResult<Vec<DirEntry>> {
        let prefix = Self::in_container_key(path);
        let prefix_with_slash = if prefix.is_empty() { String::new() } else { format!("{prefix}/") };
        let mut out = Vec::new();
        for (key, entry) in &self.index.entries {
            let Some(rest) = key.strip_prefix(prefix_with_slash.as_str()) else { continue };
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            out.push(DirEntry {
                path: path.join(rest),
                name: rest.to_string(),
                size: Some(entry.size),
                mtime: None,
                is_dir: entry.is_dir,
                is_symlink: false,
                is_hidden: rest.starts_with('.'),
            });
        }
        Ok(out)
    }

    async fn read_bytes(&self, path: &Path) -> TfmResult<Vec<u8>> {
        let key = Self::in_container_key(path);
        match self.index.kind {
            ArchiveKind::Zip => {
                let file = std::fs::File::open(&self.index.host_path)?;
                let mut zip = zip::ZipArchive::new(file)?;
                let mut entry = zip.by_name(&key)?;
                let mut buf = Vec::new();
                entry.read_to_end(&mut buf)?;
                Ok(buf)
            }
            ArchiveKind::TarPlain | ArchiveKind::TarGz => {
                let file = std::fs::File::open(&self.index.host_path)?;
                let boxed: Box<dyn Read> = if self.index.kind == ArchiveKind::TarGz {
                    Box::new(flate2::read::GzDecoder::new(file))
                } else {
                    Box::new(file)
                };
                let mut archive = tar::Archive::new(boxed);
                for entry in archive.entries()? {
                    let mut entry = entry?;
                    let name = entry.path()?.to_string_lossy().trim_end_matches('/').to_string();
                    if name == key {
                        let mut buf = Vec::new();
                        entry.read_to_end(&mut buf)?;
                        return Ok(buf);
                    }
                }
                Err(TfmError::NotFound(path.to_string()))
            }
            ArchiveKind::TarBz2 => Err(Self::unsupported("reading a tar.bz2 member")),
        }
    }

    async fn write_bytes(&self, _path: &Path, _data: &[u8]) -> TfmResult<()> {
        Err(Self::unsupported("writing"))
    }

    async fn rename(&self, _from: &Path, _to: &Path) -> TfmResult<()> {
        Err(Self::unsupported("renaming"))
    }

    async fn unlink(&self, _path: &Path) -> TfmResult<()> {
        Err(Self::unsupported("deleting"))
    }

    async fn mkdir(&self, _path: &Path) -> TfmResult<()> {
        Err(Self::unsupported("creating a directory"))
    }

    async fn rmdir(&self, _path: &Path) -> TfmResult<()> {
        Err(Self::unsupported("removing a directory"))
    }

    async fn rmtree(&self, _path: &Path) -> TfmResult<()> {
        Err(Self::unsupported("recursive delete"))
    }

    async fn copy_to(&self, _from: &Path, _to: &Path) -> TfmResult<()> {
        Err(Self::unsupported("copying within an archive"))
    }

    async fn open_writer(&self, _path: &Path) -> TfmResult<Pin<Box<dyn AsyncWrite + Send>>> {
        Err(Self::unsupported("writing"))
    }

    async fn open_reader(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncRead + Send>>> {
        let data = self.read_bytes(path).await?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_from_name_recognizes_supported_extensions() {
        assert_eq!(ArchiveKind::from_name("a.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_name("a.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("a.tgz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("a.tar"), Some(ArchiveKind::TarPlain));
        assert_eq!(ArchiveKind::from_name("a.tar.bz2"), Some(ArchiveKind::TarBz2));
        assert_eq!(ArchiveKind::from_name("a.txt"), None);
    }

    #[test]
    fn ancestor_dirs_are_synthesized() {
        let mut entries = BTreeMap::new();
        entries.insert("a/b/c.txt".to_string(), IndexedEntry { size: 3, is_dir: false });
        ArchiveIndex::insert_ancestor_dirs(&mut entries, "a/b/c.txt");
        assert!(entries.get("a").unwrap().is_dir);
        assert!(entries.get("a/b").unwrap().is_dir);
    }
}
