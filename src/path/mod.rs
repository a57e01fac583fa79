//! Polymorphic path layer (§4.1): one `Path` value type and one
//! capability trait (`Backend`) dispatched over a tagged backend handle.
//!
//! Mirrors the teacher's `vfs::Vfs` trait in spirit — a single
//! capability interface instead of a class hierarchy — but the
//! operations are filesystem-shaped (stat/iterdir/rename/...) rather
//! than NFS-procedure-shaped.

pub mod archive;
pub mod local;
pub mod registry;
pub mod s3;
pub mod sftp;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{TfmError, TfmResult};

/// Maximum bytes read into memory by the default `open_reader`/`open_writer`
/// fallback before a backend is expected to provide its own streaming impl.
const DEFAULT_STREAM_FALLBACK_CAP: usize = 64 * 1024 * 1024;

/// A value-like handle to a location in one of the supported namespaces.
///
/// Cheap to clone, does not own any I/O resource. Equality and hashing are
/// textual on the normalized URI (§3: "Equality is textual on the
/// normalized URI").
#[derive(Clone, Eq)]
pub struct Path {
    /// `<scheme>://<authority>/<key>`, or a bare local path when the
    /// scheme is the implicit `file` scheme.
    scheme: Arc<str>,
    authority: Option<Arc<str>>,
    key: Arc<str>,
}

impl Path {
    /// Parse a URI or bare local path into a `Path`. Purely syntactic:
    /// performs no I/O and never fails (an unparsable authority just
    /// ends up part of the key, same as a backend would reject it later
    /// with a typed error when an operation is attempted).
    pub fn parse(input: &str) -> Path {
        if let Some(rest) = input.strip_prefix("s3://") {
            Self::split_remote("s3", rest)
        } else if let Some(rest) = input.strip_prefix("sftp://") {
            Self::split_remote("sftp", rest)
        } else if let Some(rest) = input.strip_prefix("ssh://") {
            Self::split_remote("sftp", rest)
        } else if let Some(rest) = input.strip_prefix("archive://") {
            Self::split_remote("archive", rest)
        } else if let Some(rest) = input.strip_prefix("file://") {
            Path { scheme: "file".into(), authority: None, key: rest.into() }
        } else {
            Path { scheme: "file".into(), authority: None, key: input.into() }
        }
    }

    fn split_remote(scheme: &str, rest: &str) -> Path {
        match rest.find('/') {
            Some(idx) => Path {
                scheme: scheme.into(),
                authority: Some(rest[..idx].into()),
                key: rest[idx..].into(),
            },
            None => Path { scheme: scheme.into(), authority: Some(rest.into()), key: "/".into() },
        }
    }

    /// Construct a path directly from parts, e.g. when a backend builds a
    /// child path from a parent it already holds.
    pub fn from_parts(scheme: &str, authority: Option<&str>, key: &str) -> Path {
        Path { scheme: scheme.into(), authority: authority.map(Into::into), key: key.into() }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// The scheme-specific identifier: a filesystem path for `file`, an
    /// object key for `s3`, a remote path for `sftp`, an in-container
    /// path for `archive`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.scheme.as_ref(), "s3" | "sftp")
    }

    /// Last path component, with exactly one trailing `/` stripped first.
    /// Root directories have an empty name (§4.1).
    pub fn name(&self) -> String {
        let trimmed = Self::strip_one_trailing_slash(&self.key);
        match trimmed.rfind('/') {
            Some(idx) => trimmed[idx + 1..].to_string(),
            None => trimmed.to_string(),
        }
    }

    /// Parent path: strip one trailing `/`, drop the last component,
    /// re-append a trailing `/` for directory-style remote/archive keys.
    /// The parent of a bucket/archive/filesystem root is itself.
    pub fn parent(&self) -> Path {
        let trimmed = Self::strip_one_trailing_slash(&self.key);
        if trimmed.is_empty() || trimmed == "/" {
            return self.clone();
        }
        let directory_style = self.is_remote() || self.scheme.as_ref() == "archive";
        match trimmed.rfind('/') {
            Some(0) => Path { key: "/".into(), ..self.clone() },
            Some(idx) => {
                let mut parent_key = trimmed[..idx].to_string();
                if directory_style {
                    parent_key.push('/');
                }
                Path { key: parent_key.into(), ..self.clone() }
            }
            None => Path { key: "".into(), ..self.clone() },
        }
    }

    /// Append a single path component, normalizing the separator so the
    /// result never contains a doubled `/`.
    pub fn join(&self, segment: &str) -> Path {
        let base = self.key.trim_end_matches('/');
        let seg = segment.trim_start_matches('/');
        let joined = if base.is_empty() { seg.to_string() } else { format!("{base}/{seg}") };
        Path { key: joined.into(), ..self.clone() }
    }

    /// All non-empty path components, in order.
    pub fn parts(&self) -> Vec<String> {
        self.key.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
    }

    /// Extension of the final component, without the leading dot.
    pub fn suffix(&self) -> Option<String> {
        let name = self.name();
        let dot = name.rfind('.')?;
        if dot == 0 {
            None
        } else {
            Some(name[dot + 1..].to_string())
        }
    }

    /// Final component with its extension (if any) removed.
    pub fn stem(&self) -> String {
        let name = self.name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(dot) => name[..dot].to_string(),
        }
    }

    /// Human-facing label for a status line: name, falling back to the
    /// whole key for roots whose name is empty.
    pub fn display_name(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            self.key.to_string()
        } else {
            name
        }
    }

    fn strip_one_trailing_slash(key: &str) -> &str {
        if key.len() > 1 {
            key.strip_suffix('/').unwrap_or(key)
        } else {
            key
        }
    }

    /// Re-render as the string form that `parse` would accept (§8
    /// round-trip property).
    pub fn to_uri_string(&self) -> String {
        match (self.scheme.as_ref(), &self.authority) {
            ("file", _) => self.key.to_string(),
            (scheme, Some(authority)) => format!("{scheme}://{authority}{}", self.key),
            (scheme, None) => format!("{scheme}://{}", self.key),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri_string())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Path").field(&self.to_uri_string()).finish()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.to_uri_string() == other.to_uri_string()
    }
}

impl std::hash::Hash for Path {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_uri_string().hash(state);
    }
}

/// Result of a `stat` call (§3 Metadata cache entry / §4.1 contract).
#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

/// One row yielded by `iterdir` (§3 File entry, sans sort/selection state
/// which belongs to the pane, not the backend).
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub path: Path,
    pub name: String,
    pub size: Option<u64>,
    pub mtime: Option<DateTime<Utc>>,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub is_hidden: bool,
}

/// Capability set every backend must answer (§4.1). Dispatch is a trait
/// object, not inheritance — `Path` holds an `Arc<dyn Backend>` it was
/// resolved against, not a subclass instance.
#[async_trait]
pub trait Backend: Send + Sync {
    fn is_remote(&self) -> bool;

    fn supports_directory_rename(&self) -> bool;

    async fn exists(&self, path: &Path) -> TfmResult<bool>;

    async fn is_file(&self, path: &Path) -> TfmResult<bool>;

    async fn is_dir(&self, path: &Path) -> TfmResult<bool>;

    async fn stat(&self, path: &Path) -> TfmResult<Stat>;

    /// Single-level, non-recursive listing.
    async fn iterdir(&self, path: &Path) -> TfmResult<Vec<DirEntry>>;

    async fn read_bytes(&self, path: &Path) -> TfmResult<Vec<u8>>;

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> TfmResult<()>;

    async fn rename(&self, from: &Path, to: &Path) -> TfmResult<()>;

    async fn unlink(&self, path: &Path) -> TfmResult<()>;

    async fn mkdir(&self, path: &Path) -> TfmResult<()>;

    async fn rmdir(&self, path: &Path) -> TfmResult<()>;

    async fn rmtree(&self, path: &Path) -> TfmResult<()>;

    /// Same-backend copy; cross-backend copy is implemented once at the
    /// `Path`-layer level (`copy_between`) via `read_bytes`/`write_bytes`,
    /// never by one backend reaching into another.
    async fn copy_to(&self, from: &Path, to: &Path) -> TfmResult<()>;

    /// Streaming reader for batch-copy chunking. Default falls back to
    /// `read_bytes`, capped so a runaway default never buffers an
    /// unbounded file; backends with genuine streaming I/O (local, S3,
    /// SFTP) override this.
    async fn open_reader(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncRead + Send>>> {
        let data = self.read_bytes(path).await?;
        if data.len() > DEFAULT_STREAM_FALLBACK_CAP {
            return Err(TfmError::LimitExceeded(format!(
                "{path} exceeds the non-streaming fallback reader cap"
            )));
        }
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    /// Streaming writer counterpart to `open_reader`.
    async fn open_writer(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncWrite + Send>>>;
}

/// Implemented once at the `Path` facade level (§4.1: "Cross-backend
/// operations ... are implemented at the Path-layer level ... never by
/// reaching inside either backend").
pub async fn copy_between(
    from_backend: &dyn Backend,
    from: &Path,
    to_backend: &dyn Backend,
    to: &Path,
) -> TfmResult<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut reader = from_backend.open_reader(from).await?;
    let mut writer = to_backend.open_writer(to).await?;
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = reader.read(&mut buf).await.map_err(TfmError::from)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await.map_err(TfmError::from)?;
    }
    writer.flush().await.map_err(TfmError::from)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_name_and_parent() {
        let p = Path::parse("/a/b/c.txt");
        assert_eq!(p.name(), "c.txt");
        assert_eq!(p.parent().key(), "/a/b");
        assert_eq!(p.suffix().as_deref(), Some("txt"));
        assert_eq!(p.stem(), "c");
    }

    #[test]
    fn trailing_slash_stripped_once() {
        let p = Path::parse("/a/b/");
        assert_eq!(p.name(), "b");
        assert_eq!(p.parent().key(), "/a");
    }

    #[test]
    fn s3_parent_keeps_directory_style_slash() {
        let p = Path::parse("s3://bucket/prefix/child.txt");
        assert_eq!(p.scheme(), "s3");
        assert_eq!(p.authority(), Some("bucket"));
        let parent = p.parent();
        assert_eq!(parent.key(), "/prefix/");
        assert_eq!(parent.name(), "prefix");
    }

    #[test]
    fn root_parent_is_itself() {
        let root = Path::parse("s3://bucket/");
        assert_eq!(root.parent(), root);
    }

    #[test]
    fn join_never_doubles_separator() {
        let p = Path::parse("s3://bucket/prefix/");
        let child = p.join("/child.txt");
        assert_eq!(child.key(), "/prefix/child.txt");
    }

    #[test]
    fn round_trip_parse_to_string_to_parse() {
        for raw in ["/a/b/c", "s3://bucket/k1/k2", "sftp://user@host:22/x/y"] {
            let p = Path::parse(raw);
            let again = Path::parse(&p.to_uri_string());
            assert_eq!(p, again);
        }
    }

    #[test]
    fn parent_joined_with_name_is_original() {
        let p = Path::parse("/a/b/c.txt");
        let rejoined = p.parent().join(&p.name());
        assert_eq!(rejoined, p);
    }
}
