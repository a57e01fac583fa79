//! Scheme registry (§9 "backend resolution"): maps a `Path`'s scheme
//! and authority to the already-constructed `Backend` responsible for
//! it. Construction (opening an SSH session, indexing an archive,
//! building an S3 client) happens once, outside the registry; the
//! registry only remembers the mapping.
//!
//! Grounded on the teacher's `vfs::Vfs` resolution model, where a single
//! mounted filesystem handle serves every NFS request — generalized here
//! to multiple concurrently-mounted backends keyed by scheme+authority.

use std::collections::HashMap;
use std::sync::Arc;

use super::{local::LocalBackend, Backend, Path};
use crate::error::{TfmError, TfmResult};

/// `(scheme, authority)` — `authority` is `None` for the local backend
/// and for any archive mount registered without a distinguishing label.
type RegistryKey = (String, Option<String>);

/// Live set of backends a running session has open. Not itself
/// `Backend`-shaped: `Path` resolution happens through this, and every
/// consumer downstream works against `&dyn Backend`.
pub struct BackendRegistry {
    backends: HashMap<RegistryKey, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        let mut backends: HashMap<RegistryKey, Arc<dyn Backend>> = HashMap::new();
        backends.insert(("file".to_string(), None), Arc::new(LocalBackend));
        BackendRegistry { backends }
    }

    pub fn register(&mut self, scheme: impl Into<String>, authority: Option<String>, backend: Arc<dyn Backend>) {
        self.backends.insert((scheme.into(), authority), backend);
    }

    pub fn unregister(&mut self, scheme: &str, authority: Option<&str>) {
        self.backends.remove(&(scheme.to_string(), authority.map(str::to_string)));
    }

    /// Resolves a `Path` to the backend that owns it. Remote/archive
    /// schemes require a matching registration (§9: "an archive or
    /// remote path with no open backend is a `CredentialsMissing` or
    /// `Unsupported` error, never a panic").
    pub fn resolve(&self, path: &Path) -> TfmResult<Arc<dyn Backend>> {
        let key = (path.scheme().to_string(), path.authority().map(str::to_string));
        self.backends
            .get(&key)
            .cloned()
            .ok_or_else(|| match path.scheme() {
                "s3" | "sftp" => TfmError::CredentialsMissing(format!(
                    "no open backend for {}://{}",
                    path.scheme(),
                    path.authority().unwrap_or("")
                )),
                _ => TfmError::Unsupported(format!("no backend registered for scheme {}", path.scheme())),
            })
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_scheme_resolves_without_registration() {
        let registry = BackendRegistry::new();
        let path = Path::parse("/tmp/x");
        assert!(registry.resolve(&path).is_ok());
    }

    #[test]
    fn unregistered_remote_scheme_is_credentials_missing() {
        let registry = BackendRegistry::new();
        let path = Path::parse("s3://some-bucket/key");
        assert!(matches!(registry.resolve(&path), Err(TfmError::CredentialsMissing(_))));
    }
}
