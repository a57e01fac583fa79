//! S3 object-store backend (§4.1 "remote object store"): virtual
//! directories derived from `/`-delimited listings, no native rename,
//! cross-key copy via the service's native `CopyObject`.
//!
//! The teacher has no analogue for a remote backend — this module is
//! grounded on `examples/other_examples/manifests/saworbit-orbit`'s
//! `s3-native` feature (`aws-sdk-s3` + `aws-config`, rustls), the only
//! S3-capable manifest in the pack.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

use super::{Backend, DirEntry, Path, Stat};
use crate::cache::{CacheKey, CachedValue, MetadataCache, Op, VIRTUAL_DIR_TTL};
use crate::error::{TfmError, TfmResult};

const LIST_BATCH: usize = 1000;
const DELETE_BATCH: usize = 1000;

/// One bucket's worth of S3 access, sharing a client and a metadata
/// cache across every `Path` pointed at it.
pub struct S3Backend {
    client: Client,
    bucket: String,
    cache: Arc<MetadataCache>,
}

impl S3Backend {
    pub fn new(client: Client, bucket: impl Into<String>, cache: Arc<MetadataCache>) -> Self {
        S3Backend { client, bucket: bucket.into(), cache }
    }

    fn object_key(path: &Path) -> String {
        path.key().trim_start_matches('/').to_string()
    }

    fn prefix_key(path: &Path) -> String {
        let key = Self::object_key(path);
        if key.is_empty() || key.ends_with('/') {
            key
        } else {
            format!("{key}/")
        }
    }

    fn stat_cache_key(&self, path: &Path) -> CacheKey {
        CacheKey::new(Op::Stat, &self.bucket, Self::object_key(path))
    }

    fn list_cache_key(&self, path: &Path) -> CacheKey {
        CacheKey::new(Op::List, &self.bucket, Self::prefix_key(path))
    }

    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> TfmError {
        TfmError::IoFailure(std::io::Error::other(format!("{context}: {err}")))
    }
}

#[async_trait]
impl Backend for S3Backend {
    fn is_remote(&self) -> bool {
        true
    }

    fn supports_directory_rename(&self) -> bool {
        false
    }

    async fn exists(&self, path: &Path) -> TfmResult<bool> {
        match self.is_file(path).await? {
            true => Ok(true),
            false => self.is_dir(path).await,
        }
    }

    async fn is_file(&self, path: &Path) -> TfmResult<bool> {
        match self.stat(path).await {
            Ok(stat) => Ok(!stat.is_dir),
            Err(TfmError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn is_dir(&self, path: &Path) -> TfmResult<bool> {
        if let Some(cached) = self.cache.get(&self.stat_cache_key(path)) {
            if let Some(stat) = cached.as_stat() {
                return Ok(stat.is_dir);
            }
        }
        // A key is a virtual directory iff at least one object exists
        // under its `/`-terminated prefix (§4.1: "no object named
        // exactly that key exists").
        let prefix = Self::prefix_key(path);
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;
        let is_dir = resp.contents().first().is_some() || resp.common_prefixes().first().is_some();
        if is_dir {
            self.cache.put_with_ttl(
                self.stat_cache_key(path),
                CachedValue::Stat(Stat { size: 0, mtime: None, is_dir: true }),
                VIRTUAL_DIR_TTL,
            );
        }
        Ok(is_dir)
    }

    async fn stat(&self, path: &Path) -> TfmResult<Stat> {
        if let Some(cached) = self.cache.get(&self.stat_cache_key(path)) {
            if let Some(stat) = cached.as_stat() {
                return Ok(stat.clone());
            }
        }
        let key = Self::object_key(path);
        // A `/`-terminated (or empty, i.e. bucket root) key is always a
        // prefix, never an object name — §4.1: "a virtual directory
        // never triggers a head_object call".
        if key.is_empty() || key.ends_with('/') {
            return if self.is_dir(path).await? {
                Ok(Stat { size: 0, mtime: None, is_dir: true })
            } else {
                Err(TfmError::NotFound(path.to_string()))
            };
        }
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(resp) => {
                let stat = Stat {
                    size: resp.content_length().unwrap_or(0).max(0) as u64,
                    mtime: resp.last_modified().and_then(|t| {
                        DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())
                    }),
                    is_dir: false,
                };
                self.cache.put(self.stat_cache_key(path), CachedValue::Stat(stat.clone()));
                Ok(stat)
            }
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_not_found() {
                        return if self.is_dir(path).await? {
                            Ok(Stat { size: 0, mtime: None, is_dir: true })
                        } else {
                            Err(TfmError::NotFound(path.to_string()))
                        };
                    }
                }
                Err(Self::map_sdk_error("head_object", err))
            }
        }
    }

    /// Single-level listing via a delimited `ListObjectsV2` call.
    /// Critically, every child's `stat` is pre-populated into the cache
    /// under the exact key `stat()` will later look up — the key
    /// discipline §4.2/§8 property 5 requires.
    async fn iterdir(&self, path: &Path) -> TfmResult<Vec<DirEntry>> {
        if let Some(cached) = self.cache.get(&self.list_cache_key(path)) {
            if let Some(listing) = cached.as_listing() {
                return Ok(listing.to_vec());
            }
        }

        let prefix = Self::prefix_key(path);
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter("/")
                .max_keys(LIST_BATCH as i32);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;

            for common in resp.common_prefixes() {
                let Some(full_prefix) = common.prefix() else { continue };
                let name = full_prefix.trim_end_matches('/').rsplit('/').next().unwrap_or("").to_string();
                if name.is_empty() {
                    continue;
                }
                let child = path.join(&name);
                let dir_stat = Stat { size: 0, mtime: None, is_dir: true };
                self.cache.put_with_ttl(
                    self.stat_cache_key(&child),
                    CachedValue::Stat(dir_stat.clone()),
                    VIRTUAL_DIR_TTL,
                );
                entries.push(DirEntry {
                    path: child,
                    name: name.clone(),
                    size: None,
                    mtime: None,
                    is_dir: true,
                    is_symlink: false,
                    is_hidden: name.starts_with('.'),
                });
            }

            for obj in resp.contents() {
                let Some(full_key) = obj.key() else { continue };
                if full_key == prefix {
                    continue;
                }
                let name = full_key.rsplit('/').next().unwrap_or(full_key).to_string();
                if name.is_empty() {
                    continue;
                }
                let child = path.join(&name);
                let size = obj.size().unwrap_or(0).max(0) as u64;
                let mtime = obj
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));
                let file_stat = Stat { size, mtime, is_dir: false };
                self.cache.put(self.stat_cache_key(&child), CachedValue::Stat(file_stat));
                entries.push(DirEntry {
                    path: child,
                    is_hidden: name.starts_with('.'),
                    name,
                    size: Some(size),
                    mtime,
                    is_dir: false,
                    is_symlink: false,
                });
            }

            continuation = resp.next_continuation_token().map(str::to_string);
            if continuation.is_none() {
                break;
            }
        }

        self.cache.put_with_ttl(
            self.list_cache_key(path),
            CachedValue::Listing(entries.clone()),
            VIRTUAL_DIR_TTL,
        );
        Ok(entries)
    }

    async fn read_bytes(&self, path: &Path) -> TfmResult<Vec<u8>> {
        let key = Self::object_key(path);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("get_object", e))?;
        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| TfmError::IoFailure(std::io::Error::other(e.to_string())))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn write_bytes(&self, path: &Path, data: &[u8]) -> TfmResult<()> {
        let key = Self::object_key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("put_object", e))?;
        self.cache.invalidate_key(&self.bucket, &key);
        self.cache.invalidate_prefix(&self.bucket, &Self::prefix_key(&path.parent()));
        Ok(())
    }

    /// No native rename on object stores: implemented as copy + delete
    /// (§4.1 "Object stores: implemented as copy-then-delete of the
    /// single object; no native rename primitive").
    async fn rename(&self, from: &Path, to: &Path) -> TfmResult<()> {
        if self.is_dir(from).await? {
            return Err(TfmError::Unsupported(
                "directory rename is not supported on object-store backends".into(),
            ));
        }
        self.copy_to(from, to).await?;
        self.unlink(from).await?;
        Ok(())
    }

    async fn unlink(&self, path: &Path) -> TfmResult<()> {
        let key = Self::object_key(path);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("delete_object", e))?;
        self.cache.invalidate_key(&self.bucket, &key);
        self.cache.invalidate_prefix(&self.bucket, &Self::prefix_key(&path.parent()));
        Ok(())
    }

    /// Object stores have no real directories to create; a zero-byte
    /// marker object keeps the virtual directory visible when empty.
    async fn mkdir(&self, path: &Path) -> TfmResult<()> {
        let marker_key = Self::prefix_key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&marker_key)
            .body(ByteStream::from(Vec::new()))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("put_object(mkdir marker)", e))?;
        self.cache.invalidate_prefix(&self.bucket, &Self::prefix_key(&path.parent()));
        Ok(())
    }

    async fn rmdir(&self, path: &Path) -> TfmResult<()> {
        let entries = self.iterdir(path).await?;
        if !entries.is_empty() {
            return Err(TfmError::Unsupported(format!("{path} is not empty")));
        }
        let marker_key = Self::prefix_key(path);
        let _ = self.client.delete_object().bucket(&self.bucket).key(&marker_key).send().await;
        self.cache.invalidate_prefix(&self.bucket, &marker_key);
        self.cache.invalidate_prefix(&self.bucket, &Self::prefix_key(&path.parent()));
        Ok(())
    }

    /// Recursive delete via batched `DeleteObjects` over paginated
    /// listings (§4.2: batched delete of ~1000 keys per call).
    async fn rmtree(&self, path: &Path) -> TfmResult<()> {
        use aws_sdk_s3::types::{Delete, ObjectIdentifier};

        let prefix = Self::prefix_key(path);
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .max_keys(DELETE_BATCH as i32);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;

            let ids: Vec<ObjectIdentifier> = resp
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .filter_map(|k| ObjectIdentifier::builder().key(k).build().ok())
                .collect();
            if !ids.is_empty() {
                let delete = Delete::builder()
                    .set_objects(Some(ids))
                    .build()
                    .map_err(|e| Self::map_sdk_error("delete batch build", e))?;
                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error("delete_objects", e))?;
            }

            continuation = resp.next_continuation_token().map(str::to_string);
            if continuation.is_none() {
                break;
            }
        }
        self.cache.invalidate_prefix(&self.bucket, &prefix);
        self.cache.invalidate_prefix(&self.bucket, &Self::prefix_key(&path.parent()));
        Ok(())
    }

    /// Server-side copy within the same bucket; cross-backend copies
    /// never call this (they go through `copy_between` at the `Path`
    /// layer instead).
    async fn copy_to(&self, from: &Path, to: &Path) -> TfmResult<()> {
        let source = format!("{}/{}", self.bucket, Self::object_key(from));
        let dest_key = Self::object_key(to);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&source)
            .key(&dest_key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("copy_object", e))?;
        self.cache.invalidate_key(&self.bucket, &dest_key);
        self.cache.invalidate_prefix(&self.bucket, &Self::prefix_key(&to.parent()));
        Ok(())
    }

    async fn open_reader(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncRead + Send>>> {
        let key = Self::object_key(path);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error("get_object", e))?;
        Ok(Box::pin(resp.body.into_async_read()))
    }

    async fn open_writer(&self, path: &Path) -> TfmResult<Pin<Box<dyn AsyncWrite + Send>>> {
        // S3 has no true streaming PUT without multipart upload
        // bookkeeping; batch-copy chunking instead buffers into a
        // pipe-backed writer that flushes as one `put_object` on close.
        // Logged rather than silently approximated, since a caller doing
        // many small writes through this path pays a full buffer cost.
        warn!(path = %path, "S3Backend::open_writer buffers the full object before upload");
        Ok(Box::pin(BufferedPutWriter::new(self.client.clone(), self.bucket.clone(), Self::object_key(path))))
    }
}

/// Accumulates bytes in memory and performs a single `put_object` on
/// `shutdown`/drop-flush, since `aws-sdk-s3`'s `ByteStream` has no
/// incremental-write API that maps onto `AsyncWrite`.
struct BufferedPutWriter {
    client: Client,
    bucket: String,
    key: String,
    buf: Vec<u8>,
    upload: Option<Pin<Box<dyn std::future::Future<Output = TfmResult<()>> + Send>>>,
}

impl BufferedPutWriter {
    fn new(client: Client, bucket: String, key: String) -> Self {
        BufferedPutWriter { client, bucket, key, buf: Vec::new(), upload: None }
    }
}

impl AsyncWrite for BufferedPutWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        this.buf.extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let this = self.get_mut();
        if this.upload.is_none() {
            let client = this.client.clone();
            let bucket = this.bucket.clone();
            let key = this.key.clone();
            let body = std::mem::take(&mut this.buf);
            this.upload = Some(Box::pin(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(ByteStream::from(body))
                    .send()
                    .await
                    .map_err(|e| S3Backend::map_sdk_error("put_object(writer flush)", e))?;
                Ok(())
            }));
        }
        match this.upload.as_mut().unwrap().as_mut().poll(cx) {
            std::task::Poll::Ready(Ok(())) => std::task::Poll::Ready(Ok(())),
            std::task::Poll::Ready(Err(err)) => {
                std::task::Poll::Ready(Err(std::io::Error::other(err.to_string())))
            }
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}
