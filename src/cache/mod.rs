//! Per-backend metadata cache (§4.2): TTL + LRU, with the key discipline
//! that makes `iterdir` pre-caching and subsequent `stat` calls collapse
//! into a single backend round trip.
//!
//! The teacher declares a `moka` dependency it never uses (its `Vfs`
//! trait has no caching layer at all, since NFS clients do their own
//! attribute caching) — this module is where TFM actually spends it.

use std::time::{Duration, Instant};

use moka::sync::Cache as MokaCache;
use moka::Expiry;

use crate::path::{DirEntry, Stat};

/// Default TTL for most operations (§4.2 Config: "Default TTL ≈ 60 s").
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Short TTL for virtual-directory stats, which are derived from the
/// first page(s) of a listing and go stale quickly (§4.1: "Cached
/// briefly (≈30 s)").
pub const VIRTUAL_DIR_TTL: Duration = Duration::from_secs(30);

/// Default entry cap (§4.2 Config: "Max entries ≈ 1000").
pub const DEFAULT_MAX_ENTRIES: u64 = 1000;

/// Operation tag, part of the cache key. Kept as an explicit enum rather
/// than a free-form string so `stat` pre-population during `iterdir` and
/// `stat` lookup during a later `stat` call are structurally guaranteed
/// to agree (§4.2 "identical operation tag").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Stat,
    List,
}

/// Deterministic cache key: `(operation, bucket, key, extra params)`
/// (§3 Metadata cache entry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub op: Op,
    pub bucket: String,
    pub object_key: String,
    pub extra: Option<String>,
}

impl CacheKey {
    pub fn new(op: Op, bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        CacheKey { op, bucket: bucket.into(), object_key: object_key.into(), extra: None }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

/// The cached payload. A closed set rather than `Box<dyn Any>` — the
/// cache only ever stores results of the two metadata operations it
/// exists to short-circuit.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Stat(Stat),
    Listing(Vec<DirEntry>),
}

impl CachedValue {
    pub fn as_stat(&self) -> Option<&Stat> {
        match self {
            CachedValue::Stat(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_listing(&self) -> Option<&[DirEntry]> {
        match self {
            CachedValue::Listing(l) => Some(l),
            _ => None,
        }
    }
}

/// Entry as actually stored: the value plus the TTL it was inserted
/// with, so a custom `Expiry` can honor per-operation overrides instead
/// of one cache-wide duration.
#[derive(Debug, Clone)]
struct Entry {
    value: CachedValue,
    ttl: Duration,
}

struct PerEntryExpiry;

impl Expiry<CacheKey, Entry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Entry,
        _current_time: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &Entry,
        _current_time: Instant,
        _current_duration: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub total: u64,
    pub max_capacity: u64,
    pub default_ttl: Duration,
}

/// Thread-safe TTL+LRU store for remote-backend metadata responses.
///
/// Built on `moka::sync::Cache`, which is itself a lock-free concurrent
/// map — this satisfies §4.2's "all cache state is under a re-entrant
/// lock" requirement without TFM needing its own lock on top.
pub struct MetadataCache {
    inner: MokaCache<CacheKey, Entry>,
    default_ttl: Duration,
}

impl MetadataCache {
    pub fn new(max_entries: u64, default_ttl: Duration) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryExpiry)
            .build();
        MetadataCache { inner, default_ttl }
    }

    /// Returns the cached value iff present and not expired; moka
    /// updates recency internally on every successful `get`.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        self.inner.get(key).map(|e| e.value)
    }

    /// Insert or replace with the cache's default TTL.
    pub fn put(&self, key: CacheKey, value: CachedValue) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or replace with a per-call TTL override (§4.2 Config:
    /// "configurable per-operation override: longer for content GET
    /// results, shorter for listings of volatile prefixes").
    pub fn put_with_ttl(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        self.inner.insert(key, Entry { value, ttl });
    }

    pub fn invalidate_key(&self, bucket: &str, key: &str) {
        self.inner.invalidate(&CacheKey::new(Op::Stat, bucket, key));
    }

    pub fn invalidate_prefix(&self, bucket: &str, prefix: &str) {
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        let _ = self
            .inner
            .invalidate_entries_if(move |k, _| k.bucket == bucket && k.object_key.starts_with(&prefix));
    }

    pub fn invalidate_bucket(&self, bucket: &str) {
        let bucket = bucket.to_string();
        let _ = self.inner.invalidate_entries_if(move |k, _| k.bucket == bucket);
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            total: self.inner.entry_count(),
            max_capacity: self.inner.policy().max_capacity().unwrap_or(0),
            default_ttl: self.default_ttl,
        }
    }
}
