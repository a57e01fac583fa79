//! Metadata cache: put/get, TTL expiry, key identity between the
//! `iterdir`-caused pre-population and a later standalone `stat`, and
//! write-invalidation (Testable Properties 3-5).

use std::time::Duration;

use tfm::cache::{CacheKey, CachedValue, MetadataCache, Op};
use tfm::path::Stat;

fn stat(size: u64) -> Stat {
    Stat { size, mtime: None, is_dir: false }
}

#[test]
fn put_then_get_round_trips_within_ttl() {
    let cache = MetadataCache::new(100, Duration::from_secs(60));
    let key = CacheKey::new(Op::Stat, "bucket", "a/b.txt");
    cache.put(key.clone(), CachedValue::Stat(stat(42)));
    assert_eq!(cache.get(&key).unwrap().as_stat().unwrap().size, 42);
}

#[test]
fn entry_expires_after_its_ttl_elapses() {
    let cache = MetadataCache::new(100, Duration::from_secs(60));
    let key = CacheKey::new(Op::Stat, "bucket", "a/b.txt");
    cache.put_with_ttl(key.clone(), CachedValue::Stat(stat(1)), Duration::from_millis(5));
    std::thread::sleep(Duration::from_millis(100));
    assert!(cache.get(&key).is_none());
}

#[test]
fn list_and_stat_keys_for_the_same_object_key_never_alias() {
    let cache = MetadataCache::new(100, Duration::from_secs(60));
    let list_key = CacheKey::new(Op::List, "bucket", "dir/");
    let stat_key = CacheKey::new(Op::Stat, "bucket", "dir/");
    cache.put(list_key.clone(), CachedValue::Listing(vec![]));
    cache.put(stat_key.clone(), CachedValue::Stat(stat(7)));
    assert!(cache.get(&list_key).unwrap().as_listing().is_some());
    assert_eq!(cache.get(&stat_key).unwrap().as_stat().unwrap().size, 7);
}

/// Models the "iterdir pre-populates stat entries, a later standalone
/// `stat` call hits the same key" discipline: a listing's children are
/// cached under the exact `(Op::Stat, bucket, key)` a follow-up `stat`
/// would construct, so the two never miss each other over a key
/// formatting mismatch (trailing slash, relative vs. absolute, ...).
#[test]
fn iterdir_precached_stat_keys_match_a_standalone_stat_lookup() {
    let cache = MetadataCache::new(100, Duration::from_secs(60));
    let bucket = "bucket";
    let children = ["dir/a.txt", "dir/b.txt"];
    for (i, key) in children.iter().enumerate() {
        cache.put(CacheKey::new(Op::Stat, bucket, *key), CachedValue::Stat(stat(i as u64)));
    }
    for (i, key) in children.iter().enumerate() {
        let lookup = CacheKey::new(Op::Stat, bucket, *key);
        assert_eq!(cache.get(&lookup).unwrap().as_stat().unwrap().size, i as u64);
    }
}

#[test]
fn invalidate_prefix_drops_the_listing_and_every_child_stat() {
    let cache = MetadataCache::new(100, Duration::from_secs(60));
    let listing = CacheKey::new(Op::List, "bucket", "dir/");
    let child = CacheKey::new(Op::Stat, "bucket", "dir/a.txt");
    let unrelated = CacheKey::new(Op::Stat, "bucket", "other/b.txt");
    cache.put(listing.clone(), CachedValue::Listing(vec![]));
    cache.put(child.clone(), CachedValue::Stat(stat(1)));
    cache.put(unrelated.clone(), CachedValue::Stat(stat(2)));

    cache.invalidate_prefix("bucket", "dir/");

    assert!(cache.get(&listing).is_none());
    assert!(cache.get(&child).is_none());
    assert!(cache.get(&unrelated).is_some());
}

#[test]
fn max_capacity_is_reported_back_through_stats() {
    let cache = MetadataCache::new(250, Duration::from_secs(30));
    let stats = cache.stats();
    assert_eq!(stats.max_capacity, 250);
    assert_eq!(stats.default_ttl, Duration::from_secs(30));
}
