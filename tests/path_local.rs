//! Path parsing/parent/name invariants and the local backend's
//! `exists == is_file || is_dir` contract (Testable Properties 1-2).

use tfm::path::registry::BackendRegistry;
use tfm::path::{Backend, Path};

#[test]
fn parent_of_parent_joined_with_name_round_trips() {
    for raw in ["/a/b/c.txt", "/a/b/c/", "/solo"] {
        let p = Path::parse(raw);
        let rejoined = p.parent().join(&p.name());
        assert_eq!(rejoined.key(), p.key(), "failed for {raw}");
    }
}

#[test]
fn root_is_its_own_parent_for_every_scheme() {
    for raw in ["/", "s3://bucket/", "sftp://host/"] {
        let p = Path::parse(raw);
        assert_eq!(p.parent(), p, "failed for {raw}");
    }
}

#[test]
fn uri_round_trip_is_stable_across_schemes() {
    for raw in ["/var/log/syslog", "s3://bucket/k1/k2", "sftp://user@host:22/x/y", "archive://id/inner/file.txt"] {
        let p = Path::parse(raw);
        let again = Path::parse(&p.to_uri_string());
        assert_eq!(p, again, "failed for {raw}");
    }
}

#[tokio::test]
async fn exists_matches_is_file_or_is_dir_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("f.txt"), b"x").unwrap();
    std::fs::create_dir(dir.path().join("d")).unwrap();

    let registry = BackendRegistry::new();
    let file = Path::parse(dir.path().join("f.txt").to_str().unwrap());
    let subdir = Path::parse(dir.path().join("d").to_str().unwrap());
    let missing = Path::parse(dir.path().join("nope").to_str().unwrap());

    for p in [&file, &subdir, &missing] {
        let backend = registry.resolve(p).unwrap();
        let exists = backend.exists(p).await.unwrap();
        let is_file = backend.is_file(p).await.unwrap();
        let is_dir = backend.is_dir(p).await.unwrap();
        assert_eq!(exists, is_file || is_dir, "failed for {p}");
    }
}

#[test]
fn unregistered_remote_scheme_is_never_a_panic() {
    let registry = BackendRegistry::new();
    let path = Path::parse("sftp://unknown-host/some/path");
    assert!(registry.resolve(&path).is_err());
}
