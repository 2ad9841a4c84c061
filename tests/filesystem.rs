//! Filesystem backend: on-disk layout, persistence and recovery.

use bstore::{BlobId, BlobStore, FetchOptions, FsBackend, FsConfig, ListOptions, StoreError};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> FsConfig {
    FsConfig {
        path: dir.path().join("blobs"),
        cache_size: 100,
        sync_writes: false,
        create_if_missing: true,
    }
}

fn test_backend(dir: &TempDir) -> FsBackend {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    FsBackend::open(test_config(dir)).unwrap()
}

fn shard_dir(root: &Path, id: &BlobId) -> PathBuf {
    let id = id.as_str();
    root.join(&id[0..2])
        .join(&id[2..4])
        .join(&id[4..6])
        .join(&id[6..8])
}

fn content_path(root: &Path, id: &BlobId) -> PathBuf {
    shard_dir(root, id).join(format!("{}.content", id))
}

fn meta_path(root: &Path, id: &BlobId) -> PathBuf {
    shard_dir(root, id).join(format!("{}.meta", id))
}

// --- Layout ---

#[test]
fn test_sidecar_record_fields() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    let props = store.store("sidecar".into()).unwrap();

    let raw = fs::read(meta_path(store.root(), &props.identifier)).unwrap();
    let value: Value = serde_json::from_slice(&raw).unwrap();

    assert_eq!(value["identifier"], props.identifier.as_str());
    assert_eq!(value["size"], 7);
    let created: chrono::DateTime<chrono::Utc> =
        value["createdAt"].as_str().unwrap().parse().unwrap();
    assert_eq!(created, props.created_at);
}

#[test]
fn test_temp_files_are_ignored() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    let props = store.store("real".into()).unwrap();

    let shard = shard_dir(store.root(), &props.identifier);
    fs::write(shard.join(".leftover.meta.tmp-1-1"), b"{").unwrap();
    fs::write(shard.join(".leftover.content.tmp-1-2"), b"junk").unwrap();

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.list(&ListOptions::default()).unwrap().items.len(), 1);
}

// --- Persistence ---

#[test]
fn test_reopen_preserves_blobs() {
    let dir = TempDir::new().unwrap();

    let props = {
        let store = test_backend(&dir);
        store.store("persist me".into()).unwrap()
    };

    let store = test_backend(&dir);
    assert!(store.exists(&props.identifier));
    assert_eq!(store.properties(&props.identifier).unwrap(), props);

    let again = store.store("persist me".into()).unwrap();
    assert_eq!(again.created_at, props.created_at);
    assert_eq!(store.count().unwrap(), 1);

    let fetched = store.fetch(&props.identifier, FetchOptions::default()).unwrap();
    assert_eq!(fetched.content, b"persist me");
}

#[test]
fn test_backends_share_a_root() {
    let dir = TempDir::new().unwrap();
    let writer = test_backend(&dir);
    let reader = test_backend(&dir);

    let props = writer.store("shared".into()).unwrap();
    assert!(reader.exists(&props.identifier));
    let page = reader.list(&ListOptions::default()).unwrap();
    assert_eq!(page.items, vec![props]);
}

// --- Recovery ---

#[test]
fn test_malformed_sidecar_is_skipped_in_listing() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);

    let good = store.store("good".into()).unwrap();
    let bad = store.store("bad".into()).unwrap();
    fs::write(meta_path(store.root(), &bad.identifier), b"{ not json").unwrap();

    let reopened = test_backend(&dir);
    let page = reopened.list(&ListOptions::default()).unwrap();
    let ids: Vec<&BlobId> = page.items.iter().map(|p| &p.identifier).collect();
    assert_eq!(ids, vec![&good.identifier]);

    // The blob itself is still readable.
    let props = reopened.properties(&bad.identifier).unwrap();
    assert_eq!(props.size, 3);
    let fetched = reopened
        .fetch(&bad.identifier, FetchOptions::default())
        .unwrap();
    assert_eq!(fetched.content, b"bad");
}

#[test]
fn test_stray_sidecar_without_content_is_not_listed() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    let props = store.store("ghost".into()).unwrap();
    fs::remove_file(content_path(store.root(), &props.identifier)).unwrap();

    assert!(!store.exists(&props.identifier));
    assert!(store.list(&ListOptions::default()).unwrap().items.is_empty());
    assert!(store.delete(&props.identifier).unwrap_err().is_not_found());
    assert!(!meta_path(store.root(), &props.identifier).exists());
}

#[test]
fn test_delete_with_missing_sidecar() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    let props = store.store("orphan content".into()).unwrap();
    fs::remove_file(meta_path(store.root(), &props.identifier)).unwrap();

    store.delete(&props.identifier).unwrap();

    assert!(!store.exists(&props.identifier));
    assert!(!content_path(store.root(), &props.identifier).exists());
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_store_restores_missing_sidecar() {
    let dir = TempDir::new().unwrap();
    let props = {
        let store = test_backend(&dir);
        let props = store.store("restore".into()).unwrap();
        fs::remove_file(meta_path(store.root(), &props.identifier)).unwrap();
        props
    };

    let store = test_backend(&dir);
    assert!(store.list(&ListOptions::default()).unwrap().items.is_empty());

    let restored = store.store("restore".into()).unwrap();
    assert_eq!(restored.identifier, props.identifier);
    assert_eq!(restored.size, props.size);
    assert!(meta_path(store.root(), &props.identifier).is_file());
    assert_eq!(store.list(&ListOptions::default()).unwrap().items.len(), 1);
}

#[test]
fn test_store_repairs_malformed_sidecar() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    let props = store.store("repair".into()).unwrap();
    let meta = meta_path(store.root(), &props.identifier);
    fs::write(&meta, b"{ not json").unwrap();

    let store = test_backend(&dir);
    assert!(store.list(&ListOptions::default()).unwrap().items.is_empty());

    let repaired = store.store("repair".into()).unwrap();
    assert_eq!(repaired.identifier, props.identifier);
    assert_eq!(repaired.size, 6);

    let value: Value = serde_json::from_slice(&fs::read(&meta).unwrap()).unwrap();
    assert_eq!(value["identifier"], props.identifier.as_str());
    assert_eq!(value["size"], 6);

    let page = store.list(&ListOptions::default()).unwrap();
    assert_eq!(page.items, vec![repaired.clone()]);
    assert_eq!(store.count().unwrap(), 1);

    // Once repaired, the rebuilt properties are stable.
    let reopened = test_backend(&dir);
    assert_eq!(reopened.store("repair".into()).unwrap(), repaired);
}

#[test]
fn test_sidecar_with_wrong_size_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    let props = store.store("sized".into()).unwrap();
    let meta = meta_path(store.root(), &props.identifier);

    let inflated = json!({
        "identifier": props.identifier.as_str(),
        "size": 1_000_000_000_000_000u64,
        "createdAt": "2023-01-15T08:00:00.000Z",
    });
    fs::write(&meta, serde_json::to_vec(&inflated).unwrap()).unwrap();

    let reopened = test_backend(&dir);
    assert_eq!(reopened.properties(&props.identifier).unwrap().size, 5);

    let part = reopened
        .fetch(&props.identifier, FetchOptions::range(0, u64::MAX))
        .unwrap();
    assert_eq!(part.content, b"sized");
    assert_eq!(part.properties.size, 5);

    let full = reopened
        .fetch(&props.identifier, FetchOptions::default())
        .unwrap();
    assert_eq!(full.content, b"sized");

    let stream = reopened.fetch_stream(&props.identifier).unwrap();
    assert_eq!(stream.size(), 5);
    assert_eq!(stream.read_all().unwrap(), b"sized");

    // Storing the same content writes a corrected sidecar.
    reopened.store("sized".into()).unwrap();
    let value: Value = serde_json::from_slice(&fs::read(&meta).unwrap()).unwrap();
    assert_eq!(value["size"], 5);
}

#[test]
fn test_sidecar_without_checksum_is_readable() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    let props = store.store("legacy".into()).unwrap();

    let legacy = json!({
        "identifier": props.identifier.as_str(),
        "size": 6,
        "createdAt": "2023-01-15T08:00:00.000Z",
    });
    fs::write(
        meta_path(store.root(), &props.identifier),
        serde_json::to_vec(&legacy).unwrap(),
    )
    .unwrap();

    let reopened = test_backend(&dir);
    let fetched = reopened
        .fetch(&props.identifier, FetchOptions::default())
        .unwrap();
    assert_eq!(fetched.content, b"legacy");
    assert_eq!(
        fetched.properties.created_at.to_rfc3339(),
        "2023-01-15T08:00:00+00:00"
    );
}

#[test]
fn test_corrupted_content_fails_checksum() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    let props = store.store("0123456789".into()).unwrap();
    fs::write(content_path(store.root(), &props.identifier), b"0123456780").unwrap();

    let reopened = test_backend(&dir);
    let err = reopened
        .fetch(&props.identifier, FetchOptions::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::ChecksumMismatch { .. }));

    // Ranged reads don't verify.
    let part = reopened
        .fetch(&props.identifier, FetchOptions::range(0, 3))
        .unwrap();
    assert_eq!(part.content, b"012");
}

// --- Admin ---

#[test]
fn test_clear_removes_everything_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = test_backend(&dir);
    for i in 0..10 {
        store.store(format!("blob {}", i).into()).unwrap();
    }

    store.clear().unwrap();

    assert!(store.root().is_dir());
    assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
    assert_eq!(store.count().unwrap(), 0);
}
