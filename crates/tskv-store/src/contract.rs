//! Behaviour every [`StorageDriver`] must share.
//!
//! Each check takes the driver under test explicitly and works below a fresh
//! random root, so the same checks can run against a shared etcd cluster.

use std::collections::BTreeSet;

use tskv_types::{generate_uuid, AddressPath, Document, File, Storable, Value, LATEST};

use crate::driver::rollback;
use crate::error::StoreError;
use crate::traits::StorageDriver;

fn root() -> String {
    format!("contract-{}", generate_uuid())
}

fn tree(segments: &[&str]) -> AddressPath {
    AddressPath::new(segments.iter().copied())
        .unwrap()
        .expect("non-empty path")
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn setup_is_idempotent(store: &dyn StorageDriver) {
    store.setup().unwrap();
    store.setup().unwrap();
}

pub fn lock_cycle(store: &dyn StorageDriver) {
    let key = root();

    store.lock(&key, "c1").unwrap();

    let err = store.lock(&key, "c12").unwrap_err();
    assert!(err.is_contention(), "second lock should be refused: {err}");

    store.unlock(&key).unwrap();
    store.unlock(&key).unwrap();

    store.lock(&key, "b").unwrap();
    store.unlock(&key).unwrap();
}

pub fn missing_key_is_not_found(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str()]);
    let mut v = Value::new("absent", b"untouched".to_vec());

    let err = store.get(&mut v, Some(&path)).unwrap_err();
    match err {
        StoreError::NotFound { key } => assert!(key.ends_with("absent/latest")),
        other => panic!("expected NotFound, got {other}"),
    }
    assert_eq!(v.bytes(), b"untouched");

    let mut bare = File::new(format!("{}/hello/world", root()), None);
    assert!(store.get(&mut bare, None).unwrap_err().is_not_found());
}

pub fn save_then_get_round_trip(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str(), "store_tree"]);
    let payload = generate_uuid().into_bytes();

    let mut v = Value::new("workspace", payload.clone());
    let tag = store.save(&mut v, Some(&path)).unwrap();
    assert!(tag.chars().all(|c| c.is_ascii_digit()));

    let mut fresh = Value::empty("workspace");
    store.get(&mut fresh, Some(&path)).unwrap();
    assert_eq!(fresh.bytes(), payload.as_slice());

    let mut tagged = Value::empty("workspace");
    store.get_version(&mut tagged, Some(&path), &tag).unwrap();
    assert_eq!(tagged.bytes(), payload.as_slice());

    // Empty content is a real record, not a missing one.
    let mut empty = File::new("empty", None);
    store.save(&mut empty, Some(&path)).unwrap();
    let mut back = File::new("empty", Some(b"stale".to_vec()));
    store.get(&mut back, Some(&path)).unwrap();
    assert!(back.content().is_empty());
}

pub fn save_tag_writes_latest_and_tag(store: &dyn StorageDriver) {
    let r = root();
    let path = tree(&[r.as_str()]);
    let mut v = Value::new("k", b"same".to_vec());
    store.save_tag(&mut v, Some(&path), "t1").unwrap();

    let written = store.scan_keys(&format!("{r}/")).unwrap();
    assert_eq!(written, vec![format!("{r}/k/latest"), format!("{r}/k/t1")]);

    let mut latest = Value::empty("k");
    store.get(&mut latest, Some(&path)).unwrap();
    let mut tagged = Value::empty("k");
    store.get_version(&mut tagged, Some(&path), "t1").unwrap();
    assert_eq!(latest.bytes(), tagged.bytes());
}

pub fn bare_save_writes_one_record(store: &dyn StorageDriver) {
    let key = format!("{}/bare", root());
    let mut v = Value::new(key.clone(), b"one".to_vec());
    store.save_tag(&mut v, None, "t1").unwrap();

    assert_eq!(store.scan_keys(&key).unwrap(), vec![key.clone()]);

    let mut back = Value::empty(key);
    store.get(&mut back, None).unwrap();
    assert_eq!(back.bytes(), b"one");
}

pub fn versions_grow_per_distinct_tag(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str()]);
    let mut v = Value::new("k", b"a".to_vec());

    store.save_tag(&mut v, Some(&path), "v1").unwrap();
    assert_eq!(store.get_versions(&v, Some(&path)).unwrap().len(), 2);

    store.save_tag(&mut v, Some(&path), "v2").unwrap();
    assert_eq!(store.get_versions(&v, Some(&path)).unwrap().len(), 3);

    store.save_tag(&mut v, Some(&path), "v1").unwrap();
    assert_eq!(store.get_versions(&v, Some(&path)).unwrap().len(), 3);

    store.save(&mut v, Some(&path)).unwrap();
    let versions = store.get_versions(&v, Some(&path)).unwrap();
    assert_eq!(versions.len(), 4);
    assert!(versions.contains(LATEST));
}

pub fn versions_exclude_nested_paths(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str()]);

    let mut k = Value::new("k", b"k".to_vec());
    store.save_tag(&mut k, Some(&path), "v1").unwrap();
    let mut nested = Value::new("k/sub", b"nested".to_vec());
    store.save_tag(&mut nested, Some(&path), "v9").unwrap();
    let mut sibling = Value::new("k2", b"sibling".to_vec());
    store.save_tag(&mut sibling, Some(&path), "v5").unwrap();

    assert_eq!(
        store.get_versions(&k, Some(&path)).unwrap(),
        set(&[LATEST, "v1"])
    );
}

pub fn rollback_restores_old_value(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str()]);

    let mut v = Value::new("k", b"A".to_vec());
    store.save_tag(&mut v, Some(&path), "v1").unwrap();
    let mut v = Value::new("k", b"B".to_vec());
    store.save_tag(&mut v, Some(&path), "v2").unwrap();

    let mut restored = Value::empty("k");
    rollback(store, &mut restored, &path, "v1", "v3").unwrap();

    let mut latest = Value::empty("k");
    store.get(&mut latest, Some(&path)).unwrap();
    assert_eq!(latest.bytes(), b"A");
    assert_eq!(
        store.get_versions(&latest, Some(&path)).unwrap(),
        set(&[LATEST, "v1", "v2", "v3"])
    );

    let mut missing = Value::empty("k");
    let err = rollback(store, &mut missing, &path, "nope", "v4").unwrap_err();
    assert!(err.is_not_found());
}

pub fn archive_file_scenario(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str(), "archive"]);

    let mut f = File::new("k", None);
    f.unmarshal(b"X").unwrap();
    store.save_tag(&mut f, Some(&path), "v1").unwrap();
    assert_eq!(f.last_tag(), Some("v1"));

    let mut back = File::new("k", None);
    store.get(&mut back, Some(&path)).unwrap();
    assert_eq!(back.content(), b"X");

    let versions = store.get_versions(&back, Some(&path)).unwrap();
    assert!(versions.contains(LATEST));
    assert!(versions.contains("v1"));
}

pub fn get_keys_lists_folders(store: &dyn StorageDriver) {
    let prefix = format!("{}/workspaces/", root());
    for leaf in ["w1/latest", "w1/123", "w2/latest", "w3/deep/latest"] {
        let mut v = Value::new(format!("{prefix}{leaf}"), b"{}".to_vec());
        store.save_tag(&mut v, None, "t").unwrap();
    }

    let folders = store.get_keys(&prefix, "/").unwrap();
    let expected: BTreeSet<String> = ["w1/", "w2/"]
        .iter()
        .map(|f| format!("{prefix}{f}"))
        .collect();
    assert_eq!(folders, expected);

    assert!(store.get_keys(&prefix, "").is_err());
}

pub fn compressed_documents(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str()]);
    let layout = serde_json::json!({ "name": "dc1", "replicas": 3 });

    let mut doc = Document::new("layout", layout.clone());
    store.save_tag(&mut doc, Some(&path), "v1").unwrap();
    assert_eq!(doc.version(), Some("v1"));

    // Stored bytes are gzip, not the JSON itself.
    let mut raw = Value::empty("layout");
    store.get(&mut raw, Some(&path)).unwrap();
    assert_eq!(&raw.bytes()[..2], &[0x1f, 0x8b]);

    let mut back: Document<serde_json::Value> = Document::empty("layout");
    store.get(&mut back, Some(&path)).unwrap();
    assert_eq!(back.value(), &layout);

    // Uncompressed JSON written by a plain value still loads.
    let mut legacy = Value::new("legacy", br#"{"name":"old"}"#.to_vec());
    store.save_tag(&mut legacy, Some(&path), "v1").unwrap();
    let mut doc: Document<serde_json::Value> = Document::empty("legacy");
    store.get(&mut doc, Some(&path)).unwrap();
    assert_eq!(doc.value()["name"], "old");
}

pub fn undecodable_record_fails(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str()]);
    let mut junk = Value::new("junk", b"\x00\x01 not json, not gzip".to_vec());
    store.save_tag(&mut junk, Some(&path), "v1").unwrap();

    let original = serde_json::json!({ "keep": true });
    let mut doc = Document::new("junk", original.clone());
    let err = store.get(&mut doc, Some(&path)).unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }), "got {err}");
    assert_eq!(doc.value(), &original);
}

pub fn delete_keys_removes_subtree(store: &dyn StorageDriver) {
    let r = root();
    let path = tree(&[r.as_str(), "doomed"]);
    let mut a = Value::new("a", b"a".to_vec());
    store.save_tag(&mut a, Some(&path), "v1").unwrap();
    let mut b = Value::new("b", b"b".to_vec());
    store.save_tag(&mut b, Some(&path), "v1").unwrap();
    let mut bare = Value::new(format!("{r}/doomed"), b"bare".to_vec());
    store.save_tag(&mut bare, None, "v1").unwrap();
    let mut keep = Value::new(format!("{r}/doomed-not"), b"keep".to_vec());
    store.save_tag(&mut keep, None, "v1").unwrap();

    store.delete_keys(&format!("{r}/doomed")).unwrap();

    assert_eq!(
        store.scan_keys(&format!("{r}/")).unwrap(),
        vec![format!("{r}/doomed-not")]
    );
    assert!(store.get(&mut a, Some(&path)).unwrap_err().is_not_found());

    // Deleting again is harmless.
    store.delete_keys(&format!("{r}/doomed")).unwrap();
    assert!(store.delete_keys("").is_err());
}

pub fn invalid_tag_writes_nothing(store: &dyn StorageDriver) {
    let r = root();
    let path = tree(&[r.as_str()]);
    let mut v = Value::new("k", b"x".to_vec());

    for tag in ["", "a/b", LATEST] {
        let err = store.save_tag(&mut v, Some(&path), tag).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }
    assert!(store.scan_keys(&format!("{r}/")).unwrap().is_empty());

    // A bare save never writes its tag, so any tag is accepted.
    for tag in ["", LATEST] {
        let mut bare = Value::new(format!("{r}/bare"), b"bare".to_vec());
        store.save_tag(&mut bare, None, tag).unwrap();
    }
    assert_eq!(store.scan_keys(&format!("{r}/")).unwrap(), vec![format!("{r}/bare")]);
}

pub fn leading_slash_keys_stay_distinct(store: &dyn StorageDriver) {
    let r = root();
    let slashed = format!("/{r}/x");
    let plain = format!("{r}/x");

    let mut a = Value::new(slashed.clone(), b"slashed".to_vec());
    store.save_tag(&mut a, None, "v1").unwrap();
    let mut b = Value::new(plain.clone(), b"plain".to_vec());
    store.save_tag(&mut b, None, "v1").unwrap();

    let mut back = Value::empty(slashed.clone());
    store.get(&mut back, None).unwrap();
    assert_eq!(back.bytes(), b"slashed");
    let mut back = Value::empty(plain.clone());
    store.get(&mut back, None).unwrap();
    assert_eq!(back.bytes(), b"plain");

    assert_eq!(store.scan_keys(&format!("/{r}/")).unwrap(), vec![slashed.clone()]);
    assert!(store.get_keys("/", "/").unwrap().contains(&format!("/{r}/")));
    assert!(store.get_keys(&format!("/{r}/"), "/").unwrap().is_empty());

    store.lock(&slashed, "a").unwrap();
    store.lock(&plain, "b").unwrap();
    store.unlock(&slashed).unwrap();
    store.unlock(&plain).unwrap();

    store.delete_keys(&format!("/{r}")).unwrap();
    assert!(store.scan_keys(&format!("/{r}/")).unwrap().is_empty());
    assert_eq!(store.scan_keys(&format!("{r}/")).unwrap(), vec![plain]);
}

pub fn concurrent_saves_keep_every_tag(store: &dyn StorageDriver) {
    let path = tree(&[root().as_str()]);

    std::thread::scope(|s| {
        for i in 0..4 {
            let path = &path;
            s.spawn(move || {
                let mut v = Value::new("k", format!("value-{i}").into_bytes());
                store.save_tag(&mut v, Some(path), &format!("t{i}")).unwrap();
            });
        }
    });

    let versions = store.get_versions(&Value::empty("k"), Some(&path)).unwrap();
    assert_eq!(versions, set(&[LATEST, "t0", "t1", "t2", "t3"]));

    let mut latest = Value::empty("k");
    store.get(&mut latest, Some(&path)).unwrap();
    let latest = String::from_utf8(latest.into_bytes()).unwrap();
    assert!(latest.starts_with("value-"));

    // `latest` carries the same bytes as the tag that last wrote it.
    let suffix = latest.trim_start_matches("value-");
    let mut tagged = Value::empty("k");
    store
        .get_version(&mut tagged, Some(&path), &format!("t{suffix}"))
        .unwrap();
    assert_eq!(tagged.bytes(), latest.as_bytes());
}

/// Every check above, in order.
pub fn run_all(store: &dyn StorageDriver) {
    setup_is_idempotent(store);
    lock_cycle(store);
    missing_key_is_not_found(store);
    save_then_get_round_trip(store);
    save_tag_writes_latest_and_tag(store);
    bare_save_writes_one_record(store);
    versions_grow_per_distinct_tag(store);
    versions_exclude_nested_paths(store);
    rollback_restores_old_value(store);
    archive_file_scenario(store);
    get_keys_lists_folders(store);
    compressed_documents(store);
    undecodable_record_fails(store);
    delete_keys_removes_subtree(store);
    invalid_tag_writes_nothing(store);
    leading_slash_keys_stay_distinct(store);
    concurrent_saves_keep_every_tag(store);
}
