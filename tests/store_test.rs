//! In-memory store: conditional assign semantics and JSON file round trip.

use idfill::identifier::identifier_of;
use idfill::model::{Assign, Record};
use idfill::store::{MemoryStore, Store};
use serde_json::json;
use std::path::PathBuf;

fn temp_file(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("idfill-test")
        .join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[tokio::test]
async fn assign_writes_only_when_absent() {
    let store = MemoryStore::new(vec![Record::new("a"), Record::new("b").field("VectorId", 99)]);

    let first = store.conditional_assign("a", "VectorId", identifier_of("a")).await.unwrap();
    assert_eq!(first, Assign::Applied);
    assert_eq!(store.get("a", "VectorId"), Some(json!(531_973_061_171_636_152u64)));

    let again = store.conditional_assign("a", "VectorId", identifier_of("a")).await.unwrap();
    assert_eq!(again, Assign::AlreadyPresent);

    let other = store.conditional_assign("b", "VectorId", identifier_of("b")).await.unwrap();
    assert_eq!(other, Assign::AlreadyPresent);
    assert_eq!(store.get("b", "VectorId"), Some(json!(99)));
    assert_eq!(store.assign_calls(), 3);
}

#[tokio::test]
async fn assign_on_unknown_key_is_an_error() {
    let store = MemoryStore::new(vec![]);
    let result = store.conditional_assign("ghost", "VectorId", identifier_of("ghost")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn injected_failures_write_nothing() {
    let store = MemoryStore::new(vec![Record::new("a"), Record::new("b")]).fail_every(2);

    assert!(store.conditional_assign("a", "VectorId", identifier_of("a")).await.is_ok());
    assert!(store.conditional_assign("b", "VectorId", identifier_of("b")).await.is_err());
    assert_eq!(store.get("b", "VectorId"), None);
}

#[tokio::test]
async fn json_file_round_trip_keeps_other_fields() {
    let path = temp_file("records.json");
    std::fs::write(
        &path,
        r#"[
            {"Key": "photos/1.jpg", "Caption": "beach"},
            {"Key": "photos/2.jpg", "VectorId": 7},
            {"Caption": "orphan"}
        ]"#,
    )
    .unwrap();

    let store = MemoryStore::load_json(&path, "Key").unwrap();
    let records = store.enumerate().await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].key.as_deref(), Some("photos/1.jpg"));
    assert!(records[1].has_identifier("VectorId"));
    assert_eq!(records[2].key, None);

    store
        .conditional_assign("photos/1.jpg", "VectorId", identifier_of("photos/1.jpg"))
        .await
        .unwrap();
    store.save_json(&path).unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved[0]["Caption"], json!("beach"));
    assert_eq!(saved[0]["VectorId"], json!(identifier_of("photos/1.jpg").get()));
    assert_eq!(saved[1]["VectorId"], json!(7));
    assert_eq!(saved[2], json!({"Caption": "orphan"}));
}

#[test]
fn malformed_json_file_is_rejected() {
    let path = temp_file("bad.json");
    std::fs::write(&path, r#"{"Key": "not-an-array"}"#).unwrap();
    assert!(MemoryStore::load_json(&path, "Key").is_err());
}

#[test]
fn save_replaces_the_file_without_leaving_a_temp_file() {
    let path = temp_file("records.json");
    std::fs::write(&path, r#"[{"Key": "old"}]"#).unwrap();

    let store = MemoryStore::new(vec![Record::new("a").field("Key", "a")]);
    store.save_json(&path).unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, json!([{"Key": "a"}]));

    let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("records.json")]);
}

#[tokio::test]
async fn lookups_stay_correct_on_a_large_store() {
    let records: Vec<_> = (0..20_000).map(|i| Record::new(format!("k{i}"))).collect();
    let store = MemoryStore::new(records);

    for i in (0..20_000).rev() {
        let key = format!("k{i}");
        let result = store
            .conditional_assign(&key, "VectorId", identifier_of(&key))
            .await
            .unwrap();
        assert_eq!(result, Assign::Applied);
    }
    assert_eq!(store.get("k0", "VectorId"), Some(json!(identifier_of("k0").get())));
    assert_eq!(store.get("k19999", "VectorId"), Some(json!(identifier_of("k19999").get())));
    assert_eq!(store.get("k20000", "VectorId"), None);
}
