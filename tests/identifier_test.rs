//! Properties of the key → vector id mapping.

use idfill::identifier::{MODULUS, VectorId, digest_hex, identifier_of};

#[test]
fn known_keys_map_to_fixed_ids() {
    assert_eq!(identifier_of("photos/42.jpg").get(), 157_929_174_401_951_885);
    assert_eq!(identifier_of("a").get(), 531_973_061_171_636_152);
    assert_eq!(identifier_of("hello world").get(), 860_146_898_325_751_533);
}

#[test]
fn empty_key_is_defined() {
    assert_eq!(identifier_of("").get(), 473_197_403_882_391_305);
}

#[test]
fn digest_is_sha1_hex() {
    assert_eq!(
        digest_hex("photos/42.jpg"),
        "af2bf688a49071ef9d316928d62d77d9081e288d"
    );
    assert_eq!(digest_hex(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
}

#[test]
fn same_key_same_id() {
    let keys = ["a", "photos/42.jpg", "ünïcødé/ключ", " ", "a\0b"];
    for key in keys {
        assert_eq!(identifier_of(key), identifier_of(key), "key {key:?}");
    }
}

#[test]
fn ids_stay_below_modulus() {
    for i in 0..5_000 {
        let key = format!("photos/{i}.jpg");
        assert!(identifier_of(&key).get() < MODULUS, "key {key}");
    }
    let long = "x".repeat(100_000);
    assert!(identifier_of(&long).get() < MODULUS);
}

#[test]
fn distinct_keys_rarely_collide() {
    let mut ids: Vec<VectorId> = (0..10_000).map(|i| identifier_of(&format!("k{i}"))).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10_000);
}

#[test]
fn id_serializes_as_plain_integer() {
    let id = identifier_of("a");
    assert_eq!(serde_json::to_string(&id).unwrap(), "531973061171636152");
    assert_eq!(serde_json::Value::from(id), serde_json::json!(531_973_061_171_636_152u64));
}
