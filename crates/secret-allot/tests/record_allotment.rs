//! End-to-end allotment of a stored record: encrypt, allot, unify, decrypt.

use secret_allot::{allot, decrypt, encrypt, unify, Ciphertext, SecretKey, ALLOT_KEY};
use serde_json::json;

fn record_document(key: &SecretKey, text: &str) -> serde_json::Value {
    let ct = encrypt(key, text).unwrap();
    json!({
        "_id": "7f1d6a0e-0000-4000-8000-000000000000",
        "team": "red",
        "text": { ALLOT_KEY: ct },
    })
}

#[test]
fn three_node_record_round_trips_through_shares() {
    let key = SecretKey::generate(3).unwrap();
    let doc = record_document(&key, "Call me Ishmael");

    let shares = allot(&doc).unwrap();
    assert_eq!(shares.len(), 3);

    let unified = unify(&shares).unwrap();
    let ct: Ciphertext = serde_json::from_value(unified["text"][ALLOT_KEY].clone()).unwrap();
    assert_eq!(decrypt(&key, &ct).unwrap(), "Call me Ishmael");
}

#[test]
fn shares_never_carry_the_plaintext() {
    let key = SecretKey::generate(2).unwrap();
    let doc = record_document(&key, "the quick brown fox jumps over the lazy dog");

    for share in allot(&doc).unwrap() {
        let rendered = share.to_string();
        assert!(!rendered.contains("quick brown fox"));
        assert_eq!(share["team"], "red");
    }
}

#[test]
fn single_node_record_is_sealed_into_one_share() {
    let key = SecretKey::generate(1).unwrap();
    let doc = record_document(&key, "solo");

    let shares = allot(&doc).unwrap();
    assert_eq!(shares.len(), 1);
    assert!(shares[0]["text"]["$share"].is_string());

    let unified = unify(&shares).unwrap();
    let ct: Ciphertext = serde_json::from_value(unified["text"][ALLOT_KEY].clone()).unwrap();
    assert_eq!(decrypt(&key, &ct).unwrap(), "solo");
}
