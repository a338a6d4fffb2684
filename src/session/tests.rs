use super::*;
use crate::testing::token_for as make_token;
use chrono::TimeZone;
use serde_json::json;

#[test]
fn user_id_prefers_sub_claim() {
    let token = make_token(json!({"sub": "42", "user_id": 7}));
    let session = Session::new(Arc::new(MemoryTokenStore::with_token(token)));
    assert_eq!(session.user_id().unwrap().as_str(), "42");
}

#[test]
fn user_id_falls_back_to_numeric_claims() {
    let token = make_token(json!({"user_id": 7}));
    let claims = Claims::decode(&token).unwrap();
    assert_eq!(claims.user_id(), Some(UserId::new("7")));

    let token = make_token(json!({"id": "  "}));
    assert_eq!(Claims::decode(&token).unwrap().user_id(), None);
}

#[test]
fn missing_token_is_unauthenticated_not_a_default_user() {
    let session = Session::in_memory();
    assert!(matches!(session.user_id(), Err(SessionError::Unauthenticated)));
    assert!(!session.is_authenticated());
}

#[test]
fn malformed_token_is_reported() {
    let session = Session::new(Arc::new(MemoryTokenStore::with_token("not-a-jwt")));
    assert!(matches!(session.user_id(), Err(SessionError::MalformedToken(_))));
}

#[test]
fn expiry_is_checked_against_exp_claim() {
    let claims = Claims {
        exp: Some(1_700_000_000),
        ..Claims::default()
    };
    let before = Utc.timestamp_opt(1_699_999_999, 0).unwrap();
    let after = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    assert!(!claims.is_expired_at(before));
    assert!(claims.is_expired_at(after));
    assert!(!Claims::default().is_expired_at(after));
}

#[test]
fn user_id_serializes_numeric_ids_as_numbers() {
    assert_eq!(serde_json::to_value(UserId::new("12")).unwrap(), json!(12));
    assert_eq!(serde_json::to_value(UserId::new("abc")).unwrap(), json!("abc"));
}

#[test]
fn sign_in_and_out_round_trip_through_memory_store() {
    let session = Session::in_memory();
    let token = make_token(json!({"sub": "3"}));
    session.sign_in(&token, Some(&json!({"id": 3}))).unwrap();
    assert_eq!(session.token().as_deref(), Some(token.as_str()));
    assert_eq!(session.store().user(), Some(json!({"id": 3})));

    session.sign_out();
    assert!(session.token().is_none());
    assert!(session.store().user().is_none());
}

#[test]
fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    let store = FileTokenStore::open(&path).unwrap();
    assert!(store.token().is_none());
    store.save("abc.def.ghi", Some(&json!({"account": "writer"}))).unwrap();

    let reopened = FileTokenStore::open(&path).unwrap();
    assert_eq!(reopened.token().as_deref(), Some("abc.def.ghi"));
    assert_eq!(reopened.user(), Some(json!({"account": "writer"})));

    reopened.clear();
    assert!(!path.exists());
    assert!(FileTokenStore::open(&path).unwrap().token().is_none());
}

#[test]
fn file_store_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, b"{ nope").unwrap();
    assert!(matches!(FileTokenStore::open(&path), Err(SessionError::Storage(_))));
}

#[test]
fn cookie_store_reads_token_or_auth_cookie() {
    let store = CookieTokenStore::from_header("theme=dark; token=abc.def.ghi; lang=zh");
    assert_eq!(store.token().as_deref(), Some("abc.def.ghi"));

    let store = CookieTokenStore::from_header("auth=xyz");
    assert_eq!(store.token().as_deref(), Some("xyz"));

    let store = CookieTokenStore::from_header("token=; other=1");
    assert!(store.token().is_none());
    assert!(store.save("t", None).is_err());
}
