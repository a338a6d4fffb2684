use super::*;
use crate::testing::{gateway_with, signed_in_session, FakeTransport, Reply};
use futures::StreamExt;
use serde_json::json;

#[tokio::test]
async fn attaches_bearer_token_when_auth_required() {
    let transport = FakeTransport::new(vec![Reply::json(200, json!({"ok": true}))]);
    let session = signed_in_session(9);
    let token = session.token().unwrap();
    let (gateway, _) = gateway_with(transport.clone(), session);

    let value: Value = gateway
        .request_json("/task/status/1", true, RequestOptions::get())
        .await
        .unwrap();
    assert_eq!(value, json!({"ok": true}));

    let sent = &transport.requests()[0];
    assert_eq!(sent.url.as_str(), "http://backend.test/task/status/1");
    assert_eq!(sent.header("authorization"), Some(format!("Bearer {token}").as_str()));
}

#[tokio::test]
async fn public_calls_carry_no_authorization() {
    let transport = FakeTransport::new(vec![Reply::json(200, json!(true))]);
    let (gateway, _) = gateway_with(transport.clone(), signed_in_session(1));

    let _: Value = gateway
        .request_json("auth/check_username_available/ann", false, RequestOptions::get())
        .await
        .unwrap();
    assert!(transport.requests()[0].header("Authorization").is_none());
}

#[tokio::test]
async fn json_body_is_encoded_with_content_type() {
    let transport = FakeTransport::new(vec![Reply::json(200, json!({}))]);
    let (gateway, _) = gateway_with(transport.clone(), signed_in_session(1));

    let _: Value = gateway
        .request_json("/task/new", true, RequestOptions::post().json(json!({"prompt": "雪"})))
        .await
        .unwrap();

    let sent = &transport.requests()[0];
    assert_eq!(sent.method, Method::Post);
    assert_eq!(sent.header("content-type"), Some("application/json"));
    assert_eq!(transport.last_json(), json!({"prompt": "雪"}));
}

#[tokio::test]
async fn unauthorized_clears_session_and_redirects_without_decoding() {
    let transport = FakeTransport::new(vec![Reply::json(401, json!({"message": "expired"}))]);
    let session = signed_in_session(5);
    let (gateway, redirects) = gateway_with(transport, session.clone());

    let err = gateway
        .request_json::<Value>("/spirate/1", true, RequestOptions::get())
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.body().and_then(|b| b.message.as_deref()), Some("expired"));
    assert_eq!(*redirects.lock().unwrap(), vec!["/auth".to_string()]);
    assert!(session.token().is_none());
}

#[tokio::test]
async fn error_status_carries_moderation_words() {
    let body = json!({"error": "内容包含敏感词", "found_words": ["X", "Y"]});
    let transport = FakeTransport::new(vec![Reply::json(400, body)]);
    let (gateway, redirects) = gateway_with(transport, signed_in_session(1));

    let err = gateway
        .request("/task/new", true, RequestOptions::post())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    let data = err.body().unwrap();
    assert!(data.is_moderation());
    assert_eq!(data.found_words, vec!["X".to_string(), "Y".to_string()]);
    assert!(redirects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_json_error_body_becomes_message() {
    let transport = FakeTransport::new(vec![Reply::text(502, "Bad Gateway")]);
    let (gateway, _) = gateway_with(transport, signed_in_session(1));

    let err = gateway.request("/x", false, RequestOptions::get()).await.unwrap_err();
    assert_eq!(err.body().unwrap().summary(), Some("Bad Gateway"));
}

#[test]
fn null_found_words_keep_the_message() {
    let body = ErrorBody::parse(r#"{"message": "服务繁忙", "found_words": null}"#.as_bytes());
    assert_eq!(body.message.as_deref(), Some("服务繁忙"));
    assert!(body.found_words.is_empty());
    assert!(!body.is_moderation());
}

#[tokio::test]
async fn transport_failure_is_not_retried() {
    let transport = FakeTransport::new(vec![Reply::Fail(TransportError::Timeout)]);
    let (gateway, _) = gateway_with(transport.clone(), signed_in_session(1));

    let err = gateway.request("/x", false, RequestOptions::get()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport(TransportError::Timeout)));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let transport = FakeTransport::new(vec![Reply::text(200, "")]);
    let (gateway, _) = gateway_with(transport, signed_in_session(1));

    match gateway.request("/auth/logout", true, RequestOptions::post()).await.unwrap() {
        GatewayResponse::Json(value) => assert_eq!(value, Value::Null),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn event_stream_accept_returns_undecoded_stream() {
    let transport = FakeTransport::new(vec![Reply::sse(&["data: Hel", "lo\n\ndata:  world\n\n"])]);
    let (gateway, _) = gateway_with(transport.clone(), signed_in_session(1));

    let stream = gateway
        .request_stream("/chat/session/3/message", true, RequestOptions::post().json(json!({"content": "hi"})))
        .await
        .unwrap();

    let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
    assert_eq!(chunks, vec!["Hello".to_string(), " world".to_string()]);
    assert_eq!(transport.requests()[0].header("Accept"), Some("text/event-stream"));
}

#[tokio::test]
async fn streaming_error_status_is_still_an_error() {
    let transport = FakeTransport::new(vec![Reply::json(500, json!({"detail": "boom"}))]);
    let (gateway, _) = gateway_with(transport, signed_in_session(1));

    let err = gateway
        .request_stream("/ai/expand", true, RequestOptions::post())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.body().unwrap().summary(), Some("boom"));
}

#[test]
fn header_builder_replaces_existing_values() {
    let options = RequestOptions::post()
        .header("accept", "application/json")
        .event_stream();
    assert!(options.is_event_stream());
    assert_eq!(options.headers.len(), 1);
}
