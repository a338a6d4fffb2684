//! In-memory doubles shared by the unit tests.

use crate::config::GatewayConfig;
use crate::gateway::{Gateway, HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::session::{MemoryTokenStore, Session};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub enum Reply {
    Chunks(u16, Vec<Bytes>),
    Fail(TransportError),
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Reply::Chunks(status, vec![Bytes::from(body.to_string())])
    }

    pub fn text(status: u16, body: &str) -> Self {
        Reply::Chunks(status, vec![Bytes::from(body.to_string())])
    }

    pub fn sse(chunks: &[&str]) -> Self {
        Reply::Chunks(200, chunks.iter().map(|c| Bytes::from(c.to_string())).collect())
    }
}

/// Scripted transport: answers requests in order and records them.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last_json(&self) -> Value {
        let seen = self.seen.lock().unwrap();
        let body = seen.last().and_then(|r| r.body.clone()).unwrap_or_default();
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Chunks(status, chunks)) => Ok(HttpResponse::from_chunks(status, chunks)),
            Some(Reply::Fail(e)) => Err(e),
            None => Err(TransportError::Connect("no scripted reply".to_string())),
        }
    }
}

/// Unsigned JWT carrying `payload`.
pub fn token_for(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.sig")
}

pub fn signed_in_session(user_id: u64) -> Session {
    let token = token_for(serde_json::json!({ "sub": user_id.to_string() }));
    Session::new(Arc::new(MemoryTokenStore::with_token(token)))
}

/// Gateway over `transport` whose 401 redirects are collected in the returned vec.
pub fn gateway_with(
    transport: Arc<FakeTransport>,
    session: Session,
) -> (Gateway, Arc<Mutex<Vec<String>>>) {
    let redirects = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&redirects);
    let navigator = move |path: &str| sink.lock().unwrap().push(path.to_string());
    let config = GatewayConfig {
        base_url: "http://backend.test/".to_string(),
        ..GatewayConfig::default()
    };
    (Gateway::new(&config, transport, session, Arc::new(navigator)), redirects)
}
