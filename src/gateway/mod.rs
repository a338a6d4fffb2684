//! The single path every backend call goes through.
//!
//! `Gateway::request` resolves the URL, attaches the bearer token, sends the request
//! and sorts the response into one of three outcomes:
//! - non-2xx: `GatewayError::Status` carrying the parsed error body (401 also clears
//!   the session and redirects to the sign-in page),
//! - `Accept: text/event-stream`: the undecoded body wrapped in an `EventStream`,
//! - otherwise: the JSON body.
//!
//! The gateway never retries.

pub mod error;
pub mod navigator;
pub mod transport;

pub use error::{ErrorBody, GatewayError, GatewayResult, TransportError};
pub use navigator::{LogNavigator, Navigator};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};

use crate::config::GatewayConfig;
use crate::session::Session;
use crate::sse::{EventStream, SseDecoder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

const EVENT_STREAM: &str = "text/event-stream";

/// Per-call options: method, extra headers, JSON body, streaming.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub done_sentinel: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    fn with_method(method: Method) -> Self {
        Self {
            method,
            headers: Vec::new(),
            body: None,
            done_sentinel: None,
        }
    }

    pub fn get() -> Self {
        Self::with_method(Method::Get)
    }

    pub fn post() -> Self {
        Self::with_method(Method::Post)
    }

    pub fn put() -> Self {
        Self::with_method(Method::Put)
    }

    pub fn delete() -> Self {
        Self::with_method(Method::Delete)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self.header("Content-Type", "application/json")
    }

    /// Asks for a server-sent-events response; the gateway then returns the stream.
    pub fn event_stream(self) -> Self {
        self.header("Accept", EVENT_STREAM)
    }

    /// Ends the returned stream at this payload instead of at end of body.
    pub fn done_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.done_sentinel = Some(sentinel.into());
        self
    }

    pub fn is_event_stream(&self) -> bool {
        self.headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("accept") && v.contains(EVENT_STREAM))
    }
}

#[derive(Debug)]
pub enum GatewayResponse {
    Json(Value),
    Stream(EventStream),
}

#[derive(Clone)]
pub struct Gateway {
    base_url: String,
    auth_page: String,
    transport: Arc<dyn HttpTransport>,
    session: Session,
    navigator: Arc<dyn Navigator>,
}

impl Gateway {
    pub fn new(
        config: &GatewayConfig,
        transport: Arc<dyn HttpTransport>,
        session: Session,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_page: config.auth_page.clone(),
            transport,
            session,
            navigator,
        }
    }

    /// Gateway over `reqwest` that only logs the 401 redirect.
    pub fn from_config(config: &GatewayConfig, session: Session) -> GatewayResult<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(config, Arc::new(transport), session, Arc::new(LogNavigator)))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn url_for(&self, path: &str) -> GatewayResult<Url> {
        let raw = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&raw).map_err(|e| GatewayError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    #[instrument(skip(self, options), fields(method = options.method.as_str()))]
    pub async fn request(
        &self,
        path: &str,
        requires_auth: bool,
        options: RequestOptions,
    ) -> GatewayResult<GatewayResponse> {
        let url = self.url_for(path)?;
        let streaming = options.is_event_stream();

        let mut headers = options.headers;
        if requires_auth {
            match self.session.token() {
                Some(token) => headers.push(("Authorization".to_string(), format!("Bearer {token}"))),
                None => debug!("No token stored, sending without Authorization"),
            }
        }

        let body = options
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| GatewayError::Encode(e.to_string()))?;

        let request = HttpRequest {
            method: options.method,
            url,
            headers,
            body,
        };

        let response = self.transport.send(request).await?;
        let status = response.status;
        debug!(status, streaming, "Response received");

        if !response.is_success() {
            let data = match response.bytes().await {
                Ok(raw) => ErrorBody::parse(&raw),
                Err(e) => {
                    warn!(error = %e, "Failed to read error body");
                    ErrorBody::default()
                }
            };

            if status == 401 {
                warn!("Unauthorized, clearing session");
                self.session.sign_out();
                self.navigator.redirect(&self.auth_page);
            }

            return Err(GatewayError::Status { status, data });
        }

        if streaming {
            let decoder = match options.done_sentinel {
                Some(sentinel) => SseDecoder::new().with_done_sentinel(sentinel),
                None => SseDecoder::new(),
            };
            return Ok(GatewayResponse::Stream(EventStream::new(response.body, decoder)));
        }

        let raw = response.bytes().await?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(GatewayResponse::Json(Value::Null));
        }
        let value = serde_json::from_slice(&raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(GatewayResponse::Json(value))
    }

    /// JSON call decoded into `T`. A streaming answer here is a decode error.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        requires_auth: bool,
        options: RequestOptions,
    ) -> GatewayResult<T> {
        match self.request(path, requires_auth, options).await? {
            GatewayResponse::Json(value) => {
                serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
            }
            GatewayResponse::Stream(_) => Err(GatewayError::Decode(
                "expected a JSON body, got an event stream".to_string(),
            )),
        }
    }

    /// Streaming call. Adds `Accept: text/event-stream` if the options lack it.
    pub async fn request_stream(
        &self,
        path: &str,
        requires_auth: bool,
        options: RequestOptions,
    ) -> GatewayResult<EventStream> {
        match self.request(path, requires_auth, options.event_stream()).await? {
            GatewayResponse::Stream(stream) => Ok(stream),
            GatewayResponse::Json(_) => Err(GatewayError::Decode(
                "expected an event stream, got a JSON body".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests;
