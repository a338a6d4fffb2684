use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Network error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// `null` becomes the default value instead of an error.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// JSON error body returned with non-2xx statuses.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Present when the backend rejected content for moderation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub found_words: Vec<String>,
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Lenient parse: anything that is not a JSON object becomes `message`.
    pub fn parse(raw: &[u8]) -> Self {
        if let Ok(body) = serde_json::from_slice::<ErrorBody>(raw) {
            return body;
        }
        let text = String::from_utf8_lossy(raw).trim().to_string();
        Self {
            message: (!text.is_empty()).then_some(text),
            ..Self::default()
        }
    }

    pub fn is_moderation(&self) -> bool {
        !self.found_words.is_empty()
    }

    /// Best human-readable text: `message`, then `error`, then a string `detail`.
    pub fn summary(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .or_else(|| self.detail.as_ref().and_then(Value::as_str))
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("HTTP {status}: {}", .data.summary().unwrap_or("no details"))]
    Status { status: u16, data: ErrorBody },
    #[error("Failed to encode request body: {0}")]
    Encode(String),
    #[error("Failed to decode response body: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            GatewayError::Status { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
