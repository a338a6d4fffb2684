//! Unverified JWT payload decoding. Signature checks belong to the backend; the
//! client only reads identity and expiry.

use super::{SessionError, SessionResult, UserId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<Value>,
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    /// Expiry as a UNIX timestamp in seconds.
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn decode(token: &str) -> SessionResult<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(SessionError::MalformedToken(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| SessionError::MalformedToken(e.to_string()))?;

        serde_json::from_slice(&payload).map_err(|e| SessionError::MalformedToken(e.to_string()))
    }

    pub fn user_id(&self) -> Option<UserId> {
        [&self.sub, &self.user_id, &self.id]
            .into_iter()
            .flatten()
            .find_map(claim_as_id)
    }

    /// Tokens without an `exp` claim never expire on the client side.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => now.timestamp() >= exp,
            None => false,
        }
    }
}

fn claim_as_id(value: &Value) -> Option<UserId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(UserId::new(s.trim())),
        Value::Number(n) => Some(UserId::new(n.to_string())),
        _ => None,
    }
}
