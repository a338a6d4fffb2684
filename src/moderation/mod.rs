//! User-facing failure notices and client-side content checks.

pub mod cleaner;
pub mod filter;

pub use cleaner::{CleanerError, PromptCleaner};
pub use filter::{FilterError, SensitiveFilter};

use crate::gateway::{GatewayError, TransportError};
use std::fmt;

const GENERIC_FAILURE: &str = "请求失败，请稍后重试";

/// What the user is told when an action fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Content rejected for the listed words; shown distinctly from other failures.
    Moderation(Vec<String>),
    /// Backend message when there is one, otherwise the generic text.
    Failure(Option<String>),
    SessionExpired,
    Network,
    /// A polled operation did not finish in time, e.g. `RetryLater("支付")`.
    RetryLater(String),
}

impl Notice {
    pub fn from_gateway_error(err: &GatewayError) -> Self {
        match err {
            GatewayError::Status { status: 401, .. } => Notice::SessionExpired,
            GatewayError::Status { data, .. } if data.is_moderation() => {
                Notice::Moderation(data.found_words.clone())
            }
            GatewayError::Status { data, .. } => Notice::Failure(data.summary().map(str::to_string)),
            GatewayError::Transport(TransportError::Timeout | TransportError::Connect(_)) => Notice::Network,
            _ => Notice::Failure(None),
        }
    }

    /// Notice for a local pre-check hit, if any.
    pub fn from_filter(filter: &SensitiveFilter, text: &str) -> Option<Self> {
        let words = filter.find_all(text);
        (!words.is_empty()).then_some(Notice::Moderation(words))
    }

    pub fn is_moderation(&self) -> bool {
        matches!(self, Notice::Moderation(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Moderation(words) => write!(f, "存在敏感词: {}，请修改", words.join("、")),
            Notice::Failure(Some(message)) => f.write_str(message),
            Notice::Failure(None) => f.write_str(GENERIC_FAILURE),
            Notice::SessionExpired => f.write_str("登录已过期，请重新登录"),
            Notice::Network => f.write_str("网络连接失败，请检查网络后重试"),
            Notice::RetryLater(what) => write!(f, "{what}未完成，请稍后再试"),
        }
    }
}

impl std::error::Error for Notice {}

impl From<&GatewayError> for Notice {
    fn from(err: &GatewayError) -> Self {
        Notice::from_gateway_error(err)
    }
}

impl From<CleanerError> for Notice {
    fn from(err: CleanerError) -> Self {
        match err {
            CleanerError::EmptyInput => Notice::Failure(Some("请输入内容".to_string())),
            CleanerError::TooLong(_) => Notice::Failure(Some(format!(
                "内容过长，请控制在{}字以内",
                PromptCleaner::MAX_CHARS
            ))),
        }
    }
}

#[cfg(test)]
mod tests;
