//! Chat transcript with a live reply buffer.
//!
//! Replies arrive as SSE chunks. Each chunk is appended to the streaming buffer in
//! arrival order without any delay; when the stream ends the buffer becomes a
//! finished character message.

use crate::api::{ChatMessage, Id, SenderType};
use crate::gateway::TransportError;
use crate::sse::EventStream;
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const USER_SENDER: &str = "User";
const FALLBACK_CHARACTER: &str = "character";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Reply stream failed: {0}")]
    Stream(#[from] TransportError),
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Observer for transcript changes. Every method defaults to a no-op.
pub trait ChatObserver: Send + Sync {
    fn message_added(&self, _message: &ChatMessage) {}

    /// Whole reply text received so far.
    fn reply_progress(&self, _buffer: &str) {}

    /// The reply stream failed and its partial text was dropped.
    fn reply_discarded(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ChatObserver for NullObserver {}

pub struct ChatSession {
    session_id: Id,
    character_name: String,
    transcript: Vec<ChatMessage>,
    streaming: Option<String>,
    observer: Arc<dyn ChatObserver>,
}

impl ChatSession {
    pub fn new(session_id: Id, character_name: impl Into<String>) -> Self {
        Self {
            session_id,
            character_name: character_name.into(),
            transcript: Vec::new(),
            streaming: None,
            observer: Arc::new(NullObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ChatObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Existing session: the transcript starts from the stored history.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.transcript = history;
        self
    }

    /// Fresh session: the character opens with a greeting.
    pub fn with_greeting(mut self) -> Self {
        let greeting = format!("你好，我是 {}。", self.character_name());
        let message = self.local_message(SenderType::Character, greeting);
        self.transcript.push(message);
        self
    }

    pub fn session_id(&self) -> &Id {
        &self.session_id
    }

    pub fn character_name(&self) -> &str {
        if self.character_name.trim().is_empty() {
            FALLBACK_CHARACTER
        } else {
            &self.character_name
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Reply text received so far, while a reply is streaming.
    pub fn streaming_text(&self) -> Option<&str> {
        self.streaming.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
        self.streaming = None;
    }

    /// Appends the user's message before the request is sent. Blank text is refused.
    pub fn push_user(&mut self, text: &str) -> ChatResult<&ChatMessage> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let message = self.local_message(SenderType::User, text.to_string());
        Ok(self.push(message))
    }

    /// Drains `reply` into the streaming buffer and promotes it once the stream ends.
    ///
    /// On a stream error the partial reply is discarded; messages already in the
    /// transcript are kept.
    #[instrument(skip(self, reply), fields(session = %self.session_id))]
    pub async fn receive(&mut self, mut reply: EventStream) -> ChatResult<&ChatMessage> {
        self.streaming = Some(String::new());
        let mut chunks = 0usize;

        while let Some(chunk) = reply.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(error = %e, chunks, "Reply stream failed");
                    self.streaming = None;
                    self.observer.reply_discarded();
                    return Err(e.into());
                }
            };
            chunks += 1;
            let buffer = self.streaming.get_or_insert_with(String::new);
            buffer.push_str(&chunk);
            self.observer.reply_progress(buffer);
        }

        let content = self.streaming.take().unwrap_or_default();
        debug!(chunks, chars = content.chars().count(), "Reply complete");
        let message = self.local_message(SenderType::Character, content);
        Ok(self.push(message))
    }

    /// `push_user` followed by `receive`.
    pub async fn send(&mut self, text: &str, reply: EventStream) -> ChatResult<&ChatMessage> {
        self.push_user(text)?;
        self.receive(reply).await
    }

    fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.observer.message_added(&message);
        self.transcript.push(message);
        &self.transcript[self.transcript.len() - 1]
    }

    fn local_message(&self, sender_type: SenderType, content: String) -> ChatMessage {
        let sender = match sender_type {
            SenderType::User => USER_SENDER.to_string(),
            SenderType::Character => self.character_name().to_string(),
        };
        ChatMessage {
            id: Id::new(format!("msg-{}", Uuid::new_v4())),
            sender,
            sender_type,
            content,
            created_at: Some(chrono::Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        }
    }
}

#[cfg(test)]
mod tests;
