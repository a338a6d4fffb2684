use super::SseDecoder;
use crate::gateway::TransportError;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Decoded messages of a streaming response, in arrival order.
///
/// Ends when the body ends (or at the decoder's sentinel). A transport failure is
/// yielded once as `Err` and then the stream ends.
pub struct EventStream {
    inner: BoxStream<'static, Result<String, TransportError>>,
}

struct DecodeState {
    body: BoxStream<'static, Result<Bytes, TransportError>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

impl EventStream {
    pub fn new(body: BoxStream<'static, Result<Bytes, TransportError>>, decoder: SseDecoder) -> Self {
        let state = DecodeState {
            body,
            decoder,
            pending: VecDeque::new(),
            done: false,
        };

        let inner = stream::unfold(state, |mut st| async move {
            loop {
                if let Some(message) = st.pending.pop_front() {
                    return Some((Ok(message), st));
                }
                if st.done {
                    return None;
                }
                match st.body.next().await {
                    Some(Ok(chunk)) => {
                        st.pending.extend(st.decoder.feed(&chunk));
                        st.done = st.decoder.is_closed();
                    }
                    Some(Err(e)) => {
                        st.done = true;
                        return Some((Err(e), st));
                    }
                    None => {
                        st.pending.extend(st.decoder.finish());
                        st.done = true;
                    }
                }
            }
        })
        .boxed();

        Self { inner }
    }

    /// Stream over already-decoded messages.
    pub fn from_messages<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner: stream::iter(messages.into_iter().map(Ok)).boxed(),
        }
    }

    /// Drains the stream into one string.
    pub async fn collect_text(mut self) -> Result<String, TransportError> {
        let mut text = String::new();
        while let Some(message) = self.next().await {
            text.push_str(&message?);
        }
        Ok(text)
    }
}

impl Stream for EventStream {
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventStream")
    }
}
