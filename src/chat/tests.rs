use super::*;
use bytes::Bytes;
use futures::stream;
use std::sync::Mutex;

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<String>>,
    added: Mutex<Vec<String>>,
    discarded: Mutex<usize>,
}

impl ChatObserver for Recorder {
    fn message_added(&self, message: &ChatMessage) {
        self.added.lock().unwrap().push(message.content.clone());
    }

    fn reply_progress(&self, buffer: &str) {
        self.progress.lock().unwrap().push(buffer.to_string());
    }

    fn reply_discarded(&self) {
        *self.discarded.lock().unwrap() += 1;
    }
}

fn session_with(recorder: Arc<Recorder>) -> ChatSession {
    ChatSession::new(Id::new("12"), "林黛").with_observer(recorder)
}

#[tokio::test]
async fn chunks_accumulate_in_arrival_order() {
    let recorder = Arc::new(Recorder::default());
    let mut chat = session_with(recorder.clone());

    let reply = EventStream::from_messages(vec!["Hello".to_string(), " world".to_string()]);
    let message = chat.send("hi", reply).await.unwrap();

    assert_eq!(message.content, "Hello world");
    assert_eq!(message.sender_type, SenderType::Character);
    assert_eq!(message.sender, "林黛");
    assert_eq!(*recorder.progress.lock().unwrap(), vec!["Hello", "Hello world"]);
    assert_eq!(*recorder.added.lock().unwrap(), vec!["hi", "Hello world"]);
    assert!(!chat.is_streaming());

    let transcript = chat.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].sender, "User");
    assert_eq!(transcript[0].sender_type, SenderType::User);
    assert_ne!(transcript[0].id, transcript[1].id);
}

#[tokio::test]
async fn reply_decoded_from_raw_sse_body() {
    let body = stream::iter(vec![
        Ok::<_, TransportError>(Bytes::from_static(b"data: Hel")),
        Ok(Bytes::from_static(b"lo\n\ndata:  world\n\n")),
    ])
    .boxed();
    let mut chat = ChatSession::new(Id::new("1"), "");

    let message = chat.receive(EventStream::new(body, crate::sse::SseDecoder::new())).await.unwrap();
    assert_eq!(message.content, "Hello world");
    assert_eq!(message.sender, "character");
}

#[tokio::test]
async fn failed_stream_drops_partial_reply_but_keeps_user_message() {
    let recorder = Arc::new(Recorder::default());
    let mut chat = session_with(recorder.clone());
    let body = stream::iter(vec![
        Ok(Bytes::from_static(b"data: partial\n")),
        Err(TransportError::Connect("reset by peer".to_string())),
    ])
    .boxed();

    let result = chat
        .send("你好", EventStream::new(body, crate::sse::SseDecoder::new()))
        .await;

    assert!(matches!(result, Err(ChatError::Stream(TransportError::Connect(_)))));
    assert_eq!(chat.transcript().len(), 1);
    assert_eq!(chat.transcript()[0].content, "你好");
    assert!(chat.streaming_text().is_none());
    assert_eq!(*recorder.discarded.lock().unwrap(), 1);
}

#[tokio::test]
async fn blank_message_is_refused() {
    let mut chat = ChatSession::new(Id::new("1"), "林黛");
    let result = chat.send("   \n", EventStream::from_messages(Vec::new())).await;
    assert!(matches!(result, Err(ChatError::EmptyMessage)));
    assert!(chat.transcript().is_empty());
}

#[test]
fn new_session_opens_with_greeting() {
    let chat = ChatSession::new(Id::new("3"), "周瑜").with_greeting();
    assert_eq!(chat.transcript().len(), 1);
    assert_eq!(chat.transcript()[0].content, "你好，我是 周瑜。");
    assert_eq!(chat.transcript()[0].sender_type, SenderType::Character);
}

#[test]
fn history_is_kept_and_clear_empties_it() {
    let history = vec![ChatMessage {
        id: Id::new("9"),
        sender: "User".to_string(),
        sender_type: SenderType::User,
        content: "早".to_string(),
        created_at: Some("2024-05-01T08:00:00".to_string()),
    }];
    let mut chat = ChatSession::new(Id::new("3"), "周瑜").with_history(history.clone());
    assert_eq!(chat.transcript(), &history[..]);

    chat.clear();
    assert!(chat.transcript().is_empty());
}
