// Kaiwa integration tests — the streaming ingestion pipeline end to end,
// driven over in-memory byte streams so chunk boundaries are fully under
// test control.

use futures::stream;
use kaiwa::atoms::types::{Conversation, Role, Session, StoredMessage};
use kaiwa::engine::api::Backend;
use kaiwa::engine::chat::Chat;
use kaiwa::engine::history::History;
use kaiwa::engine::render::Renderer;
use kaiwa::engine::shared_session;
use kaiwa::engine::ui::{CaptureBuffer, Ui};
use kaiwa::engine::SharedSession;

type Chunk = Result<Vec<u8>, std::io::Error>;

/// A chat/history pair over a captured terminal and an unreachable backend
/// (nothing in these tests may touch the network).
fn fixtures(renderer: Renderer) -> (Chat, History, SharedSession, CaptureBuffer) {
    let (ui, buf) = Ui::capture();
    let backend = Backend::new("http://127.0.0.1:9").unwrap();
    let session = shared_session(Session::new(Some(1)));
    let chat = Chat::new(backend.clone(), session.clone(), renderer, ui.clone());
    let history = History::new(backend, session.clone(), ui);
    (chat, history, session, buf)
}

/// Split `data` at the given byte offsets into stream chunks.
fn chunks_at(data: &str, splits: &[usize]) -> Vec<Chunk> {
    let bytes = data.as_bytes();
    let mut out = Vec::new();
    let mut prev = 0;
    for &pos in splits {
        out.push(Ok(bytes[prev..pos].to_vec()));
        prev = pos;
    }
    out.push(Ok(bytes[prev..].to_vec()));
    out
}

/// Simulate what `send` does before streaming: transcript entries pushed,
/// busy flag set.
fn start_exchange(chat: &Chat, session: &SharedSession, text: &str) {
    chat.begin_exchange(text);
    session.lock().busy = true;
}

fn assistant_raw(chat: &Chat) -> String {
    chat.transcript_snapshot()
        .iter()
        .rev()
        .find(|e| e.role == Role::Assistant)
        .map(|e| e.raw.clone())
        .unwrap_or_default()
}

// ── Chunk-boundary reassembly ──────────────────────────────────────────────

#[tokio::test]
async fn fragments_concatenate_across_arbitrary_chunk_boundaries() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let body = concat!(
        "data: {\"event\":\"message\",\"answer\":\"こん\"}\n",
        "\n",
        "data: {\"event\":\"message\",\"answer\":\"にちは\"}\n",
        "\n",
        "data: {\"event\":\"message_end\",\"conversation_id\":\"c-1\",\"message_id\":9}\n",
        "\n",
        "data: [DONE]\n",
        "\n",
    );
    // Splits land mid-line and mid-UTF-8-sequence on purpose.
    let stream = stream::iter(chunks_at(body, &[3, 17, 18, 40, 41, 95, 120]));
    chat.consume_stream(stream, &history).await.unwrap();

    assert_eq!(assistant_raw(&chat), "こんにちは");
    assert!(!session.lock().busy);
    assert_eq!(session.lock().conversation_id.as_deref(), Some("c-1"));
}

#[tokio::test]
async fn record_split_across_two_chunks_processed_once() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":".to_vec()) as Chunk,
        Ok(b"\"message\",\"answer\":\"hi\"}\n".to_vec()),
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    assert_eq!(assistant_raw(&chat), "hi");
}

#[tokio::test]
async fn unterminated_trailing_record_still_processed() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":\"message\",\"answer\":\"tail\"}".to_vec()) as Chunk,
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    assert_eq!(assistant_raw(&chat), "tail");
}

// ── message_end semantics ──────────────────────────────────────────────────

#[tokio::test]
async fn message_end_clears_busy_and_typing_even_with_empty_reply() {
    let (chat, history, session, buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":\"message_end\",\"conversation_id\":\"c-7\",\"message_id\":42}\n".to_vec())
            as Chunk,
        Ok(b"data: [DONE]\n".to_vec()),
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    assert!(!session.lock().busy);
    assert_eq!(session.lock().conversation_id.as_deref(), Some("c-7"));
    let entry = chat.transcript_snapshot().pop().unwrap();
    assert_eq!(entry.raw, "");
    assert!(entry.has_actions);
    assert_eq!(entry.message_id.as_deref(), Some("42"));
    assert!(buf.contents().contains("/analyze 42"));
}

#[tokio::test]
async fn duplicate_message_end_replaces_action_set() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":\"message\",\"answer\":\"ok\"}\n".to_vec()) as Chunk,
        Ok(b"data: {\"event\":\"message_end\",\"message_id\":5}\n".to_vec()),
        Ok(b"data: {\"event\":\"message_end\",\"message_id\":5}\n".to_vec()),
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    let entries: Vec<_> = chat
        .transcript_snapshot()
        .into_iter()
        .filter(|e| e.role == Role::Assistant)
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].has_actions);
    assert_eq!(entries[0].message_id.as_deref(), Some("5"));
}

#[tokio::test]
async fn message_end_without_message_id_is_nonfatal() {
    let (chat, history, session, buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":\"message\",\"answer\":\"visible\"}\n".to_vec()) as Chunk,
        Ok(b"data: {\"event\":\"message_end\"}\n".to_vec()),
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    let entry = chat.transcript_snapshot().pop().unwrap();
    assert_eq!(entry.raw, "visible");
    assert!(!entry.has_actions);
    assert!(!buf.contents().contains("/analyze"));
    assert!(!session.lock().busy);
}

// ── Degradation paths ──────────────────────────────────────────────────────

#[tokio::test]
async fn error_event_surfaces_but_does_not_stop_the_read() {
    let (chat, history, session, buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":\"error\",\"error\":\"upstream hiccup\"}\n".to_vec()) as Chunk,
        Ok(b"data: {\"event\":\"message\",\"answer\":\"still here\"}\n".to_vec()),
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    assert!(buf.contents().contains("upstream hiccup"));
    assert_eq!(assistant_raw(&chat), "still here");
    assert!(!session.lock().busy);
}

#[tokio::test]
async fn malformed_record_is_dropped_and_stream_continues() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {definitely not json\n".to_vec()) as Chunk,
        Ok(b"data: {\"event\":\"ping\"}\n".to_vec()),
        Ok(b"data: {\"event\":\"message\",\"answer\":\"ok\"}\n".to_vec()),
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    assert_eq!(assistant_raw(&chat), "ok");
}

#[tokio::test]
async fn transport_error_mid_stream_is_terminal_but_finalizer_in_send_clears_busy() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":\"message\",\"answer\":\"par\"}\n".to_vec()) as Chunk,
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
    ]);
    let result = chat.consume_stream(stream, &history).await;

    assert!(result.is_err());
    // The fragment seen before the failure was kept.
    assert_eq!(assistant_raw(&chat), "par");
    // The error path skips finalize; `send` owns the unconditional clear.
    assert!(session.lock().busy);
}

#[tokio::test]
async fn eof_without_message_end_still_clears_busy() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":\"message\",\"answer\":\"half\"}\n".to_vec()) as Chunk,
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    assert!(!session.lock().busy);
    assert_eq!(assistant_raw(&chat), "half");
}

// ── Send validation ────────────────────────────────────────────────────────

#[tokio::test]
async fn send_while_busy_is_refused_without_side_effects() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    session.lock().busy = true;

    let err = chat.send("hello", &history).await.unwrap_err();
    assert!(err.is_validation());
    assert!(chat.transcript_snapshot().is_empty());
    // Refused, not queued: the flag is untouched for the in-flight send.
    assert!(session.lock().busy);
}

#[tokio::test]
async fn empty_message_and_missing_app_are_refused() {
    let (chat, history, session, _buf) = fixtures(Renderer::Plain);
    assert!(chat.send("   ", &history).await.unwrap_err().is_validation());

    session.lock().app_id = None;
    assert!(chat.send("hi", &history).await.unwrap_err().is_validation());
    assert!(chat.transcript_snapshot().is_empty());
    assert!(!session.lock().busy);
}

// ── Replay ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn replay_projects_messages_in_order_with_raw_content() {
    let (chat, _history, session, buf) = fixtures(Renderer::Plain);

    let conversation = Conversation {
        id: "3".into(),
        title: "t".into(),
        dify_app_id: 2,
        dify_conversation_id: None,
        messages: vec![
            StoredMessage {
                id: Some("10".into()),
                role: Role::User,
                content: "first question".into(),
                created_at: None,
            },
            StoredMessage {
                id: Some("11".into()),
                role: Role::Assistant,
                content: "first **answer**".into(),
                created_at: None,
            },
            StoredMessage {
                id: None,
                role: Role::Unknown,
                content: "skipped".into(),
                created_at: None,
            },
            StoredMessage {
                id: None,
                role: Role::Assistant,
                content: "second answer".into(),
                created_at: None,
            },
        ],
    };
    chat.replay(&conversation);

    let entries = chat.transcript_snapshot();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].role, Role::User);
    assert_eq!(entries[0].raw, "first question");
    assert_eq!(entries[1].raw, "first **answer**");
    assert!(entries[1].has_actions);
    assert!(!entries[2].has_actions);

    assert_eq!(session.lock().conversation_id.as_deref(), Some("3"));
    assert_eq!(session.lock().app_id, Some(2));
    assert!(buf.contents().contains("/analyze 11"));
}

// ── Rendering through the live path ────────────────────────────────────────

#[tokio::test]
async fn markdown_renderer_styles_the_painted_stream() {
    let (chat, history, session, buf) = fixtures(Renderer::Markdown);
    start_exchange(&chat, &session, "q");

    let stream = stream::iter(vec![
        Ok(b"data: {\"event\":\"message\",\"answer\":\"**bo\"}\n".to_vec()) as Chunk,
        Ok(b"data: {\"event\":\"message\",\"answer\":\"ld**\"}\n".to_vec()),
    ]);
    chat.consume_stream(stream, &history).await.unwrap();

    // Raw content is the unstyled source; the painted view carries SGR.
    assert_eq!(assistant_raw(&chat), "**bold**");
    assert!(buf.contents().contains("\x1b[1m"));
}
