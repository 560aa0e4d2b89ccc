// ── Kaiwa Engine: Chat Component ───────────────────────────────────────────
// Owns the active conversation's transcript and the streaming send flow:
//
//   Idle → Sending → Streaming → Finalizing → Idle
//
// with error exits from Sending/Streaming back to Idle. Only one send may
// be in flight; the busy flag is advisory — a rejected send is refused with
// a validation error, never queued.
//
// Transcript entries hold raw markdown as the single source of truth; the
// painted view is regenerated from raw content on every mutation.

use crate::atoms::error::{ClientError, ClientResult};
use crate::atoms::types::{ChatStreamRequest, Conversation, Role, StreamEvent};
use crate::engine::api::Backend;
use crate::engine::history::History;
use crate::engine::render::Renderer;
use crate::engine::sse::{data_payload, decode_event, LineBuffer};
use crate::engine::ui::Ui;
use crate::engine::SharedSession;
use futures::{Stream, StreamExt};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

// ── Transcript model ───────────────────────────────────────────────────────

/// One message in the in-memory transcript.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub role: Role,
    /// Raw markdown source — the authoritative content.
    pub raw: String,
    pub message_id: Option<String>,
    /// Whether follow-up action affordances are attached. A duplicate
    /// `message_end` replaces the previous set.
    pub has_actions: bool,
}

impl TranscriptEntry {
    fn user(raw: impl Into<String>) -> Self {
        TranscriptEntry { role: Role::User, raw: raw.into(), message_id: None, has_actions: false }
    }

    fn assistant(raw: impl Into<String>) -> Self {
        TranscriptEntry {
            role: Role::Assistant,
            raw: raw.into(),
            message_id: None,
            has_actions: false,
        }
    }
}

// ── Chat component ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Chat {
    backend: Backend,
    session: SharedSession,
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
    renderer: Renderer,
    ui: Ui,
}

impl Chat {
    pub fn new(backend: Backend, session: SharedSession, renderer: Renderer, ui: Ui) -> Self {
        Chat {
            backend,
            session,
            transcript: Arc::new(Mutex::new(Vec::new())),
            renderer,
            ui,
        }
    }

    pub fn transcript_snapshot(&self) -> Vec<TranscriptEntry> {
        self.transcript.lock().clone()
    }

    // ── Send flow ──────────────────────────────────────────────────────────

    /// Validate, post the message, and consume the response stream to the
    /// end. Validation failures are returned for the caller to surface;
    /// transport failures are surfaced here and returned. Every exit path
    /// leaves the busy flag cleared.
    pub async fn send(&self, text: &str, history: &History) -> ClientResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::Validation("Type a message first.".into()));
        }

        let (app_id, conversation_id) = {
            let mut session = self.session.lock();
            if session.busy {
                return Err(ClientError::Validation(
                    "Still answering the previous message — wait for it to finish.".into(),
                ));
            }
            let app_id = match session.app_id {
                Some(id) => id,
                None => {
                    return Err(ClientError::Validation(
                        "Select an app first (/apps, then /app <id>).".into(),
                    ))
                }
            };
            session.busy = true;
            (app_id, session.conversation_id.clone())
        };

        let result = self.send_inner(text, app_id, conversation_id, history).await;

        // Error exits skip finalize — clear the flag here too.
        self.session.lock().busy = false;
        if let Err(e) = &result {
            self.ui.live_end();
            self.ui.error(&format!("Chat request failed: {}", e));
        }
        result
    }

    /// The transcript side of entering Sending: append the user's message
    /// and the empty assistant placeholder, and open the live region.
    pub fn begin_exchange(&self, text: &str) {
        {
            let mut transcript = self.transcript.lock();
            transcript.push(TranscriptEntry::user(text));
            transcript.push(TranscriptEntry::assistant(""));
        }
        self.ui.user_message(text);
        self.ui.assistant_header();
        self.ui.live_repaint("", true);
    }

    async fn send_inner(
        &self,
        text: &str,
        app_id: i64,
        conversation_id: Option<String>,
        history: &History,
    ) -> ClientResult<()> {
        self.begin_exchange(text);

        let request = ChatStreamRequest {
            message: text.to_string(),
            dify_app_id: app_id,
            conversation_id,
        };
        let response = self.backend.open_chat_stream(&request).await?;
        self.consume_stream(response.bytes_stream(), history).await
    }

    // ── Streaming ingestion ────────────────────────────────────────────────

    /// Consume the response body chunk by chunk. Chunk boundaries are
    /// arbitrary; only complete lines are decoded. End-of-transport is the
    /// one place the busy flag is guaranteed cleared — even when no
    /// `message_end` event ever arrived.
    pub async fn consume_stream<B, E>(
        &self,
        mut stream: impl Stream<Item = Result<B, E>> + Unpin,
        history: &History,
    ) -> ClientResult<()>
    where
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let mut buffer = LineBuffer::new();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| ClientError::Stream(format!("stream read failed: {}", e)))?;
            for line in buffer.push(chunk.as_ref()) {
                self.process_line(&line, history);
            }
        }
        if let Some(line) = buffer.finish() {
            self.process_line(&line, history);
        }
        self.finalize();
        Ok(())
    }

    fn process_line(&self, line: &str, history: &History) {
        let Some(payload) = data_payload(line) else { return };
        if let Some(event) = decode_event(payload) {
            self.apply_event(event, history);
        }
    }

    /// Apply one decoded stream event to the transcript and the view.
    /// Events are processed strictly in arrival order.
    fn apply_event(&self, event: StreamEvent, history: &History) {
        match event {
            StreamEvent::Message { answer } => {
                if answer.is_empty() {
                    return;
                }
                let rendered = {
                    let mut transcript = self.transcript.lock();
                    let Some(entry) =
                        transcript.iter_mut().rev().find(|e| e.role == Role::Assistant)
                    else {
                        return;
                    };
                    entry.raw.push_str(&answer);
                    self.renderer.render(&entry.raw)
                };
                self.ui.live_repaint(&rendered, true);
            }

            StreamEvent::MessageEnd { conversation_id, message_id } => {
                if let Some(id) = conversation_id {
                    info!("[chat] adopted conversation id {}", id);
                    self.session.lock().adopt_conversation(id);
                }

                let (rendered, attached_id) = {
                    let mut transcript = self.transcript.lock();
                    match transcript.iter_mut().rev().find(|e| e.role == Role::Assistant) {
                        Some(entry) => {
                            match &message_id {
                                Some(id) => {
                                    // Replaces any previously attached set —
                                    // duplicate message_end is tolerated.
                                    entry.message_id = Some(id.clone());
                                    entry.has_actions = true;
                                }
                                None => warn!(
                                    "[chat] message_end without message_id — actions omitted"
                                ),
                            }
                            (self.renderer.render(&entry.raw), entry.message_id.clone())
                        }
                        None => (String::new(), None),
                    }
                };

                if self.ui.live_active() {
                    self.ui.live_repaint(&rendered, false);
                    self.ui.live_end();
                }
                if let Some(id) = attached_id {
                    self.ui.action_hint(&id);
                }

                // Background refresh so the (possibly new) conversation
                // shows up in the sidebar cache.
                let history = history.clone();
                tokio::spawn(async move { history.refresh().await });
            }

            StreamEvent::Error { message } => {
                self.ui.error(&message);
            }
        }
    }

    /// End-of-transport. Drops the typing indicator if no `message_end`
    /// arrived, and clears the busy flag unconditionally.
    fn finalize(&self) {
        self.session.lock().busy = false;
        if self.ui.live_active() {
            let rendered = {
                let transcript = self.transcript.lock();
                transcript
                    .iter()
                    .rev()
                    .find(|e| e.role == Role::Assistant)
                    .map(|e| self.renderer.render(&e.raw))
                    .unwrap_or_default()
            };
            self.ui.live_repaint(&rendered, false);
            self.ui.live_end();
        }
        self.ui.blank();
        info!("[chat] stream complete");
    }

    // ── Replay & reset ─────────────────────────────────────────────────────

    /// Project a fetched conversation into the transcript and the view.
    /// Pure projection — no network calls.
    pub fn replay(&self, conversation: &Conversation) {
        {
            let mut session = self.session.lock();
            session.conversation_id = Some(conversation.id.clone());
            session.app_id = Some(conversation.dify_app_id);
        }

        let mut transcript = self.transcript.lock();
        transcript.clear();
        self.ui.blank();
        for message in &conversation.messages {
            match message.role {
                Role::User => {
                    transcript.push(TranscriptEntry::user(message.content.clone()));
                    self.ui.user_message(&message.content);
                }
                Role::Assistant => {
                    transcript.push(TranscriptEntry {
                        role: Role::Assistant,
                        raw: message.content.clone(),
                        message_id: message.id.clone(),
                        has_actions: message.id.is_some(),
                    });
                    self.ui.assistant_header();
                    self.ui.assistant_block(&self.renderer.render(&message.content));
                    if let Some(id) = &message.id {
                        self.ui.action_hint(id);
                    }
                    self.ui.blank();
                }
                Role::Unknown => warn!("[chat] skipping message with unknown role"),
            }
        }
        info!(
            "[chat] loaded conversation {} ({} messages)",
            conversation.id,
            conversation.messages.len()
        );
    }

    /// "New chat": drop the active conversation, clear the transcript, show
    /// the welcome view. The app selection survives.
    pub fn new_chat(&self) {
        self.session.lock().start_new_chat();
        self.transcript.lock().clear();
        self.ui.welcome();
    }
}
