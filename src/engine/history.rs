// ── Kaiwa Engine: History Component ────────────────────────────────────────
// Cached list of saved conversations: load (renders the sidebar), silent
// refresh, client-side filtering, deletion with optimistic local removal,
// and loading a conversation into the chat component.
//
// Deletion always schedules a delayed reconciliation refresh — success or
// not — so the local cache can never stay pointing at server state it has
// drifted from.

use crate::atoms::constants::{
    EMPTY_HISTORY_PLACEHOLDER, HISTORY_LOAD_ATTEMPTS, HISTORY_RETRY_STEP_MS,
    RECONCILE_AFTER_DELETE_ERR_MS, RECONCILE_AFTER_DELETE_OK_MS,
};
use crate::atoms::error::ClientResult;
use crate::atoms::types::ConversationSummary;
use crate::engine::api::Backend;
use crate::engine::chat::Chat;
use crate::engine::ui::Ui;
use crate::engine::SharedSession;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

// ── Retry policy ───────────────────────────────────────────────────────────

/// Bounded retry: attempt count plus a delay function over the attempt
/// index.
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: fn(u32) -> Duration,
}

impl RetryPolicy {
    /// The initial-history-load schedule: 3 attempts, 1s / 2s / 3s.
    pub fn initial_history_load() -> Self {
        RetryPolicy { attempts: HISTORY_LOAD_ATTEMPTS, delay: linear_backoff }
    }
}

fn linear_backoff(attempt: u32) -> Duration {
    Duration::from_millis(HISTORY_RETRY_STEP_MS * (attempt as u64 + 1))
}

// ── History component ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct History {
    backend: Backend,
    session: SharedSession,
    cache: Arc<Mutex<Vec<ConversationSummary>>>,
    ui: Ui,
}

impl History {
    pub fn new(backend: Backend, session: SharedSession, ui: Ui) -> Self {
        History { backend, session, cache: Arc::new(Mutex::new(Vec::new())), ui }
    }

    pub fn cached(&self) -> Vec<ConversationSummary> {
        self.cache.lock().clone()
    }

    // ── Loading ────────────────────────────────────────────────────────────

    /// Fetch the list, replace the cache, render the sidebar. On failure
    /// the previous cache (and whatever is on screen) stays untouched.
    pub async fn load(&self) {
        match self.fetch_and_replace().await {
            Ok(count) => {
                info!("[history] loaded {} conversations", count);
                self.render();
            }
            Err(e) => self.ui.error(&format!("Failed to load history: {}", e)),
        }
    }

    /// Cache-only refresh: no sidebar print, failures logged not surfaced.
    /// Used by the post-answer refresh and the delete reconciliation.
    pub async fn refresh(&self) {
        match self.fetch_and_replace().await {
            Ok(count) => info!("[history] refreshed ({} conversations)", count),
            Err(e) => warn!("[history] background refresh failed: {}", e),
        }
    }

    /// Initial load with the bounded retry policy. Exhausted retries
    /// surface one final error.
    pub async fn load_with_retry(&self, policy: RetryPolicy) {
        for attempt in 0..policy.attempts {
            match self.fetch_and_replace().await {
                Ok(count) => {
                    info!("[history] loaded {} conversations", count);
                    self.render();
                    return;
                }
                Err(e) => {
                    warn!(
                        "[history] initial load attempt {}/{} failed: {}",
                        attempt + 1,
                        policy.attempts,
                        e
                    );
                    if attempt + 1 < policy.attempts {
                        tokio::time::sleep((policy.delay)(attempt)).await;
                    }
                }
            }
        }
        self.ui.error("Failed to load history — check that the backend is running.");
    }

    async fn fetch_and_replace(&self) -> ClientResult<usize> {
        let list = self.backend.conversations().await?;
        let count = list.len();
        *self.cache.lock() = list;
        Ok(count)
    }

    // ── Filtering ──────────────────────────────────────────────────────────

    /// Case-insensitive substring match over title and owning-app name,
    /// against the cache only. An empty term matches everything.
    pub fn filter(&self, term: &str) -> Vec<ConversationSummary> {
        let cache = self.cache.lock();
        if term.is_empty() {
            return cache.clone();
        }
        let needle = term.to_lowercase();
        cache
            .iter()
            .filter(|c| {
                c.title.to_lowercase().contains(&needle)
                    || c.dify_app_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn show_filtered(&self, term: &str) {
        let items = self.filter(term);
        self.render_items(&items);
    }

    // ── Rendering ──────────────────────────────────────────────────────────

    pub fn render(&self) {
        let items = self.cache.lock().clone();
        self.render_items(&items);
    }

    /// The active highlight is recomputed from the session on every render.
    fn render_items(&self, items: &[ConversationSummary]) {
        let active = self.session.lock().conversation_id.clone();
        self.ui.sidebar(items, active.as_deref());
    }

    // ── Deletion ───────────────────────────────────────────────────────────

    /// Delete a conversation (confirmation happens at the command layer).
    /// Success removes it locally at once; either way a reconciliation
    /// refresh runs shortly after.
    pub async fn delete(&self, id: &str, chat: &Chat) {
        match self.backend.delete_conversation(id).await {
            Ok(()) => {
                self.ui.success("Conversation deleted.");
                self.apply_delete_success(id, chat);
                self.schedule_reconcile(RECONCILE_AFTER_DELETE_OK_MS);
            }
            Err(e) => {
                self.ui.error(&format!("Failed to delete conversation: {}", e));
                self.schedule_reconcile(RECONCILE_AFTER_DELETE_ERR_MS);
            }
        }
    }

    /// Local state transition after a confirmed server-side delete: if the
    /// deleted conversation was active, reset to the new-chat state; then
    /// drop it from the cache.
    pub fn apply_delete_success(&self, id: &str, chat: &Chat) {
        if self.session.lock().is_active(id) {
            chat.new_chat();
        }
        let mut cache = self.cache.lock();
        cache.retain(|c| c.id != id);
        let now_empty = cache.is_empty();
        drop(cache);
        if now_empty {
            self.ui.notice(EMPTY_HISTORY_PLACEHOLDER);
        }
    }

    fn schedule_reconcile(&self, delay_ms: u64) {
        let history = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            history.refresh().await;
        });
    }

    // ── Conversation load ──────────────────────────────────────────────────

    /// Fetch full detail and hand it to the chat component for replay.
    /// Failure leaves the current chat view intact.
    pub async fn load_conversation(&self, id: &str, chat: &Chat) {
        match self.backend.conversation(id).await {
            Ok(conversation) => {
                chat.replay(&conversation);
                self.render();
            }
            Err(e) => self.ui.error(&format!("Failed to load conversation: {}", e)),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
