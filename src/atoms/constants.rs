// ── Kaiwa Atoms: Constants ─────────────────────────────────────────────────
// Endpoint paths, stream framing, and UI timing knobs in one place.

/// Default backend base URL (the Dify-proxy service).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// `POST` — body `{message, dify_app_id, conversation_id}`, response is a
/// newline-delimited stream of `data: {json}` records.
pub const CHAT_STREAM_PATH: &str = "/api/chat-stream";

/// `GET` list / `GET {id}` detail / `DELETE {id}`.
pub const CONVERSATIONS_PATH: &str = "/api/conversations";

/// `GET` — selectable Dify applications.
pub const DIFY_APPS_PATH: &str = "/api/dify-apps";

/// Response-analysis page for a finished message. Kaiwa only prints the
/// URL; the page itself is served elsewhere.
pub const ANALYSIS_PATH: &str = "/analysis";

// ── Stream framing ─────────────────────────────────────────────────────────

/// Field prefix marking a protocol record in the response stream.
pub const SSE_DATA_PREFIX: &str = "data: ";

/// End-of-stream sentinel payload. Not an event — skipped.
pub const SSE_DONE_SENTINEL: &str = "[DONE]";

// ── History timing ─────────────────────────────────────────────────────────

/// Attempts for the initial history load.
pub const HISTORY_LOAD_ATTEMPTS: u32 = 3;

/// Linear backoff step for the initial history load (1s, 2s, 3s).
pub const HISTORY_RETRY_STEP_MS: u64 = 1_000;

/// Delay before the reconciliation refresh after a successful delete.
pub const RECONCILE_AFTER_DELETE_OK_MS: u64 = 500;

/// Delay before the reconciliation refresh after a failed delete.
pub const RECONCILE_AFTER_DELETE_ERR_MS: u64 = 1_000;

// ── UI strings ─────────────────────────────────────────────────────────────

/// Shown in place of an empty conversation list.
pub const EMPTY_HISTORY_PLACEHOLDER: &str = "No saved conversations yet.";

/// Connect timeout for the shared HTTP client. There is deliberately no
/// read timeout: the chat stream stays open as long as the server keeps it.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;
