// ── Kaiwa Engine ───────────────────────────────────────────────────────────
// The organisms: backend client, stream decoding, the chat and history
// components, rendering, and the terminal surface. Engine modules never
// import from commands/ — they are called by it.

pub mod api;
pub mod chat;
pub mod history;
pub mod render;
pub mod sse;
pub mod ui;

use crate::atoms::types::Session;
use parking_lot::Mutex;
use std::sync::Arc;

/// The single session record, constructed once at startup and handed by
/// reference to each component. Touched only in short synchronous sections;
/// no multi-field atomicity is assumed beyond one lock scope.
pub type SharedSession = Arc<Mutex<Session>>;

pub fn shared_session(session: Session) -> SharedSession {
    Arc::new(Mutex::new(session))
}
