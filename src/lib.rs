// ── Kaiwa ──────────────────────────────────────────────────────────────────
// Terminal front end for a Dify-proxy chat backend: streams answers over an
// SSE-style HTTP response, paints them incrementally, and manages the list
// of saved conversations.
//
// Layering (one-way, bottom up):
//   atoms/    — pure constants, errors, data types
//   engine/   — backend client, stream decoding, chat & history components
//   commands/ — REPL parsing and dispatch

pub mod atoms;
pub mod commands;
pub mod engine;

pub use atoms::error::{ClientError, ClientResult};
pub use atoms::types::{Role, Session, StreamEvent};
