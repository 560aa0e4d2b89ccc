// ── Kaiwa Engine: Terminal Surface ─────────────────────────────────────────
// All writes to the terminal go through `Ui`: notifications, the welcome
// view, transcript blocks, the conversation sidebar, and the live region —
// the lines occupied by the in-progress assistant message, erased and
// repainted on every accumulator mutation (the terminal analog of replacing
// a message element's rendered HTML).
//
// The sink is injectable so tests can capture output.

use crate::atoms::constants::EMPTY_HISTORY_PLACEHOLDER;
use crate::atoms::types::{ConversationSummary, DifyApp};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Typing indicator appended to the live region while streaming.
const TYPING_CURSOR: &str = "▌";

// ── Ui ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Ui {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
    /// Number of terminal lines the live region currently occupies
    /// (0 = no live region).
    live_lines: Arc<Mutex<usize>>,
}

impl Ui {
    pub fn stdout() -> Self {
        Ui {
            out: Arc::new(Mutex::new(Box::new(std::io::stdout()))),
            live_lines: Arc::new(Mutex::new(0)),
        }
    }

    /// A Ui writing into an in-memory buffer, for tests.
    pub fn capture() -> (Self, CaptureBuffer) {
        let buf = CaptureBuffer::default();
        let ui = Ui {
            out: Arc::new(Mutex::new(Box::new(buf.clone()))),
            live_lines: Arc::new(Mutex::new(0)),
        };
        (ui, buf)
    }

    fn write(&self, s: &str) {
        let mut out = self.out.lock();
        let _ = out.write_all(s.as_bytes());
        let _ = out.flush();
    }

    // ── Notifications ──────────────────────────────────────────────────────

    pub fn error(&self, msg: &str) {
        self.write(&format!("{}✖ {}{}\n", RED, msg, RESET));
    }

    pub fn success(&self, msg: &str) {
        self.write(&format!("{}✔ {}{}\n", GREEN, msg, RESET));
    }

    pub fn notice(&self, msg: &str) {
        self.write(&format!("{}· {}{}\n", DIM, msg, RESET));
    }

    pub fn blank(&self) {
        self.write("\n");
    }

    pub fn prompt(&self) {
        self.write(&format!("{}❯{} ", BOLD, RESET));
    }

    // ── Chat views ─────────────────────────────────────────────────────────

    pub fn welcome(&self) {
        self.write(&format!(
            "{}Start a chat{}\nPick an app with /app <id> and type a message. /help lists commands.\n\n",
            BOLD, RESET
        ));
    }

    pub fn user_message(&self, content: &str) {
        self.write(&format!("{}you ▸{} {}\n\n", BOLD, RESET, content));
    }

    pub fn assistant_header(&self) {
        self.write(&format!("{}assistant ▸{}\n", DIM, RESET));
    }

    /// A finished assistant block (replay path).
    pub fn assistant_block(&self, rendered: &str) {
        self.write(&format!("{}\n", rendered));
    }

    /// Follow-up affordance for a finished assistant message.
    pub fn action_hint(&self, message_id: &str) {
        self.write(&format!(
            "{}  ↪ analysis available: /analyze {}{}\n",
            DIM, message_id, RESET
        ));
    }

    // ── Live region ────────────────────────────────────────────────────────

    /// Erase the previous live region and repaint it with the full rendered
    /// content. Line accounting assumes unwrapped lines; long lines degrade
    /// to leftover text above the region.
    pub fn live_repaint(&self, rendered: &str, typing: bool) {
        let mut lines = self.live_lines.lock();
        let mut s = String::new();
        if *lines > 0 {
            s.push_str(&format!("\x1b[{}A\r\x1b[0J", *lines));
        }
        let content = if typing {
            format!("{}{}", rendered, TYPING_CURSOR)
        } else {
            rendered.to_string()
        };
        let count = content.matches('\n').count() + 1;
        s.push_str(&content);
        s.push('\n');
        *lines = count;
        self.write(&s);
    }

    /// Release the live region — whatever is painted stays as-is.
    pub fn live_end(&self) {
        *self.live_lines.lock() = 0;
    }

    /// Whether a live region is currently painted.
    pub fn live_active(&self) -> bool {
        *self.live_lines.lock() > 0
    }

    // ── Sidebar ────────────────────────────────────────────────────────────

    pub fn sidebar(&self, items: &[ConversationSummary], active_id: Option<&str>) {
        let mut s = format!("{}── conversations ──{}\n", BOLD, RESET);
        if items.is_empty() {
            s.push_str(&format!("{}{}{}\n", DIM, EMPTY_HISTORY_PLACEHOLDER, RESET));
        } else {
            for item in items {
                let marker = if active_id == Some(item.id.as_str()) { "▸" } else { " " };
                s.push_str(&format!(
                    "{} [{}] {}  {}{} · {}{}\n",
                    marker,
                    item.id,
                    item.title,
                    DIM,
                    item.dify_app_name,
                    fmt_timestamp(&item.created_at),
                    RESET
                ));
            }
        }
        self.write(&s);
    }

    pub fn apps(&self, apps: &[DifyApp], active: Option<i64>) {
        let mut s = format!("{}── apps ──{}\n", BOLD, RESET);
        for app in apps {
            let marker = if active == Some(app.id) { "▸" } else { " " };
            match &app.description {
                Some(d) => s.push_str(&format!(
                    "{} [{}] {}  {}{}{}\n",
                    marker, app.id, app.name, DIM, d, RESET
                )),
                None => s.push_str(&format!("{} [{}] {}\n", marker, app.id, app.name)),
            }
        }
        self.write(&s);
    }
}

// ── Timestamp formatting ───────────────────────────────────────────────────

/// Render the backend's ISO timestamp as `YYYY/MM/DD HH:MM`; anything
/// unparseable passes through unchanged.
pub fn fmt_timestamp(raw: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y/%m/%d %H:%M").to_string();
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y/%m/%d %H:%M").to_string();
    }
    raw.to_string()
}

// ── Capture sink (tests) ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, title: &str) -> ConversationSummary {
        ConversationSummary {
            id: id.into(),
            title: title.into(),
            dify_app_name: "sample1".into(),
            created_at: "2025-06-01T09:30:00".into(),
            updated_at: None,
        }
    }

    #[test]
    fn empty_sidebar_shows_placeholder() {
        let (ui, buf) = Ui::capture();
        ui.sidebar(&[], None);
        assert!(buf.contents().contains(EMPTY_HISTORY_PLACEHOLDER));
    }

    #[test]
    fn active_item_is_marked() {
        let (ui, buf) = Ui::capture();
        ui.sidebar(&[summary("1", "first"), summary("2", "second")], Some("2"));
        let out = buf.contents();
        assert!(out.contains("▸ [2] second"));
        assert!(out.contains("  [1] first"));
    }

    #[test]
    fn live_region_repaint_erases_previous() {
        let (ui, buf) = Ui::capture();
        ui.live_repaint("one", true);
        ui.live_repaint("one two", true);
        let out = buf.contents();
        // Second repaint must move up over the one-line region.
        assert!(out.contains("\x1b[1A\r\x1b[0J"));
        assert!(out.contains(TYPING_CURSOR));
    }

    #[test]
    fn timestamp_formats() {
        assert_eq!(fmt_timestamp("2025-06-01T09:30:00"), "2025/06/01 09:30");
        assert_eq!(fmt_timestamp("2025-06-01T09:30:00.123456"), "2025/06/01 09:30");
        assert_eq!(fmt_timestamp("not a date"), "not a date");
    }
}
