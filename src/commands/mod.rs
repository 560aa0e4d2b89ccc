// ── Kaiwa Commands — REPL Boundary ─────────────────────────────────────────
// Thin dispatch layer: parse an input line, delegate to the engine
// components, print notices. Heavy logic lives in engine/; these functions
// only parse, delegate, and report.
//
// Plain text sends a chat message; `/`-prefixed lines are commands.
// Destructive actions (delete, app switch over an active conversation) use
// a pending-confirmation step answered on the next input line.

use crate::atoms::types::DifyApp;
use crate::engine::api::Backend;
use crate::engine::chat::Chat;
use crate::engine::history::History;
use crate::engine::ui::Ui;
use crate::engine::SharedSession;
use log::info;

// ── Command grammar ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text — send as a chat message.
    Send(String),
    New,
    History,
    Apps,
    Load(String),
    Delete(String),
    Find(String),
    App(i64),
    Analyze(String),
    Help,
    Quit,
}

/// Parse one input line. Errors are user-facing usage notices.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Ok(Command::Send(line.to_string()));
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();
    match verb {
        "/new" => Ok(Command::New),
        "/history" => Ok(Command::History),
        "/apps" => Ok(Command::Apps),
        "/load" if !rest.is_empty() => Ok(Command::Load(rest.to_string())),
        "/load" => Err("usage: /load <conversation-id>".into()),
        "/delete" if !rest.is_empty() => Ok(Command::Delete(rest.to_string())),
        "/delete" => Err("usage: /delete <conversation-id>".into()),
        "/find" => Ok(Command::Find(rest.to_string())),
        "/app" => rest
            .parse::<i64>()
            .map(Command::App)
            .map_err(|_| "usage: /app <id>".to_string()),
        "/analyze" if !rest.is_empty() => Ok(Command::Analyze(rest.to_string())),
        "/analyze" => Err("usage: /analyze <message-id>".into()),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command {}. /help lists commands.", other)),
    }
}

// ── Dispatch ───────────────────────────────────────────────────────────────

enum Pending {
    DeleteConversation(String),
    SwitchApp(i64),
}

pub struct App {
    chat: Chat,
    history: History,
    backend: Backend,
    session: SharedSession,
    ui: Ui,
    apps: Vec<DifyApp>,
    pending: Option<Pending>,
}

impl App {
    pub fn new(
        chat: Chat,
        history: History,
        backend: Backend,
        session: SharedSession,
        ui: Ui,
        apps: Vec<DifyApp>,
    ) -> Self {
        App { chat, history, backend, session, ui, apps, pending: None }
    }

    /// Handle one input line. Returns `false` when the REPL should exit.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        if let Some(pending) = self.pending.take() {
            let yes = matches!(line.trim().to_lowercase().as_str(), "y" | "yes");
            match pending {
                Pending::DeleteConversation(id) => {
                    if yes {
                        self.history.delete(&id, &self.chat).await;
                    } else {
                        self.ui.notice("Delete cancelled.");
                    }
                }
                Pending::SwitchApp(id) => {
                    if yes {
                        self.switch_app(id);
                    } else {
                        self.ui.notice("App switch cancelled.");
                    }
                }
            }
            return true;
        }

        if line.trim().is_empty() {
            return true;
        }
        match parse(line) {
            Ok(command) => self.dispatch(command).await,
            Err(notice) => {
                self.ui.notice(&notice);
                true
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> bool {
        match command {
            Command::Quit => return false,
            Command::Help => self.help(),
            Command::Send(text) => {
                if let Err(e) = self.chat.send(&text, &self.history).await {
                    // Transport failures were already surfaced by the chat
                    // component; validation comes back here as a notice.
                    if e.is_validation() {
                        self.ui.notice(&e.to_string());
                    }
                }
            }
            Command::New => self.chat.new_chat(),
            Command::History => self.history.load().await,
            Command::Apps => self.ui.apps(&self.apps, self.session.lock().app_id),
            Command::Load(id) => self.history.load_conversation(&id, &self.chat).await,
            Command::Delete(id) => {
                self.ui.notice(&format!("Delete conversation {}? (y/N)", id));
                self.pending = Some(Pending::DeleteConversation(id));
            }
            Command::Find(term) => self.history.show_filtered(&term),
            Command::App(id) => self.request_app_switch(id),
            Command::Analyze(message_id) => {
                // Navigation stub — the analysis page is served elsewhere.
                self.ui
                    .notice(&format!("Open in a browser: {}", self.backend.analysis_url(&message_id)));
            }
        }
        true
    }

    fn request_app_switch(&mut self, id: i64) {
        if !self.apps.is_empty() && !self.apps.iter().any(|a| a.id == id) {
            self.ui.notice("No such app. /apps lists them.");
            return;
        }
        let (same, has_conversation) = {
            let session = self.session.lock();
            (session.app_id == Some(id), session.conversation_id.is_some())
        };
        if same {
            return;
        }
        if has_conversation {
            self.ui
                .notice("Switching apps resets the current conversation. Continue? (y/N)");
            self.pending = Some(Pending::SwitchApp(id));
        } else {
            self.switch_app(id);
        }
    }

    fn switch_app(&mut self, id: i64) {
        self.session.lock().app_id = Some(id);
        info!("[app] switched to app {}", id);
        self.chat.new_chat();
    }

    fn help(&self) {
        self.ui.notice("commands:");
        self.ui.notice("  <text>           send a message");
        self.ui.notice("  /new             start a new chat");
        self.ui.notice("  /history         show saved conversations");
        self.ui.notice("  /find <term>     filter conversations by title or app");
        self.ui.notice("  /load <id>       load a conversation");
        self.ui.notice("  /delete <id>     delete a conversation");
        self.ui.notice("  /apps            list apps");
        self.ui.notice("  /app <id>        switch the active app");
        self.ui.notice("  /analyze <id>    show the analysis URL for a message");
        self.ui.notice("  /quit            exit");
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_send() {
        assert_eq!(parse("hello there"), Ok(Command::Send("hello there".into())));
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse("/new"), Ok(Command::New));
        assert_eq!(parse("/load 7"), Ok(Command::Load("7".into())));
        assert_eq!(parse("/delete 7"), Ok(Command::Delete("7".into())));
        assert_eq!(parse("/find billing"), Ok(Command::Find("billing".into())));
        assert_eq!(parse("/find"), Ok(Command::Find(String::new())));
        assert_eq!(parse("/app 2"), Ok(Command::App(2)));
        assert_eq!(parse("/quit"), Ok(Command::Quit));
    }

    #[test]
    fn bad_usage_is_a_notice() {
        assert!(parse("/load").is_err());
        assert!(parse("/app two").is_err());
        assert!(parse("/frobnicate").is_err());
    }
}
