// Kaiwa — terminal front end for a Dify-proxy chat backend.
//
// Bootstrap: parse flags, wire the session and the two components together,
// load the app list and the initial history, then run the input loop.

use clap::Parser;
use kaiwa::atoms::constants::DEFAULT_BASE_URL;
use kaiwa::atoms::types::Session;
use kaiwa::commands::App;
use kaiwa::engine::api::Backend;
use kaiwa::engine::chat::Chat;
use kaiwa::engine::history::{History, RetryPolicy};
use kaiwa::engine::render::Renderer;
use kaiwa::engine::shared_session;
use kaiwa::engine::ui::Ui;
use kaiwa::ClientResult;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "kaiwa", version, about = "Chat with a Dify-proxy backend from the terminal")]
struct Args {
    /// Backend base URL.
    #[arg(long, env = "KAIWA_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Initially selected app id (defaults to the first app the backend
    /// lists).
    #[arg(long, env = "KAIWA_APP_ID")]
    app_id: Option<i64>,

    /// Disable markdown rendering — show raw message text.
    #[arg(long)]
    plain: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("kaiwa: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> ClientResult<()> {
    let ui = Ui::stdout();
    let backend = Backend::new(&args.base_url)?;

    let apps = match backend.dify_apps().await {
        Ok(apps) => apps,
        Err(e) => {
            ui.error(&format!("Failed to load app list: {}", e));
            Vec::new()
        }
    };
    let app_id = args.app_id.or_else(|| apps.first().map(|a| a.id));

    let session = shared_session(Session::new(app_id));
    let renderer = if args.plain { Renderer::Plain } else { Renderer::Markdown };
    let chat = Chat::new(backend.clone(), session.clone(), renderer, ui.clone());
    let history = History::new(backend.clone(), session.clone(), ui.clone());

    ui.welcome();
    if !apps.is_empty() {
        ui.apps(&apps, app_id);
    }
    history.load_with_retry(RetryPolicy::initial_history_load()).await;
    ui.blank();

    let mut app = App::new(chat, history, backend, session, ui.clone(), apps);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    ui.prompt();
    while let Some(line) = lines.next_line().await? {
        if !app.handle_line(&line).await {
            break;
        }
        ui.prompt();
    }
    Ok(())
}
