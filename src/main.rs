use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use study_planner::{respond, Config, ModelChoice, ModelConfig, Outcome, ReplicateClient, Session};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "study-planner")]
#[command(version, about = "Terminal chat with a Llama 2 study planning assistant")]
struct Cli {
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Where to write the log (defaults to the user data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Llama 2 model to start with: Llama2-7B, Llama2-13B or Llama2-70B
    #[arg(short, long, value_parser = parse_model)]
    model: Option<ModelChoice>,

    /// Ask one question without the TUI and print the answer
    #[arg(long, value_name = "TEXT")]
    ask: Option<String>,
}

fn parse_model(s: &str) -> std::result::Result<ModelChoice, String> {
    ModelChoice::from_str(s).ok_or_else(|| {
        let names: Vec<&str> = ModelChoice::all().iter().map(|m| m.as_str()).collect();
        format!("unknown model '{}', expected one of: {}", s, names.join(", "))
    })
}

fn default_log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("could not find data directory")?;
    Ok(data_dir.join("study-planner").join("study-planner.log"))
}

fn init_logging(cli: &Cli) -> Result<()> {
    let path = match &cli.log_file {
        Some(path) => path.clone(),
        None => default_log_path()?,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("could not open log file {}", path.display()))?;

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    init_logging(&cli)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not read config, using defaults");
        Config::default()
    });
    let model = cli.model.unwrap_or_else(|| config.default_model());

    match cli.ask {
        Some(text) => ask_once(&config, model, &text).await,
        None => run_tui(&config, model).await,
    }
}

/// One interaction on stdout, no TUI.
async fn ask_once(config: &Config, model: ModelChoice, text: &str) -> Result<()> {
    let (token, source) = config.resolve_token()?;
    info!(source = source.as_str(), "Replicate token found");

    let client = match config.api_base_url.as_deref() {
        Some(url) => ReplicateClient::with_base_url(token, url),
        None => ReplicateClient::new(token),
    };
    let mut session = Session::new(ModelConfig::new(model));

    let mut stdout = std::io::stdout();
    let outcome = respond(&mut session, &client, text, |fragment| {
        let _ = write!(stdout, "{}", fragment);
        let _ = stdout.flush();
    })
    .await?;

    match outcome {
        Outcome::Answered(_) => println!(),
        Outcome::Rejected(rejection) => eprintln!("{}", rejection.message()),
        Outcome::Ignored | Outcome::AlreadyAnswered => {}
    }

    Ok(())
}

async fn run_tui(config: &Config, model: ModelChoice) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(config, model, events.sender());

    let result = async {
        loop {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            let Some(event) = events.next().await else {
                break;
            };
            handler::handle_event(&mut app, event);

            if app.should_quit {
                break;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("exiting");
    result
}
