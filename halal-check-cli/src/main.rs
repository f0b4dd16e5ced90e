mod render;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use halal_check::session::{clear_input_text, load_input_text, save_input_text};
use halal_check::{
    AppStatus, ChatHistory, ChatSession, CheckerConfig, FileStore, HttpTransport, KeyValueStore,
    Orchestrator, export_csv, export_file_name,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "halal-check",
    version,
    about = "Check halal certification status of food ingredients"
)]
struct Cli {
    /// Answer from the built-in demo data instead of the remote service
    #[arg(long, global = true)]
    mock: bool,

    #[arg(long, global = true)]
    submit_url: Option<String>,

    #[arg(long, global = true)]
    result_url: Option<String>,

    #[arg(long, global = true)]
    chat_result_url: Option<String>,

    /// Warn about certificates expiring within this many days
    #[arg(long, global = true)]
    threshold_days: Option<i64>,

    /// File holding saved input and chat history
    #[arg(long, global = true, env = "HALAL_STORE", default_value = ".halal-checker.json")]
    store: PathBuf,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check ingredients (one per argument, or one per line with --file)
    Check {
        ingredients: Vec<String>,

        #[arg(long, conflicts_with = "ingredients")]
        file: Option<PathBuf>,

        /// Write the results as CSV (default name: halal_ingredients_<date>.csv)
        #[arg(long)]
        export: Option<Option<PathBuf>>,
    },
    /// Ask the halal ingredient assistant a question
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Show the saved chat transcript
    History {
        #[arg(long)]
        last: Option<usize>,
    },
    /// Forget the saved ingredient input (and the chat transcript with --chat)
    Clear {
        #[arg(long)]
        chat: bool,
    },
    /// Show the current configuration summary
    Status,
}

fn build_config(cli: &Cli) -> anyhow::Result<CheckerConfig> {
    let mut config = CheckerConfig::from_env()?;

    if cli.mock {
        config.use_mock_data = true;
    }
    if let Some(url) = &cli.submit_url {
        config.endpoints.submit = url.clone();
    }
    if let Some(url) = &cli.result_url {
        config.endpoints.result_poll = url.clone();
    }
    if let Some(url) = &cli.chat_result_url {
        config.endpoints.chat_result_poll = url.clone();
    }
    if let Some(days) = cli.threshold_days {
        config.notification_threshold_days = days;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "halal_check=info,halal_check_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&cli.store).await?);
    let transport = HttpTransport::with_attempts(config.request_retries)?;
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(transport)));

    info!(
        "Initialized (mock mode: {}, store: {})",
        config.use_mock_data,
        cli.store.display()
    );

    match &cli.command {
        Command::Check {
            ingredients,
            file,
            export,
        } => {
            let raw_text = match (file, ingredients.is_empty()) {
                (Some(path), _) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, false) => ingredients.join("\n"),
                (None, true) => load_input_text(store.as_ref()).await?.unwrap_or_default(),
            };

            let outcome = orchestrator.check_ingredients(&config, &raw_text).await?;
            save_input_text(store.as_ref(), &raw_text).await?;

            let now = chrono::Utc::now();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                render::print_outcome(&outcome, now, config.notification_threshold_days);
            }

            if let Some(target) = export {
                let path = target
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(export_file_name(now)));
                let csv = export_csv(&outcome.results)?;
                tokio::fs::write(&path, csv)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!("Results exported to {}", path.display());
            }
        }
        Command::Chat { message } => {
            let mut session = ChatSession::open(orchestrator.clone(), store.clone()).await?;
            let reply = session.send(&config, &message.join(" ")).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                if reply.source.is_degraded() {
                    eprintln!("Warning: the assistant is unavailable right now");
                }
                println!("{}", reply.text);
            }
        }
        Command::History { last } => {
            let history = ChatHistory::load(store.as_ref()).await?;
            let messages = match last {
                Some(n) => history.last_messages(*n),
                None => history.messages(),
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(messages)?);
            } else if messages.is_empty() {
                println!("No chat history");
            } else {
                println!("{}", render::transcript(messages));
            }
        }
        Command::Clear { chat } => {
            clear_input_text(store.as_ref()).await?;
            println!("Results cleared");
            if *chat {
                let mut session = ChatSession::open(orchestrator.clone(), store.clone()).await?;
                session.clear().await?;
                println!("Chat history cleared");
            }
        }
        Command::Status => {
            let history = ChatHistory::load(store.as_ref()).await?;
            let status = AppStatus::collect(&config, &history);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", render::status_lines(&status));
            }
        }
    }

    Ok(())
}
