use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use infra_board::board::{BoardOptions, BoardSession};
use infra_board::config::BoardSettings;
use infra_board::document::load_config_document;
use infra_board::layout::LayoutOptions;
use infra_board::persistence::client::PositionsClient;
use infra_board::persistence::debounce::SaveDebounceConfig;
use infra_board::persistence::store::FilePositionStore;
use infra_board::persistence::PositionStore;
use infra_board::server::run_positions_server;

const LOG_FILE_PREFIX: &str = "infra_board.log";

#[derive(Debug, Parser)]
#[command(name = "infra_board", about = "Infrastructure board layout and positions API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render the board for a config document and print it as JSON.
    Layout {
        config: PathBuf,
        /// Environment whose saved positions to use. Defaults to the document's `env`.
        #[arg(long)]
        environment: Option<String>,
        /// Read positions from BOARD_POSITIONS_DIR instead of the positions API.
        #[arg(long)]
        local: bool,
        #[arg(long)]
        hide_inactive: bool,
    },
    /// Serve the positions API backed by BOARD_POSITIONS_DIR.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = BoardSettings::from_env().context("failed to load configuration")?;
    let _log_guard = init_tracing(settings.log_dir.as_deref())?;

    match cli.command {
        Commands::Layout {
            config,
            environment,
            local,
            hide_inactive,
        } => {
            if local {
                let store = FilePositionStore::new(settings.positions_dir.clone());
                print_layout(Arc::new(store), &settings, &config, environment, hide_inactive)
                    .await?;
            } else {
                let client = PositionsClient::from_settings(&settings)
                    .context("failed to build positions API client")?;
                print_layout(Arc::new(client), &settings, &config, environment, hide_inactive)
                    .await?;
            }
        }
        Commands::Serve { bind } => {
            let store = FilePositionStore::new(settings.positions_dir.clone());
            run_positions_server(store, &bind).await?;
        }
    }

    Ok(())
}

async fn print_layout<S: PositionStore>(
    store: Arc<S>,
    settings: &BoardSettings,
    config_path: &Path,
    environment: Option<String>,
    hide_inactive: bool,
) -> Result<()> {
    let document = load_config_document(config_path)?;
    let environment = environment
        .map(|value| value.trim().to_owned())
        .unwrap_or_else(|| document.env.trim().to_owned());
    ensure!(
        !environment.is_empty(),
        "no environment given and `{}` does not set `env`",
        config_path.display()
    );

    let options = BoardOptions {
        layout: LayoutOptions {
            max_iterations: settings.layout_max_iterations,
            ..LayoutOptions::default()
        },
        show_inactive: settings.show_inactive && !hide_inactive,
    };
    let session = BoardSession::open(
        store,
        &environment,
        document,
        options,
        SaveDebounceConfig::from_settings(settings),
    )
    .await;

    let view = session
        .view()
        .context("board view was not produced")?;
    let rendered =
        serde_json::to_string_pretty(view).context("failed to encode board view as JSON")?;
    println!("{rendered}");

    session.close().await;
    Ok(())
}

fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,infra_board=debug"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(guard)
}
