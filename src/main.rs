use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use concept_bridge::{
    config::Config,
    model::OllamaClient,
    pipeline::Orchestrator,
    server::{self, AppContext},
    storage::{SqliteStorage, Storage},
};

#[derive(Parser)]
#[command(name = "concept-bridge", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Delete session data older than the given number of days
    Cleanup {
        /// Retention window in days
        #[arg(long, default_value_t = 90)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Concept Bridge starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            Arc::new(s)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, storage).await,
        Command::Cleanup { days } => {
            let deleted = storage.cleanup_old_sessions(days).await?;
            info!(deleted, days, "Cleanup complete");
            Ok(())
        }
    }
}

async fn serve(config: Config, storage: Arc<SqliteStorage>) -> anyhow::Result<()> {
    // Initialize the model client
    let client = match OllamaClient::new(&config.ollama, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.ollama.base_url, model = %config.ollama.model, "Ollama client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Ollama client");
            return Err(e.into());
        }
    };

    let storage: Arc<dyn Storage> = storage;
    let orchestrator = Arc::new(Orchestrator::with_client(
        Arc::clone(&storage),
        client,
        config.pipeline.clone(),
    ));

    let ctx = AppContext {
        orchestrator,
        storage,
    };

    if let Err(e) = server::run(config.server.bind_addr, ctx).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        concept_bridge::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        concept_bridge::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
