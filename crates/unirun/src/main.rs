//! unirun - run one instance per user and forward later launches to it
//!
//! The leader prints `leader` and then one JSON array line per forwarded
//! launch until it is interrupted. A follower forwards its arguments, prints
//! `follower` and exits.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use libunirun_core::{load_config, ActivatorConfig};
use unirun::{dispatch_queue, Activator};

#[derive(Parser)]
#[command(
    name = "unirun",
    about = "Run one instance per user and forward later launches to it",
    version
)]
struct Cli {
    /// Scope name (defaults to a hash of this executable's path)
    #[arg(long)]
    name: Option<String>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for lock and socket files
    #[arg(long)]
    runtime_dir: Option<PathBuf>,

    /// How long a follower waits for the leader, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Arguments carried along with the launch
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the role and forwarded arguments
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!(code = e.error_code(), "Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Callbacks run on this task, after the role line is printed
    let (queue, mut pump) = dispatch_queue();
    let activator = Activator::new(config).with_dispatcher(Arc::new(queue));
    let callback = |args: Vec<String>| match serde_json::to_string(&args) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("Failed to encode forwarded arguments: {}", e),
    };

    match activator.launch_or_return(Some(callback), None).await {
        Ok(true) => {
            println!("leader");
            info!(args = cli.args.len(), "Running as leader");

            let shutdown = setup_signal_handlers();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Received shutdown signal");
                        break;
                    }
                    running = pump.run_next() => {
                        if !running {
                            break;
                        }
                    }
                }
            }

            activator.shutdown_listener();
            info!("unirun stopped");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("follower");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(code = e.error_code(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

/// The config file (if any) with command-line overrides applied
fn build_config(cli: &Cli) -> Result<ActivatorConfig, libunirun_core::CoreError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?.unwrap_or_default(),
        None => ActivatorConfig::default(),
    };

    if let Some(name) = &cli.name {
        config.unique_name = Some(name.clone());
    }
    if let Some(dir) = &cli.runtime_dir {
        config.runtime_dir = Some(dir.clone());
    }
    if let Some(ms) = cli.timeout_ms {
        config.connect_timeout_ms = ms;
    }
    Ok(config)
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers() -> impl std::future::Future<Output = ()> {
    async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
    }
}
