use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use format_relay::config::load_config;
use format_relay::http::HttpServer;
use format_relay::lifecycle::{prepare, signals, Shutdown};
use format_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "format-relay")]
#[command(about = "HTTP service that formats source code with clang-format", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("format-relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("format-relay: failed to install log subscriber: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: format_relay::ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "format-relay starting");

    let context = prepare(config)?;

    let observability = &context.config.observability;
    if observability.metrics_enabled {
        metrics::init_metrics(observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&context.config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(context);

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
