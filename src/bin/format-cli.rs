use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use format_relay::resilience::{Backoff, RETRY_ATTEMPT};

#[derive(Parser)]
#[command(name = "format-cli")]
#[command(about = "Client for the format-relay service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Extra attempts after a 429/503 or a connection error.
    #[arg(short, long, default_value_t = 2)]
    retries: u32,

    #[arg(long, default_value = "/_ah/health")]
    health_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format a file (or stdin) and print the result
    Format { file: Option<PathBuf> },
    /// Check that the service is up
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("format-cli: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Format { file } => {
            let source = match file {
                Some(path) => tokio::fs::read(path).await?,
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin().read_to_end(&mut buf).await?;
                    buf
                }
            };
            let res = post_with_retries(&client, &format!("{base}/"), source, cli.retries).await?;
            let ok = res.status().is_success();
            let status = res.status();
            let body = res.bytes().await?;
            if ok {
                tokio::io::stdout().write_all(&body).await?;
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("format-cli: {status}");
                tokio::io::stderr().write_all(&body).await?;
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Health => {
            let res = client.get(format!("{base}{}", cli.health_path)).send().await?;
            let status = res.status();
            println!("{status} {}", res.text().await?);
            Ok(if status.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn post_with_retries(
    client: &reqwest::Client,
    url: &str,
    source: Vec<u8>,
    retries: u32,
) -> Result<reqwest::Response, reqwest::Error> {
    let backoff = Backoff::default();
    let mut attempt = 0;
    loop {
        let mut request = client.post(url).body(source.clone());
        if attempt > 0 {
            request = request.header(RETRY_ATTEMPT, attempt.to_string());
        }

        match request.send().await {
            Ok(res)
                if matches!(
                    res.status(),
                    StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
                ) && attempt < retries => {}
            Ok(res) => return Ok(res),
            Err(e) if e.is_connect() && attempt < retries => {}
            Err(e) => return Err(e),
        }

        attempt += 1;
        tokio::time::sleep(backoff.delay(attempt)).await;
    }
}
