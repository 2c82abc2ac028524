//! Command-line entry point.
//!
//! Two modes:
//!
//! * `bill2data serve` — run the HTTP service.
//! * `bill2data extract <URL>` — one-shot extraction, JSON to stdout.

use anyhow::Context;
use bill2data::server::{serve, AppState};
use bill2data::{provider, BillExtractor, ExtractionConfig, HttpFetcher};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bill2data", version, about = "Medical bill data extraction service")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vision provider ("gemini" or "openrouter"); auto-detected from the
    /// environment when omitted.
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model identifier; provider default when omitted.
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP extraction service.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: String,
    },
    /// Extract one document and print the response JSON.
    Extract {
        /// URL of the bill document.
        url: String,

        /// Pretty-print the output.
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut builder = ExtractionConfig::builder();
    if let Some(provider) = &cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    let config = builder.build().context("invalid configuration")?;

    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout_secs)?);
    let model = provider::resolve_model(&config).context("no usable vision provider")?;
    let extractor = BillExtractor::new(fetcher, model, config);

    match cli.command {
        Command::Serve { addr } => {
            let state = Arc::new(AppState {
                extractor,
                api_key_configured: provider::any_key_configured(),
            });
            serve(state, &addr).await?;
        }
        Command::Extract { url, pretty } => {
            let response = extractor.extract(&url).await?;
            let out = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{out}");
        }
    }

    Ok(())
}
