//! `reelfetch` CLI - list catalogs, extract detail pages, resolve links

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use reelfetch::{
    Aggregator, ApiKeyValidator, Config, Credentials, Gateway, OpenAccess, Request, StaticKeys,
};

#[derive(Parser)]
#[command(name = "reelfetch")]
#[command(about = "Catalog scraping and chained link resolution")]
#[command(version)]
struct Cli {
    /// API key checked against the configured keys
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Config file (default: ~/.config/reelfetch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List providers from the registry
    Providers,

    /// List or search a provider's catalog
    Catalog {
        /// Provider key (e.g., 4kHDHub)
        provider: String,

        /// Listing page, starting at 1
        #[arg(short, long, conflicts_with = "search")]
        page: Option<u32>,

        /// Search query (ignores pagination)
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Extract one detail page
    Detail {
        provider: String,
        url: String,

        /// Also resolve every download link on the page
        #[arg(short, long)]
        resolve: bool,
    },

    /// Extract several detail pages of one provider
    Details {
        provider: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Resolve a download link to its final URL
    Resolve {
        url: String,

        /// Chain to run (direct, vidsrc, hubcloud, gdflix, filepress);
        /// inferred from the host when omitted
        #[arg(short = 't', long = "type")]
        provider_type: Option<String>,
    },
}

impl From<Commands> for Request {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Providers => Request::Providers,
            Commands::Catalog {
                provider,
                page,
                search,
            } => Request::Catalog {
                provider,
                page,
                search,
            },
            Commands::Detail {
                provider,
                url,
                resolve,
            } => Request::Detail {
                provider,
                url,
                resolve,
            },
            Commands::Details { provider, urls } => Request::Details { provider, urls },
            Commands::Resolve { url, provider_type } => Request::Resolve { url, provider_type },
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "reelfetch=debug"
    } else {
        "reelfetch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let validator: Arc<dyn ApiKeyValidator> = if config.api_keys.is_empty() {
        Arc::new(OpenAccess)
    } else {
        Arc::new(StaticKeys::from_config(&config.api_keys))
    };
    let gateway = Gateway::new(Aggregator::new(&config)?, validator);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let credentials = Credentials {
        api_key: cli.api_key,
    };
    let envelope = gateway
        .dispatch(&credentials, cli.command.into(), &cancel)
        .await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);

    Ok(if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
