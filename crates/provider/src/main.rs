//! Contabo Provider CLI
//!
//! Runs one resource operation per invocation. Attribute documents are read
//! from JSON files and results are printed as JSON; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use contabo_provider::state::decode_state;
use contabo_provider::{ContaboProvider, ProviderConfig, ResourceResponse};

/// Contabo Provider - manage Contabo cloud resources
#[derive(Parser)]
#[command(name = "contabo-provider")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Provider configuration file (TOML)
    #[arg(long, env = "CNTB_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Control-plane base URL
    #[arg(long, env = "CNTB_API", global = true)]
    api: Option<String>,

    /// OAuth2 token endpoint
    #[arg(long, env = "CNTB_OAUTH2_TOKEN_URL", global = true)]
    oauth2_token_url: Option<String>,

    #[arg(long, env = "CNTB_OAUTH2_CLIENT_ID", global = true)]
    oauth2_client_id: Option<String>,

    #[arg(long, env = "CNTB_OAUTH2_CLIENT_SECRET", hide_env_values = true, global = true)]
    oauth2_client_secret: Option<String>,

    #[arg(long, env = "CNTB_OAUTH2_USER", global = true)]
    oauth2_user: Option<String>,

    #[arg(long, env = "CNTB_OAUTH2_PASS", hide_env_values = true, global = true)]
    oauth2_pass: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, update or delete a resource
    Apply {
        /// Resource type, e.g. contabo_instance
        type_name: String,
        /// Prior state (omit to create)
        #[arg(long)]
        prior: Option<PathBuf>,
        /// Planned state (omit to delete)
        #[arg(long)]
        planned: Option<PathBuf>,
    },

    /// Refresh the state of a resource
    Read {
        type_name: String,
        /// Current state
        #[arg(long)]
        state: PathBuf,
    },

    /// Import an existing resource by id
    Import { type_name: String, id: String },

    /// Show the authenticated user
    Whoami,

    /// List supported resource types
    Types,
}

impl Cli {
    fn provider_config(&self) -> anyhow::Result<ProviderConfig> {
        let mut config = match &self.config {
            Some(path) => ProviderConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ProviderConfig::default(),
        };

        let overrides = [
            (&self.api, &mut config.api),
            (&self.oauth2_token_url, &mut config.oauth2_token_url),
            (&self.oauth2_client_id, &mut config.oauth2_client_id),
            (&self.oauth2_client_secret, &mut config.oauth2_client_secret),
            (&self.oauth2_user, &mut config.oauth2_user),
            (&self.oauth2_pass, &mut config.oauth2_pass),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
        Ok(config)
    }
}

fn read_state(path: &Path) -> anyhow::Result<Value> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode_state(&data).with_context(|| format!("parsing {}", path.display()))
}

fn print_response(response: &ResourceResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    if response.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let provider = ContaboProvider::new();
    if let Commands::Types = cli.command {
        for type_name in provider.resource_types() {
            println!("{}", type_name);
        }
        return Ok(());
    }

    info!("Starting Contabo provider v{}", contabo_common::VERSION);
    let config = cli.provider_config()?;
    if let Err(diagnostic) = provider.configure(&config).await {
        eprintln!("{}: {}", diagnostic.summary, diagnostic.detail);
        std::process::exit(1);
    }

    match &cli.command {
        Commands::Apply {
            type_name,
            prior,
            planned,
        } => {
            let prior = prior.as_deref().map(read_state).transpose()?;
            let planned = planned.as_deref().map(read_state).transpose()?;
            let response = provider
                .apply_resource_change(type_name, prior.as_ref(), planned.as_ref())
                .await;
            print_response(&response)?;
        }
        Commands::Read { type_name, state } => {
            let current = read_state(state)?;
            let response = provider.read_resource(type_name, &current).await;
            print_response(&response)?;
        }
        Commands::Import { type_name, id } => {
            let response = provider.import_resource_state(type_name, id).await;
            print_response(&response)?;
        }
        Commands::Whoami => {
            let user_id = provider
                .user_id()
                .await
                .context("provider is not configured")?;
            println!("{}", user_id);
        }
        Commands::Types => {}
    }

    Ok(())
}
