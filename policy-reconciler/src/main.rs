//! policy-reconciler: command-line driver for policy definitions.
//!
//! Keeps a single policy definition in a local JSON state file and:
//! - applies a desired configuration (create, update or replace)
//! - refreshes, imports or deletes the remote definition

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use policy_reconciler::descriptor::diff;
use policy_reconciler::{
    HttpPolicyClient, PolicyDefinitionReconciler, PolicyDefinitionState, PropagationConfig,
};

/// Policy definition reconciler
#[derive(Parser, Debug)]
#[command(name = "policy-reconciler", version, about)]
struct Args {
    /// Management API endpoint
    #[arg(long, env = "POLICY_API_ENDPOINT", default_value = "https://management.azure.com")]
    endpoint: String,

    /// Subscription the definitions live in
    #[arg(long, env = "POLICY_SUBSCRIPTION_ID")]
    subscription_id: String,

    /// Bearer token sent with every request
    #[arg(long, env = "POLICY_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API version query parameter
    #[arg(long, default_value = "2016-12-01")]
    api_version: String,

    /// Seconds between propagation polls
    #[arg(long, default_value = "10")]
    poll_interval_secs: u64,

    /// Consecutive successful polls before a write counts as propagated
    #[arg(long, default_value = "10")]
    stable_polls: u32,

    /// Propagation timeout in seconds
    #[arg(long, default_value = "300")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, update or replace the definition to match a configuration file
    Apply {
        /// Desired configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// State file
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Show what apply would change
    Plan {
        /// Desired configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// State file
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Refresh the state file from the remote definition
    Read {
        /// State file
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Adopt an existing definition into a new state file
    Import {
        /// Definition id
        locator: String,

        /// State file
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Delete the definition recorded in the state file
    Delete {
        /// State file
        #[arg(short, long)]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for state output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "policy_reconciler=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!("Management API endpoint: {}", args.endpoint);

    let client = HttpPolicyClient::new(
        args.endpoint.clone(),
        args.subscription_id.clone(),
        args.api_version.clone(),
    )
    .with_token(args.token.clone());

    let propagation = PropagationConfig {
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        stable_polls: args.stable_polls,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let reconciler = PolicyDefinitionReconciler::new(Arc::new(client), propagation);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    run(&reconciler, args.command, &cancel).await
}

async fn run(
    reconciler: &PolicyDefinitionReconciler,
    command: Commands,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::Apply { config, state } => {
            let desired = load(&config)?;
            let prior = load_state(&state)?;
            let (outcome, applied) = reconciler.converge(prior.as_ref(), &desired, cancel).await?;
            info!("Apply finished: {:?}", outcome);
            save(&state, &applied)?;
            print(&applied)?;
        }
        Commands::Plan { config, state } => {
            let desired = load(&config)?;
            desired.validate()?;
            let current = match load_state(&state)? {
                Some(prior) => reconciler.refresh(&prior).await?,
                None => None,
            };
            match current {
                None => println!("create {}", desired.name),
                Some(current) => {
                    let plan = diff(&current, &desired);
                    if plan.is_empty() {
                        println!("no changes");
                    } else if plan.requires_replacement() {
                        println!("replace {} (forced by {:?})", desired.name, plan.replace);
                    } else {
                        println!("update {} ({:?})", desired.name, plan.update);
                    }
                }
            }
        }
        Commands::Read { state } => {
            let Some(prior) = load_state(&state)? else {
                bail!("no state at {}", state.display());
            };
            match reconciler.refresh(&prior).await? {
                Some(current) => {
                    save(&state, &current)?;
                    print(&current)?;
                }
                None => {
                    remove_state(&state)?;
                    println!("null");
                }
            }
        }
        Commands::Import { locator, state } => {
            let imported = reconciler.import(&locator).await?;
            save(&state, &imported)?;
            print(&imported)?;
        }
        Commands::Delete { state } => {
            let Some(prior) = load_state(&state)? else {
                info!("No state at {}, nothing to delete", state.display());
                return Ok(());
            };
            let locator = prior
                .id
                .context("state file has no definition id")?;
            reconciler.delete(&locator).await?;
            remove_state(&state)?;
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<PolicyDefinitionState> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid definition in {}", path.display()))
}

fn load_state(path: &Path) -> Result<Option<PolicyDefinitionState>> {
    if !path.exists() {
        return Ok(None);
    }
    load(path).map(Some)
}

fn save(path: &Path, state: &PolicyDefinitionState) -> Result<()> {
    let text = serde_json::to_string_pretty(state)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn remove_state(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

fn print(state: &PolicyDefinitionState) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}
