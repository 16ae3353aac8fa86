//! Airdrop Service
//!
//! Query API, claim-stats scanner, and admin tracker for the Samoyed
//! Merkle airdrop.

mod admin;
mod api;
mod contracts;
mod scanner;
mod state;

use admin::{AdminTracker, ChainAdminEvents, ChainAdminReader, JsonFileStore};
use airdrop_core::{EligibilityList, MembershipTree};
use anyhow::{Context, Result};
use clap::Parser;
use contracts::{ContractFacade, FacadeConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "airdrop-service")]
#[command(about = "Query API and chain scanner for the Samoyed Merkle airdrop")]
struct Args {
    /// RPC URL
    #[arg(long, env = "RPC_URL", default_value = "http://localhost:8545")]
    rpc_url: String,

    /// Airdrop contract address
    #[arg(long, env = "AIRDROP_ADDRESS")]
    airdrop_address: String,

    /// Token contract address
    #[arg(long, env = "TOKEN_ADDRESS")]
    token_address: String,

    /// Eligibility list file (the artifact the deployed root was built from)
    #[arg(long, env = "ELIGIBILITY_FILE", default_value = "users.json")]
    eligibility_file: String,

    /// Admin scan state file (watermark plus last confirmed admin set)
    #[arg(long, env = "SCAN_STATE_FILE", default_value = "admin-scan-state.json")]
    scan_state_file: String,

    /// Private key for transaction signing (hex, 0x prefix optional)
    #[arg(long, env = "PRIVATE_KEY")]
    private_key: Option<String>,

    /// API listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Metrics listen address
    #[arg(long, default_value = "0.0.0.0:9090")]
    metrics_listen: String,

    /// Claim scan polling interval in seconds
    #[arg(long, default_value_t = 5)]
    poll_interval_secs: u64,

    /// Admin set refresh interval in seconds
    #[arg(long, default_value_t = 30)]
    admin_refresh_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    tracing::info!("Starting airdrop service");
    tracing::info!(rpc_url = %args.rpc_url, "RPC node");
    tracing::info!(listen = %args.listen, "API server");

    // The eligibility list and tree are fixed for the lifetime of the
    // process; a list that fails to load or build is a fatal
    // configuration error.
    let list = EligibilityList::load(&args.eligibility_file)
        .with_context(|| format!("Failed to load eligibility list {}", args.eligibility_file))?;
    let tree = MembershipTree::build(&list).context("Failed to build membership tree")?;
    tracing::info!(
        root = %tree.root(),
        leaves = tree.leaf_count(),
        "Membership tree built; root must match the deployed contract"
    );

    let facade_config = FacadeConfig {
        rpc_url: args.rpc_url.clone(),
        airdrop_address: args.airdrop_address.clone(),
        token_address: args.token_address.clone(),
        private_key: args.private_key.clone(),
    };
    let facade = Arc::new(if args.private_key.is_some() {
        ContractFacade::with_signer(&facade_config)?
    } else {
        ContractFacade::new(&facade_config)?
    });

    let rpc_url: reqwest::Url = args.rpc_url.parse().context("Invalid RPC URL")?;
    let airdrop_address = facade.airdrop_address();

    // Metrics exporter
    let metrics_addr: std::net::SocketAddr = args
        .metrics_listen
        .parse()
        .context("Invalid metrics listen address")?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("Failed to install metrics exporter")?;

    // Initialize application state
    let app_state = state::AppState::new();
    let context = api::ApiContext {
        state: app_state.clone(),
        facade: facade.clone(),
        list: Arc::new(list),
        tree: Arc::new(tree),
    };

    // Start API server
    let api_handle = tokio::spawn(api::run_server(args.listen.clone(), context));

    // Start claim scanner
    let scanner = scanner::ClaimScanner::new(
        scanner::ScannerConfig {
            rpc_url: rpc_url.clone(),
            airdrop_address,
            poll_interval: Duration::from_secs(args.poll_interval_secs),
        },
        facade,
        app_state.clone(),
    );
    let scanner_handle = tokio::spawn(async move { scanner.run().await });

    // Start admin tracker loop
    let tracker = AdminTracker::new(
        ChainAdminEvents::new(rpc_url.clone(), airdrop_address),
        ChainAdminReader::new(rpc_url, airdrop_address),
        JsonFileStore::new(&args.scan_state_file),
    );
    let admin_interval = Duration::from_secs(args.admin_refresh_secs);
    let admin_state = app_state.clone();
    let admin_handle = tokio::spawn(async move {
        loop {
            match tracker.refresh().await {
                Ok(outcome) => admin_state.set_admins(outcome.admins),
                Err(e) => {
                    tracing::error!(error = %e, "Admin refresh failed");
                    admin_state.set_error(Some(e.to_string()));
                }
            }
            tokio::time::sleep(admin_interval).await;
        }
    });

    // Wait for shutdown
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        result = api_handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server error");
            }
        }
        result = scanner_handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Scanner error");
            }
        }
        result = admin_handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin tracker error");
            }
        }
    }

    Ok(())
}
