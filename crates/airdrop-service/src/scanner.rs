//! Claim Scanner
//!
//! Continuously monitors the chain for `TokensClaimed` events and folds
//! them into the shared claim aggregates, and refreshes the contract
//! pause flag.

use crate::contracts::{ContractFacade, MerkleAirdrop};
use crate::state::AppState;
use alloy::{
    providers::{Provider, ProviderBuilder},
    rpc::types::Filter,
    sol_types::SolEvent,
};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// RPC URL
    pub rpc_url: reqwest::Url,
    /// Airdrop contract address
    pub airdrop_address: alloy::primitives::Address,
    /// Polling interval
    pub poll_interval: Duration,
}

/// Watermark value meaning no poll has completed yet. Block numbers are
/// nowhere near this, so it cannot collide with a real watermark.
const UNSCANNED: u64 = u64::MAX;

/// Blocks still to scan, inclusive on both ends. `None` when the head is
/// already covered. The first pass covers all history, block 0 included.
fn scan_range(last_scanned: u64, head: u64) -> Option<(u64, u64)> {
    if last_scanned == UNSCANNED {
        return Some((0, head));
    }
    if last_scanned >= head {
        return None;
    }
    Some((last_scanned + 1, head))
}

/// Claim event scanner
pub struct ClaimScanner {
    config: ScannerConfig,
    facade: Arc<ContractFacade>,
    state: AppState,
    last_scanned_block: AtomicU64,
}

impl ClaimScanner {
    /// Create a new scanner
    pub fn new(config: ScannerConfig, facade: Arc<ContractFacade>, state: AppState) -> Self {
        Self {
            config,
            facade,
            state,
            last_scanned_block: AtomicU64::new(UNSCANNED),
        }
    }

    /// Run the scanner loop
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        info!("Starting claim scanner");

        loop {
            if let Err(e) = self.poll_once().await {
                error!(error = %e, "Scanner poll failed");
                self.state.set_error(Some(e.to_string()));
            } else {
                self.state.set_error(None);
            }

            sleep(self.config.poll_interval).await;
        }
    }

    /// Single poll iteration
    async fn poll_once(&self) -> Result<()> {
        let provider = ProviderBuilder::new().connect_http(self.config.rpc_url.clone());

        let head = provider
            .get_block_number()
            .await
            .context("Failed to fetch chain head")?;
        self.state.set_head_block(head);
        metrics::gauge!("airdrop_head_block").set(head as f64);

        let paused = self
            .facade
            .is_paused()
            .await
            .context("Failed to read pause flag")?;
        self.state.set_paused(paused);

        // Only scan past the watermark; the first pass covers history.
        let last = self.last_scanned_block.load(Ordering::Relaxed);
        let Some((from, to)) = scan_range(last, head) else {
            return Ok(());
        };

        let filter = Filter::new()
            .address(self.config.airdrop_address)
            .event_signature(MerkleAirdrop::TokensClaimed::SIGNATURE_HASH)
            .from_block(from)
            .to_block(to);

        let logs = provider
            .get_logs(&filter)
            .await
            .context("Claim event log query failed")?;

        if logs.is_empty() {
            info!(from, to, "No new claims");
        } else {
            info!(from, to, count = logs.len(), "Fetched claim events");
            self.process_claims(logs)?;
        }

        self.last_scanned_block.store(to, Ordering::Relaxed);
        self.state.set_scanned_block(to);
        metrics::gauge!("airdrop_scanned_block").set(to as f64);

        Ok(())
    }

    /// Fold decoded claim events into the shared aggregates, in
    /// (block, log index) order.
    fn process_claims(&self, mut logs: Vec<alloy::rpc::types::Log>) -> Result<()> {
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        for log in logs {
            let block = log
                .block_number
                .context("Claim event log missing block number")?;
            let decoded = log
                .log_decode::<MerkleAirdrop::TokensClaimed>()
                .context("Failed to decode TokensClaimed event")?;
            let event = &decoded.inner.data;

            self.state.record_claim(event.claimant, event.amount, block);
            metrics::counter!("airdrop_claims_scanned_total").increment(1);
        }

        Ok(())
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".parse().expect("static URL"),
            airdrop_address: alloy::primitives::Address::ZERO,
            poll_interval: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_config_default() {
        let config = ScannerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.rpc_url.as_str(), "http://localhost:8545/");
    }

    #[test]
    fn test_first_pass_includes_genesis_block() {
        // A chain sitting at block 0 still has a scannable block.
        assert_eq!(scan_range(UNSCANNED, 0), Some((0, 0)));
        assert_eq!(scan_range(UNSCANNED, 100), Some((0, 100)));
    }

    #[test]
    fn test_caught_up_head_yields_nothing() {
        assert_eq!(scan_range(0, 0), None);
        assert_eq!(scan_range(5, 5), None);
        // A head behind the watermark (provider lag) also scans nothing.
        assert_eq!(scan_range(9, 5), None);
    }

    #[test]
    fn test_resume_starts_past_watermark() {
        assert_eq!(scan_range(0, 3), Some((1, 3)));
        assert_eq!(scan_range(5, 9), Some((6, 9)));
    }
}
