//! Shared Application State
//!
//! Thread-safe state mirroring on-chain claim and admin data for display.
//! Everything here is a cache; authoritative state lives on chain.

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Aggregated claims for one wallet
#[derive(Debug, Clone)]
pub struct ClaimRecord {
    /// Claiming wallet
    pub claimant: Address,
    /// Sum of claimed amounts in base units
    pub total_claimed: U256,
    /// Number of claim transactions seen
    pub claim_count: u64,
    /// Block of the most recent claim
    pub last_block: u64,
}

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    /// Chain head block from the RPC node
    head_block: AtomicU64,
    /// Highest block covered by the claim scanner
    scanned_block: AtomicU64,
    /// Airdrop contract pause flag
    paused: AtomicBool,
    /// Per-wallet claim aggregates
    claims: DashMap<Address, ClaimRecord>,
    /// Sum of all claimed amounts
    total_claimed: RwLock<U256>,
    /// Most recent claimer seen
    last_claimer: RwLock<Option<Address>>,
    /// Confirmed admin set from the tracker
    admins: RwLock<HashSet<Address>>,
    /// Service start time
    start_time: std::time::Instant,
    /// Last error message
    last_error: RwLock<Option<String>>,
}

/// Blocks behind head before the service reports unhealthy
const HEALTHY_LAG_BLOCKS: u64 = 20;

impl AppState {
    /// Create new application state
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                head_block: AtomicU64::new(0),
                scanned_block: AtomicU64::new(0),
                paused: AtomicBool::new(false),
                claims: DashMap::new(),
                total_claimed: RwLock::new(U256::ZERO),
                last_claimer: RwLock::new(None),
                admins: RwLock::new(HashSet::new()),
                start_time: std::time::Instant::now(),
                last_error: RwLock::new(None),
            }),
        }
    }

    /// Get chain head block
    #[must_use]
    pub fn head_block(&self) -> u64 {
        self.inner.head_block.load(Ordering::Relaxed)
    }

    /// Set chain head block
    pub fn set_head_block(&self, block: u64) {
        self.inner.head_block.store(block, Ordering::Relaxed);
    }

    /// Get highest scanned block
    #[must_use]
    pub fn scanned_block(&self) -> u64 {
        self.inner.scanned_block.load(Ordering::Relaxed)
    }

    /// Set highest scanned block
    pub fn set_scanned_block(&self, block: u64) {
        self.inner.scanned_block.store(block, Ordering::Relaxed);
    }

    /// Get pause flag
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Relaxed)
    }

    /// Set pause flag
    pub fn set_paused(&self, paused: bool) {
        self.inner.paused.store(paused, Ordering::Relaxed);
    }

    /// Blocks between head and the scan watermark
    #[must_use]
    pub fn blocks_behind(&self) -> u64 {
        self.head_block().saturating_sub(self.scanned_block())
    }

    /// Check if the scanner is keeping up with the chain
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.blocks_behind() <= HEALTHY_LAG_BLOCKS
    }

    /// Get uptime in seconds
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// Fold one claim event into the aggregates
    pub fn record_claim(&self, claimant: Address, amount: U256, block: u64) {
        self.inner
            .claims
            .entry(claimant)
            .and_modify(|record| {
                record.total_claimed += amount;
                record.claim_count += 1;
                record.last_block = record.last_block.max(block);
            })
            .or_insert(ClaimRecord {
                claimant,
                total_claimed: amount,
                claim_count: 1,
                last_block: block,
            });

        *self.inner.total_claimed.write() += amount;
        *self.inner.last_claimer.write() = Some(claimant);
    }

    /// Get the claim record for one wallet
    #[must_use]
    pub fn claim_record(&self, claimant: Address) -> Option<ClaimRecord> {
        self.inner.claims.get(&claimant).map(|r| r.clone())
    }

    /// Get all claim records
    #[must_use]
    pub fn all_claims(&self) -> Vec<ClaimRecord> {
        self.inner.claims.iter().map(|r| r.value().clone()).collect()
    }

    /// Number of wallets that have claimed
    #[must_use]
    pub fn claimant_count(&self) -> usize {
        self.inner.claims.len()
    }

    /// Sum of all claimed amounts
    #[must_use]
    pub fn total_claimed(&self) -> U256 {
        *self.inner.total_claimed.read()
    }

    /// Most recent claimer
    #[must_use]
    pub fn last_claimer(&self) -> Option<Address> {
        *self.inner.last_claimer.read()
    }

    /// Replace the confirmed admin set
    pub fn set_admins(&self, admins: HashSet<Address>) {
        *self.inner.admins.write() = admins;
    }

    /// Get the confirmed admin set
    #[must_use]
    pub fn admins(&self) -> HashSet<Address> {
        self.inner.admins.read().clone()
    }

    /// Set last error
    pub fn set_error(&self, error: Option<String>) {
        *self.inner.last_error.write() = error;
    }

    /// Get last error
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
