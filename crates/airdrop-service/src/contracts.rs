//! Contract Facade
//!
//! Thin call/decode layer over the deployed airdrop and token contracts.
//! Translates claim, pause, and admin actions into transactions and
//! decodes revert data into the fixed [`RevertReason`] taxonomy so callers
//! match on variants, never on decoded strings.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, B256, U256},
    providers::ProviderBuilder,
    signers::local::PrivateKeySigner,
    sol,
    sol_types::SolError,
};
use thiserror::Error;
use tracing::{debug, info, instrument};

// Generate contract bindings from ABI
sol! {
    #[sol(rpc)]
    contract MerkleAirdrop {
        event TokensClaimed(address indexed claimant, uint256 amount);
        event AdminAdded(address indexed account);
        event AdminRemoved(address indexed account);

        error AmountMustBePositive();
        error InvalidProof();
        error ClaimExceedsAssigned();
        error TransferFailed();
        error ContractPaused();
        error CallerNotAdmin();

        function claimTokens(
            uint256 totalAssigned,
            uint256 amountToMint,
            bytes32[] calldata proof
        ) external;

        function verify(
            bytes32[] calldata proof,
            address claimant,
            uint256 totalAssigned
        ) external view returns (bool);

        function claimedAmounts(address account) external view returns (uint256);
        function admins(address account) external view returns (bool);
        function setAdminStatus(address account, bool isAdmin) external;
        function paused() external view returns (bool);
        function pause() external;
        function unpause() external;
    }

    #[sol(rpc)]
    contract SamoyedCoin {
        function balanceOf(address account) external view returns (uint256);
    }
}

/// The contract's revert taxonomy, decoded from error selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    AmountMustBePositive,
    InvalidProof,
    ClaimExceedsAssigned,
    TransferFailed,
    ContractPaused,
    CallerNotAdmin,
    /// Revert data that matched no known selector or message.
    Unknown(String),
}

impl RevertReason {
    /// Decode raw revert data by 4-byte error selector, falling back to
    /// `Error(string)` message matching, then to `Unknown`.
    #[must_use]
    pub fn decode(data: &[u8]) -> Self {
        if data.len() >= 4 {
            let selector: [u8; 4] = data[..4].try_into().expect("length checked");
            match selector {
                MerkleAirdrop::AmountMustBePositive::SELECTOR => {
                    return Self::AmountMustBePositive
                }
                MerkleAirdrop::InvalidProof::SELECTOR => return Self::InvalidProof,
                MerkleAirdrop::ClaimExceedsAssigned::SELECTOR => {
                    return Self::ClaimExceedsAssigned
                }
                MerkleAirdrop::TransferFailed::SELECTOR => return Self::TransferFailed,
                MerkleAirdrop::ContractPaused::SELECTOR => return Self::ContractPaused,
                MerkleAirdrop::CallerNotAdmin::SELECTOR => return Self::CallerNotAdmin,
                _ => {}
            }

            // Legacy string reverts from older contract revisions.
            if let Ok(revert) = alloy::sol_types::Revert::abi_decode(data) {
                return Self::from_message(&revert.reason);
            }
        }

        Self::Unknown(format!("0x{}", hex::encode(data)))
    }

    fn from_message(reason: &str) -> Self {
        let lowered = reason.to_lowercase();
        if lowered.contains("greater than zero") || lowered.contains("must be positive") {
            Self::AmountMustBePositive
        } else if lowered.contains("invalid proof") {
            Self::InvalidProof
        } else if lowered.contains("exceeds") {
            Self::ClaimExceedsAssigned
        } else if lowered.contains("transfer failed") {
            Self::TransferFailed
        } else if lowered.contains("paused") {
            Self::ContractPaused
        } else if lowered.contains("not an admin") || lowered.contains("not admin") {
            Self::CallerNotAdmin
        } else {
            Self::Unknown(reason.to_string())
        }
    }
}

impl std::fmt::Display for RevertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmountMustBePositive => write!(f, "amount must be positive"),
            Self::InvalidProof => write!(f, "invalid proof"),
            Self::ClaimExceedsAssigned => write!(f, "claim exceeds assigned amount"),
            Self::TransferFailed => write!(f, "token transfer failed"),
            Self::ContractPaused => write!(f, "contract is paused"),
            Self::CallerNotAdmin => write!(f, "caller is not an admin"),
            Self::Unknown(raw) => write!(f, "unknown revert: {raw}"),
        }
    }
}

/// Errors from facade operations
#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("Contract reverted: {0}")]
    Revert(RevertReason),

    #[error("Facade not configured with a signer")]
    NoSigner,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl FacadeError {
    /// Classify a contract-call error: reverts are decoded into the
    /// taxonomy, everything else surfaces as a retryable RPC failure.
    fn from_contract(err: &alloy::contract::Error) -> Self {
        match err.as_revert_data() {
            Some(data) => Self::Revert(RevertReason::decode(&data)),
            None => Self::Rpc(err.to_string()),
        }
    }
}

/// Facade configuration
#[derive(Debug, Clone)]
pub struct FacadeConfig {
    /// RPC URL of the chain the contracts are deployed on
    pub rpc_url: String,
    /// Airdrop contract address
    pub airdrop_address: String,
    /// Token contract address
    pub token_address: String,
    /// Private key for signing transactions (hex, 0x prefix optional)
    pub private_key: Option<String>,
}

/// Facade over the airdrop and token contracts
#[derive(Debug, Clone)]
pub struct ContractFacade {
    rpc_url: reqwest::Url,
    airdrop_address: Address,
    token_address: Address,
    signer: Option<PrivateKeySigner>,
}

impl ContractFacade {
    /// Create a read-only facade (no signer).
    ///
    /// # Errors
    /// Returns an error on a malformed RPC URL or contract address.
    pub fn new(config: &FacadeConfig) -> Result<Self, FacadeError> {
        let rpc_url: reqwest::Url = config
            .rpc_url
            .parse()
            .map_err(|_| FacadeError::Config(format!("invalid RPC URL: {}", config.rpc_url)))?;
        let airdrop_address: Address = config.airdrop_address.parse().map_err(|_| {
            FacadeError::Config(format!(
                "invalid airdrop contract address: {}",
                config.airdrop_address
            ))
        })?;
        let token_address: Address = config.token_address.parse().map_err(|_| {
            FacadeError::Config(format!(
                "invalid token contract address: {}",
                config.token_address
            ))
        })?;

        Ok(Self {
            rpc_url,
            airdrop_address,
            token_address,
            signer: None,
        })
    }

    /// Create a facade with a signer (can submit transactions).
    ///
    /// # Errors
    /// Returns an error if the private key is missing or malformed, or on
    /// any [`Self::new`] failure.
    pub fn with_signer(config: &FacadeConfig) -> Result<Self, FacadeError> {
        let private_key = config.private_key.as_ref().ok_or(FacadeError::NoSigner)?;

        // Accept keys with or without 0x prefix
        let key = private_key.strip_prefix("0x").unwrap_or(private_key);
        let signer: PrivateKeySigner = key
            .parse()
            .map_err(|_| FacadeError::Config("invalid private key".to_string()))?;

        info!(address = %signer.address(), "Facade initialized with signer");

        Ok(Self {
            signer: Some(signer),
            ..Self::new(config)?
        })
    }

    /// Get the signer address (if configured)
    #[must_use]
    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(PrivateKeySigner::address)
    }

    /// Airdrop contract address
    #[must_use]
    pub fn airdrop_address(&self) -> Address {
        self.airdrop_address
    }

    fn read_provider(&self) -> impl alloy::providers::Provider + Clone {
        ProviderBuilder::new().connect_http(self.rpc_url.clone())
    }

    fn write_provider(
        &self,
    ) -> Result<impl alloy::providers::Provider + Clone, FacadeError> {
        let signer = self.signer.as_ref().ok_or(FacadeError::NoSigner)?;
        let wallet = EthereumWallet::from(signer.clone());
        Ok(ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone()))
    }

    /// Submit a claim for `amount` out of `total_assigned`, authorized by
    /// the inclusion proof. Returns the transaction hash.
    ///
    /// # Errors
    /// [`FacadeError::Revert`] with the decoded reason on revert,
    /// [`FacadeError::NoSigner`] without a signer, [`FacadeError::Rpc`]
    /// on transport failure.
    #[instrument(skip(self, proof), fields(claimant = %self.signer_address().unwrap_or_default()))]
    pub async fn claim(
        &self,
        total_assigned: U256,
        amount: U256,
        proof: Vec<B256>,
    ) -> Result<B256, FacadeError> {
        let provider = self.write_provider()?;
        let contract = MerkleAirdrop::new(self.airdrop_address, &provider);

        info!(
            total_assigned = %total_assigned,
            amount = %amount,
            proof_len = proof.len(),
            "Submitting claim"
        );

        let pending = contract
            .claimTokens(total_assigned, amount, proof)
            .send()
            .await
            .map_err(|e| FacadeError::from_contract(&e))?;
        let tx_hash = *pending.tx_hash();

        info!(tx_hash = %tx_hash, "Claim transaction submitted");
        Ok(tx_hash)
    }

    /// Check a proof against the contract's own verifier.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn verify_eligibility(
        &self,
        proof: Vec<B256>,
        claimant: Address,
        total_assigned: U256,
    ) -> Result<bool, FacadeError> {
        let provider = self.read_provider();
        let contract = MerkleAirdrop::new(self.airdrop_address, &provider);
        contract
            .verify(proof, claimant, total_assigned)
            .call()
            .await
            .map_err(|e| FacadeError::from_contract(&e))
    }

    /// Whether the airdrop contract is paused.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn is_paused(&self) -> Result<bool, FacadeError> {
        let provider = self.read_provider();
        let contract = MerkleAirdrop::new(self.airdrop_address, &provider);
        contract
            .paused()
            .call()
            .await
            .map_err(|e| FacadeError::from_contract(&e))
    }

    /// Flip the pause state. Returns the new paused value.
    ///
    /// # Errors
    /// [`FacadeError::Revert`] with [`RevertReason::CallerNotAdmin`] when
    /// the signer lacks admin rights; transport errors otherwise.
    #[instrument(skip(self))]
    pub async fn toggle_pause(&self) -> Result<bool, FacadeError> {
        let paused = self.is_paused().await?;

        let provider = self.write_provider()?;
        let contract = MerkleAirdrop::new(self.airdrop_address, &provider);
        // pause() and unpause() build distinct call types, so each branch
        // sends its own transaction.
        let pending = if paused {
            contract.unpause().send().await
        } else {
            contract.pause().send().await
        }
        .map_err(|e| FacadeError::from_contract(&e))?;

        info!(tx_hash = %pending.tx_hash(), was_paused = paused, "Pause toggled");
        Ok(!paused)
    }

    /// Set an address's admin flag. Returns the transaction hash.
    ///
    /// # Errors
    /// Revert, signer, and transport errors as for [`Self::claim`].
    #[instrument(skip(self))]
    pub async fn set_admin_status(
        &self,
        account: Address,
        is_admin: bool,
    ) -> Result<B256, FacadeError> {
        let provider = self.write_provider()?;
        let contract = MerkleAirdrop::new(self.airdrop_address, &provider);

        let pending = contract
            .setAdminStatus(account, is_admin)
            .send()
            .await
            .map_err(|e| FacadeError::from_contract(&e))?;
        let tx_hash = *pending.tx_hash();

        info!(%account, is_admin, tx_hash = %tx_hash, "Admin status updated");
        Ok(tx_hash)
    }

    /// Authoritative admin flag for an address.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn is_admin(&self, account: Address) -> Result<bool, FacadeError> {
        let provider = self.read_provider();
        let contract = MerkleAirdrop::new(self.airdrop_address, &provider);
        let is_admin = contract
            .admins(account)
            .call()
            .await
            .map_err(|e| FacadeError::from_contract(&e))?;
        debug!(%account, is_admin, "Checked admin status");
        Ok(is_admin)
    }

    /// Token balance of an address.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn balance_of(&self, account: Address) -> Result<U256, FacadeError> {
        let provider = self.read_provider();
        let contract = SamoyedCoin::new(self.token_address, &provider);
        contract
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| FacadeError::from_contract(&e))
    }

    /// Amount already claimed by an address.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn claimed_amount_of(&self, account: Address) -> Result<U256, FacadeError> {
        let provider = self.read_provider();
        let contract = MerkleAirdrop::new(self.airdrop_address, &provider);
        contract
            .claimedAmounts(account)
            .call()
            .await
            .map_err(|e| FacadeError::from_contract(&e))
    }
}
