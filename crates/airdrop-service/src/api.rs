//! REST API Endpoints
//!
//! The query surface the dashboard frontend renders from, plus the
//! transaction endpoints (claim, pause, admin changes) that go through
//! the contract facade.

use crate::contracts::{ContractFacade, FacadeError};
use crate::state::AppState;
use airdrop_core::{format_amount, parse_amount, EligibilityList, MembershipTree};
use alloy::primitives::{Address, B256, U256};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Everything the handlers need: live state, the contract facade, and
/// the immutable eligibility list and membership tree built at startup.
#[derive(Clone)]
pub struct ApiContext {
    pub state: AppState,
    pub facade: Arc<ContractFacade>,
    pub list: Arc<EligibilityList>,
    pub tree: Arc<MembershipTree>,
}

/// JSON body for error responses
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map facade failures onto HTTP statuses: reverts are a state conflict,
/// a missing signer means this deployment cannot transact, and transport
/// failures blame the upstream node.
fn facade_error(err: &FacadeError) -> ApiError {
    let status = match err {
        FacadeError::Revert(_) => StatusCode::CONFLICT,
        FacadeError::NoSigner => StatusCode::SERVICE_UNAVAILABLE,
        FacadeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FacadeError::Rpc(_) => StatusCode::BAD_GATEWAY,
    };
    api_error(status, err.to_string())
}

/// Run the API server
pub async fn run_server(listen: String, context: ApiContext) -> anyhow::Result<()> {
    let app = create_router(context);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(address = %listen, "API server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
pub fn create_router(context: ApiContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/eligibility/{address}", get(eligibility))
        .route("/proof/{address}", get(proof))
        .route("/verify/{address}", get(verify))
        .route("/stats", get(stats))
        .route("/claim", post(claim))
        .route("/admins", get(admins))
        .route("/admins/{address}", get(admin_status))
        .route("/admin/pause", post(toggle_pause))
        .route("/admin/status", post(set_admin_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(context)
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    blocks_behind: u64,
}

/// Health check endpoint
async fn health(State(ctx): State<ApiContext>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = ctx.state.is_healthy();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        blocks_behind: ctx.state.blocks_behind(),
    };

    (status_code, Json(response))
}

/// Status response
#[derive(Serialize)]
struct StatusResponse {
    head_block: u64,
    scanned_block: u64,
    blocks_behind: u64,
    paused: bool,
    merkle_root: B256,
    leaf_count: usize,
    claimant_count: usize,
    uptime_secs: u64,
    last_error: Option<String>,
}

/// Status endpoint
async fn status(State(ctx): State<ApiContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        head_block: ctx.state.head_block(),
        scanned_block: ctx.state.scanned_block(),
        blocks_behind: ctx.state.blocks_behind(),
        paused: ctx.state.is_paused(),
        merkle_root: ctx.tree.root(),
        leaf_count: ctx.tree.leaf_count(),
        claimant_count: ctx.state.claimant_count(),
        uptime_secs: ctx.state.uptime_secs(),
        last_error: ctx.state.last_error(),
    })
}

/// Eligibility response for one wallet
#[derive(Serialize)]
struct EligibilityResponse {
    address: Address,
    index: usize,
    assigned: String,
    assigned_formatted: String,
    claimed: String,
    claimed_formatted: String,
    /// Live token balance; absent when the RPC read fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    balance_formatted: Option<String>,
}

/// Eligibility lookup endpoint. Claimed amounts come from the contract
/// when reachable; the scanner aggregate serves as the fallback so the
/// endpoint degrades instead of erroring on RPC trouble.
async fn eligibility(
    State(ctx): State<ApiContext>,
    Path(address): Path<String>,
) -> Result<Json<EligibilityResponse>, StatusCode> {
    let address: Address = address.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let index = ctx.list.index_of(address).ok_or(StatusCode::NOT_FOUND)?;
    let entry = ctx.list.entry(index).ok_or(StatusCode::NOT_FOUND)?;

    let claimed = match ctx.facade.claimed_amount_of(address).await {
        Ok(amount) => amount,
        Err(e) => {
            tracing::debug!(error = %e, %address, "Live claimed read failed, using scanner aggregate");
            ctx.state
                .claim_record(address)
                .map_or(U256::ZERO, |r| r.total_claimed)
        }
    };
    let balance = ctx.facade.balance_of(address).await.ok();

    Ok(Json(EligibilityResponse {
        address,
        index,
        assigned: entry.amount.to_string(),
        assigned_formatted: format_amount(entry.amount),
        claimed: claimed.to_string(),
        claimed_formatted: format_amount(claimed),
        balance_formatted: balance.map(format_amount),
    }))
}

/// Proof response: the exact calldata a claim transaction needs
#[derive(Serialize)]
struct ProofResponse {
    address: Address,
    index: usize,
    total_assigned: String,
    merkle_root: B256,
    proof: Vec<B256>,
}

/// Inclusion-proof endpoint
async fn proof(
    State(ctx): State<ApiContext>,
    Path(address): Path<String>,
) -> Result<Json<ProofResponse>, StatusCode> {
    let address: Address = address.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let index = ctx.list.index_of(address).ok_or(StatusCode::NOT_FOUND)?;
    let entry = ctx.list.entry(index).ok_or(StatusCode::NOT_FOUND)?;

    // Structurally impossible for an in-range index; a failure here means
    // the tree and list disagree, which is a fatal configuration error.
    let proof = ctx
        .tree
        .prove_index(index)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(ProofResponse {
        address,
        index,
        total_assigned: entry.amount.to_string(),
        merkle_root: ctx.tree.root(),
        proof,
    }))
}

/// On-chain verification result for a wallet's proof
#[derive(Serialize)]
struct VerifyResponse {
    address: Address,
    valid: bool,
}

/// Check a locally generated proof against the contract's own verifier.
/// `valid: false` means the deployed root and the loaded list disagree.
async fn verify(
    State(ctx): State<ApiContext>,
    Path(address): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let address: Address = address
        .parse()
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "invalid address"))?;
    let index = ctx
        .list
        .index_of(address)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "address not in eligibility list"))?;
    let entry = ctx
        .list
        .entry(index)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "address not in eligibility list"))?;
    let proof = ctx
        .tree
        .prove_index(index)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let valid = ctx
        .facade
        .verify_eligibility(proof, address, entry.amount)
        .await
        .map_err(|e| facade_error(&e))?;

    Ok(Json(VerifyResponse { address, valid }))
}

/// Claim request: a display-format amount, or the signer's full
/// remaining assignment when omitted
#[derive(Deserialize)]
struct ClaimRequest {
    #[serde(default)]
    amount: Option<String>,
}

/// Submitted claim transaction
#[derive(Serialize)]
struct ClaimResponse {
    claimant: Address,
    amount: String,
    amount_formatted: String,
    tx_hash: B256,
}

/// Submit a claim for the configured signer's own assignment.
async fn claim(
    State(ctx): State<ApiContext>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let claimant = ctx
        .facade
        .signer_address()
        .ok_or_else(|| facade_error(&FacadeError::NoSigner))?;
    let index = ctx
        .list
        .index_of(claimant)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "signer not in eligibility list"))?;
    let entry = ctx
        .list
        .entry(index)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "signer not in eligibility list"))?;

    let amount = match &request.amount {
        Some(text) => parse_amount(text)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("invalid amount: {text}")))?,
        None => {
            // Claim whatever is left of the assignment.
            let claimed = ctx
                .facade
                .claimed_amount_of(claimant)
                .await
                .map_err(|e| facade_error(&e))?;
            entry.amount.saturating_sub(claimed)
        }
    };

    let proof = ctx
        .tree
        .prove_index(index)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let tx_hash = ctx
        .facade
        .claim(entry.amount, amount, proof)
        .await
        .map_err(|e| facade_error(&e))?;

    Ok(Json(ClaimResponse {
        claimant,
        amount: amount.to_string(),
        amount_formatted: format_amount(amount),
        tx_hash,
    }))
}

/// Per-wallet row in the stats table
#[derive(Serialize)]
struct ClaimRow {
    address: Address,
    claimed: String,
    claimed_formatted: String,
    claim_count: u64,
}

/// Stats response
#[derive(Serialize)]
struct StatsResponse {
    total_claimed: String,
    total_claimed_formatted: String,
    last_claimer: Option<Address>,
    claims: Vec<ClaimRow>,
}

/// Aggregate claim statistics endpoint
async fn stats(State(ctx): State<ApiContext>) -> Json<StatsResponse> {
    let mut records = ctx.state.all_claims();
    records.sort_by(|a, b| b.total_claimed.cmp(&a.total_claimed));

    let claims = records
        .into_iter()
        .map(|r| ClaimRow {
            address: r.claimant,
            claimed: r.total_claimed.to_string(),
            claimed_formatted: format_amount(r.total_claimed),
            claim_count: r.claim_count,
        })
        .collect();

    let total = ctx.state.total_claimed();
    Json(StatsResponse {
        total_claimed: total.to_string(),
        total_claimed_formatted: format_amount(total),
        last_claimer: ctx.state.last_claimer(),
        claims,
    })
}

/// Current confirmed admin set, sorted for stable output
async fn admins(State(ctx): State<ApiContext>) -> Json<Vec<Address>> {
    let mut admins: Vec<Address> = ctx.state.admins().into_iter().collect();
    admins.sort();
    Json(admins)
}

/// One address's admin flag
#[derive(Serialize)]
struct AdminFlagResponse {
    address: Address,
    is_admin: bool,
}

/// Authoritative admin flag for one address, read from the contract
async fn admin_status(
    State(ctx): State<ApiContext>,
    Path(address): Path<String>,
) -> Result<Json<AdminFlagResponse>, ApiError> {
    let address: Address = address
        .parse()
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "invalid address"))?;
    let is_admin = ctx
        .facade
        .is_admin(address)
        .await
        .map_err(|e| facade_error(&e))?;
    Ok(Json(AdminFlagResponse { address, is_admin }))
}

/// Pause toggle result
#[derive(Serialize)]
struct PauseResponse {
    paused: bool,
}

/// Flip the contract's pause flag with the configured signer.
async fn toggle_pause(State(ctx): State<ApiContext>) -> Result<Json<PauseResponse>, ApiError> {
    let paused = ctx
        .facade
        .toggle_pause()
        .await
        .map_err(|e| facade_error(&e))?;
    ctx.state.set_paused(paused);
    Ok(Json(PauseResponse { paused }))
}

/// Admin grant/revoke request
#[derive(Deserialize)]
struct AdminStatusRequest {
    address: Address,
    is_admin: bool,
}

/// Submitted admin change transaction
#[derive(Serialize)]
struct AdminStatusResponse {
    address: Address,
    is_admin: bool,
    tx_hash: B256,
}

/// Grant or revoke admin rights with the configured signer. The tracker
/// picks up the resulting event on its next refresh.
async fn set_admin_status(
    State(ctx): State<ApiContext>,
    Json(request): Json<AdminStatusRequest>,
) -> Result<Json<AdminStatusResponse>, ApiError> {
    let tx_hash = ctx
        .facade
        .set_admin_status(request.address, request.is_admin)
        .await
        .map_err(|e| facade_error(&e))?;

    Ok(Json(AdminStatusResponse {
        address: request.address,
        is_admin: request.is_admin,
        tx_hash,
    }))
}
