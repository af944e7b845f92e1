//! REST API handlers.
//!
//! Caller authentication is out of scope for the trust core: account-level
//! calls arrive already attributed (deploy behind an authenticating proxy).
//! The two privileged capabilities — arbitration and admin — are gated here
//! by bearer secrets.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use surety_core::{
    constants::MAX_REASON_LEN, AccountId, AgentId, Caller, ClaimId, ErrorKind, LedgerError,
    MemoryDirectory, ProtocolParams, TrustLedger,
};

use crate::store::Persistence;

// ============================================================================
// App state
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<TrustLedger>,
    pub directory: Arc<MemoryDirectory>,
    pub persistence: Persistence,
    /// Bearer secret proving the arbitration capability.
    /// None = unauthenticated (dev/local only).
    pub arbiter_secret: Option<String>,
    /// Bearer secret proving the admin capability.
    pub admin_secret: Option<String>,
}

// ============================================================================
// Constant-time string comparison (prevents timing attacks on the secrets).
// ============================================================================

fn ct_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let len = a.len().max(b.len());
    let mut diff: u8 = (a.len() ^ b.len()) as u8;
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }
    diff == 0
}

/// Check `Authorization: Bearer <secret>` against a configured secret.
/// A missing configuration grants the capability to everyone (dev mode;
/// a warning was logged at startup).
fn bearer_matches(headers: &HeaderMap, secret: &Option<String>) -> bool {
    let Some(secret) = secret else { return true };
    let expected = format!("Bearer {secret}");
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    ct_eq(provided, &expected)
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "missing or invalid capability secret" })),
    )
        .into_response()
}

// ============================================================================
// Error mapping
// ============================================================================

fn error_response(err: LedgerError) -> Response {
    let status = match &err {
        LedgerError::UnknownAgent(_) | LedgerError::ClaimNotFound(_) => StatusCode::NOT_FOUND,
        e => match e.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Arithmetic => StatusCode::UNPROCESSABLE_ENTITY,
        },
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn bad_id(what: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": format!("invalid {what}: expected 64 hex chars") })),
    )
        .into_response()
}

// ============================================================================
// Persistence write-through helpers
// ============================================================================

fn persist_agent(state: &AppState, agent: &AgentId) {
    if let Ok(info) = state.ledger.get_stake_info(agent) {
        state.persistence.save_position(&info);
    }
    state
        .persistence
        .save_custody(state.ledger.network_stats().custodial_balance);
}

fn persist_account(state: &AppState, account: &AccountId) {
    state
        .persistence
        .save_account(account, state.ledger.account_balance(account));
}

// ============================================================================
// Health
// ============================================================================

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ============================================================================
// Stake
// ============================================================================

#[derive(Deserialize)]
pub struct DepositBody {
    /// The agent's controlling account (attributed caller).
    pub caller: AccountId,
    pub amount: u64,
}

pub async fn deposit(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<DepositBody>,
) -> Response {
    let Ok(agent) = agent_id.parse::<AgentId>() else {
        return bad_id("agent_id");
    };
    match state
        .ledger
        .deposit(&Caller::Account(body.caller), &agent, body.amount)
    {
        Ok(info) => {
            persist_agent(&state, &agent);
            persist_account(&state, &body.caller);
            Json(info).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct CallerBody {
    pub caller: AccountId,
}

pub async fn request_unstake(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<CallerBody>,
) -> Response {
    let Ok(agent) = agent_id.parse::<AgentId>() else {
        return bad_id("agent_id");
    };
    match state
        .ledger
        .request_unstake(&Caller::Account(body.caller), &agent)
    {
        Ok(info) => {
            persist_agent(&state, &agent);
            Json(info).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct WithdrawBody {
    pub caller: AccountId,
    pub amount: u64,
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<WithdrawBody>,
) -> Response {
    let Ok(agent) = agent_id.parse::<AgentId>() else {
        return bad_id("agent_id");
    };
    match state
        .ledger
        .withdraw(&Caller::Account(body.caller), &agent, body.amount)
    {
        Ok(withdrawn) => {
            persist_agent(&state, &agent);
            persist_account(&state, &body.caller);
            Json(json!({ "withdrawn": withdrawn })).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn get_stake(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Response {
    let Ok(agent) = agent_id.parse::<AgentId>() else {
        return bad_id("agent_id");
    };
    match state.ledger.get_stake_info(&agent) {
        Ok(info) => Json(info).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_withdrawable(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Response {
    let Ok(agent) = agent_id.parse::<AgentId>() else {
        return bad_id("agent_id");
    };
    match state.ledger.is_withdrawable(&agent) {
        Ok(open) => Json(json!({ "withdrawable": open })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_verified(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Response {
    let Ok(agent) = agent_id.parse::<AgentId>() else {
        return bad_id("agent_id");
    };
    Json(json!({ "verified": state.ledger.is_verified(&agent) })).into_response()
}

// ============================================================================
// Claims
// ============================================================================

#[derive(Deserialize)]
pub struct SubmitClaimBody {
    pub agent_id: AgentId,
    pub amount: u64,
    pub reason: String,
    /// The counterparty filing the claim (attributed caller).
    pub submitter: AccountId,
}

pub async fn submit_claim(
    State(state): State<AppState>,
    Json(body): Json<SubmitClaimBody>,
) -> Response {
    if body.reason.len() > MAX_REASON_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("reason exceeds {MAX_REASON_LEN} bytes") })),
        )
            .into_response();
    }
    match state.ledger.submit_claim(
        &Caller::Account(body.submitter),
        &body.agent_id,
        body.amount,
        &body.reason,
    ) {
        Ok(claim) => {
            state.persistence.save_claim(&claim);
            state.persistence.save_claim_seq(state.ledger.claim_sequence());
            (StatusCode::CREATED, Json(claim)).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn challenge_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<String>,
    Json(body): Json<CallerBody>,
) -> Response {
    let Ok(id) = claim_id.parse::<ClaimId>() else {
        return bad_id("claim_id");
    };
    match state.ledger.challenge(&Caller::Account(body.caller), &id) {
        Ok(claim) => {
            state.persistence.save_claim(&claim);
            Json(claim).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ResolveBody {
    pub approved: bool,
}

pub async fn resolve_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ResolveBody>,
) -> Response {
    if !bearer_matches(&headers, &state.arbiter_secret) {
        return forbidden();
    }
    let Ok(id) = claim_id.parse::<ClaimId>() else {
        return bad_id("claim_id");
    };
    match state.ledger.resolve(&Caller::Arbiter, &id, body.approved) {
        Ok(resolution) => {
            state.persistence.save_claim(&resolution.claim);
            if let Some(settlement) = &resolution.settlement {
                persist_agent(&state, &resolution.claim.agent_id);
                persist_account(&state, &settlement.beneficiary);
            }
            Json(resolution).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn get_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<String>,
) -> Response {
    let Ok(id) = claim_id.parse::<ClaimId>() else {
        return bad_id("claim_id");
    };
    match state.ledger.get_claim(&id) {
        Ok(claim) => Json(claim).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn get_agent_claims(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> Response {
    let Ok(agent) = agent_id.parse::<AgentId>() else {
        return bad_id("agent_id");
    };
    let limit = params.limit.min(500);
    Json(state.ledger.claims_for_agent(&agent, limit)).into_response()
}

// ============================================================================
// Stats + events
// ============================================================================

pub async fn get_network_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.network_stats())
}

pub async fn get_events(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let limit = params.limit.min(1_000);
    Json(state.ledger.recent_events(limit))
}

// ============================================================================
// Admin
// ============================================================================

pub async fn set_params(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<ProtocolParams>,
) -> Response {
    if !bearer_matches(&headers, &state.admin_secret) {
        return forbidden();
    }
    match state.ledger.set_params(&Caller::Admin, params) {
        Ok(params) => {
            state.persistence.save_params(&params);
            Json(params).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct SweepBody {
    pub recipient: AccountId,
}

pub async fn sweep_fees(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SweepBody>,
) -> Response {
    if !bearer_matches(&headers, &state.admin_secret) {
        return forbidden();
    }
    match state.ledger.sweep_fees(&Caller::Admin, &body.recipient) {
        Ok(swept) => {
            persist_account(&state, &body.recipient);
            state
                .persistence
                .save_custody(state.ledger.network_stats().custodial_balance);
            Json(json!({ "swept": swept })).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct RegisterAgentBody {
    pub agent_id: AgentId,
    pub owner: AccountId,
}

pub async fn register_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterAgentBody>,
) -> Response {
    if !bearer_matches(&headers, &state.admin_secret) {
        return forbidden();
    }
    let created = state.directory.register(body.agent_id, body.owner);
    state.persistence.save_binding(&body.agent_id, &body.owner);
    if created {
        tracing::info!(agent = %body.agent_id, owner = %body.owner, "Agent registered");
    } else {
        tracing::info!(agent = %body.agent_id, owner = %body.owner, "Agent binding replaced");
    }
    (
        if created { StatusCode::CREATED } else { StatusCode::OK },
        Json(json!({ "agent_id": body.agent_id, "owner": body.owner })),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct CreditBody {
    pub amount: u64,
}

pub async fn credit_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreditBody>,
) -> Response {
    if !bearer_matches(&headers, &state.admin_secret) {
        return forbidden();
    }
    let Ok(account) = account_id.parse::<AccountId>() else {
        return bad_id("account_id");
    };
    match state
        .ledger
        .credit_account(&Caller::Admin, &account, body.amount)
    {
        Ok(balance) => {
            state.persistence.save_account(&account, balance);
            Json(json!({ "account_id": account, "balance": balance })).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ct_eq_matches_only_exact_strings() {
        assert!(ct_eq("Bearer abc", "Bearer abc"));
        assert!(!ct_eq("Bearer abc", "Bearer abd"));
        assert!(!ct_eq("Bearer abc", "Bearer abcd"));
        assert!(!ct_eq("", "x"));
    }

    #[test]
    fn missing_secret_grants_dev_access() {
        let headers = HeaderMap::new();
        assert!(bearer_matches(&headers, &None));
        assert!(!bearer_matches(&headers, &Some("s3cret".into())));
    }
}
