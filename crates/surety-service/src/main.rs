mod api;
mod store;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;

use surety_core::{Clock, MemoryDirectory, ProtocolParams, TrustLedger};

use api::AppState;
use store::Persistence;

#[derive(Parser, Debug)]
#[command(name = "surety-service", about = "surety economic trust layer service")]
struct Config {
    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:8090", env = "SURETY_LISTEN")]
    listen: std::net::SocketAddr,

    /// Path to the SQLite database file for persistent ledger storage.
    /// If absent, state is in-memory only and lost on restart.
    /// Example: /var/lib/surety/ledger.db
    #[arg(long, env = "SURETY_DB_PATH")]
    db_path: Option<std::path::PathBuf>,

    /// Bearer secret proving the arbitration capability on
    /// POST /claims/{id}/resolve. Omit only in development — without it
    /// anyone can resolve claims.
    #[arg(long, env = "SURETY_ARBITER_SECRET")]
    arbiter_secret: Option<String>,

    /// Bearer secret proving the admin capability on /admin/* routes.
    /// Omit only in development.
    #[arg(long, env = "SURETY_ADMIN_SECRET")]
    admin_secret: Option<String>,

    /// Minimum stake for verified status (micro-credits).
    /// Ignored once params have been persisted by an admin update.
    #[arg(long, env = "SURETY_MINIMUM_STAKE", default_value_t = surety_core::constants::DEFAULT_MINIMUM_STAKE)]
    minimum_stake: u64,

    /// Protocol fee on slashed amounts, in basis points (max 1000).
    #[arg(long, env = "SURETY_CLAIM_FEE_BPS", default_value_t = surety_core::constants::DEFAULT_CLAIM_FEE_BPS)]
    claim_fee_bps: u32,

    /// Challenge window after claim submission, in seconds.
    #[arg(long, env = "SURETY_CHALLENGE_PERIOD_SECS", default_value_t = surety_core::constants::DEFAULT_CHALLENGE_PERIOD_SECS)]
    challenge_period_secs: u64,

    /// Withdrawal cooldown for verified agents, in seconds.
    #[arg(long, env = "SURETY_UNSTAKE_COOLDOWN_SECS", default_value_t = surety_core::constants::DEFAULT_UNSTAKE_COOLDOWN_SECS)]
    unstake_cooldown_secs: u64,
}

impl Config {
    fn params(&self) -> ProtocolParams {
        ProtocolParams {
            minimum_stake: self.minimum_stake,
            claim_fee_bps: self.claim_fee_bps,
            challenge_period_secs: self.challenge_period_secs,
            unstake_cooldown_secs: self.unstake_cooldown_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surety_service=info".parse().unwrap()),
        )
        .init();

    let config = Config::parse();
    let params = config.params();
    params
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    if config.arbiter_secret.is_none() {
        tracing::warn!(
            "No --arbiter-secret set. POST /claims/{{id}}/resolve is unauthenticated. \
             Set SURETY_ARBITER_SECRET in production."
        );
    }
    if config.admin_secret.is_none() {
        tracing::warn!(
            "No --admin-secret set. /admin/* routes are unauthenticated. \
             Set SURETY_ADMIN_SECRET in production."
        );
    }

    let directory = Arc::new(MemoryDirectory::new());
    let (persistence, ledger) = match config.db_path {
        Some(ref path) => {
            let (persistence, state) = Persistence::open(path, params)?;
            if state.had_params {
                tracing::info!("Using persisted protocol params (admin-set) over CLI defaults");
            }
            for (agent, owner) in &state.bindings {
                directory.register(*agent, *owner);
            }
            let ledger =
                TrustLedger::from_snapshot(state.snapshot, directory.clone(), Clock::system())
                    .map_err(|e| anyhow::anyhow!("persisted state rejected: {e}"))?;
            (persistence, ledger)
        }
        None => {
            tracing::warn!(
                "No --db-path set. Ledger state is in-memory only and will be \
                 lost on restart. Set SURETY_DB_PATH in production."
            );
            (
                Persistence::in_memory(),
                TrustLedger::new(params, directory.clone(), Clock::system()),
            )
        }
    };

    let state = AppState {
        ledger: Arc::new(ledger),
        directory,
        persistence,
        arbiter_secret: config.arbiter_secret,
        admin_secret: config.admin_secret,
    };

    let app = Router::new()
        .route("/health",                          get(api::health))
        .route("/stats/network",                   get(api::get_network_stats))
        .route("/events",                          get(api::get_events))
        .route("/stake/{agent_id}/deposit",        post(api::deposit))
        .route("/stake/{agent_id}/request-unstake", post(api::request_unstake))
        .route("/stake/{agent_id}/withdraw",       post(api::withdraw))
        .route("/stake/{agent_id}",                get(api::get_stake))
        .route("/stake/{agent_id}/withdrawable",   get(api::get_withdrawable))
        .route("/verified/{agent_id}",             get(api::get_verified))
        .route("/claims",                          post(api::submit_claim))
        .route("/claims/{claim_id}",               get(api::get_claim))
        .route("/claims/{claim_id}/challenge",     post(api::challenge_claim))
        .route("/claims/{claim_id}/resolve",       post(api::resolve_claim))
        .route("/claims/agent/{agent_id}",         get(api::get_agent_claims))
        .route("/admin/params",                    post(api::set_params))
        .route("/admin/sweep-fees",                post(api::sweep_fees))
        .route("/admin/agents",                    post(api::register_agent))
        .route("/admin/accounts/{account_id}/credit", post(api::credit_account))
        .with_state(state);

    tracing::info!("surety-service listening on {}", config.listen);
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
