//! SQLite persistence with in-memory fallback.
//!
//! The ledger itself stays in memory; every accepted mutation is also
//! written through to SQLite (when `--db-path` is set) so state survives
//! restarts without replaying the event stream. Writes are fire-and-forget:
//! a failed write is logged, never surfaced to the caller.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use surety_core::{
    AccountId, AgentId, Claim, ClaimId, ClaimStatus, LedgerSnapshot, ProtocolParams, Settlement,
    StakeInfo, StakePosition,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS positions (
    agent_id             TEXT    PRIMARY KEY,
    amount               INTEGER NOT NULL DEFAULT 0,
    staked_at            INTEGER NOT NULL DEFAULT 0,
    unstake_requested_at INTEGER
);

CREATE TABLE IF NOT EXISTS claims (
    claim_id           TEXT    PRIMARY KEY,
    agent_id           TEXT    NOT NULL,
    submitter          TEXT    NOT NULL,
    amount             INTEGER NOT NULL,
    reason             TEXT    NOT NULL,
    status             TEXT    NOT NULL,
    submitted_at       INTEGER NOT NULL,
    challenge_deadline INTEGER NOT NULL,
    slashed            INTEGER,
    fee                INTEGER,
    payout             INTEGER,
    beneficiary        TEXT
);
CREATE INDEX IF NOT EXISTS idx_claims_agent ON claims(agent_id);

CREATE TABLE IF NOT EXISTS accounts (
    account_id TEXT    PRIMARY KEY,
    balance    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS directory (
    agent_id TEXT PRIMARY KEY,
    owner    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

PRAGMA journal_mode = WAL;
PRAGMA synchronous  = NORMAL;
";

/// Everything needed to rebuild the service state at startup.
pub struct PersistedState {
    pub snapshot: LedgerSnapshot,
    pub bindings: Vec<(AgentId, AccountId)>,
    /// True when a params row existed (admin changes survive restarts and
    /// override the CLI defaults).
    pub had_params: bool,
}

struct Db(rusqlite::Connection);

impl Db {
    fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Db(conn))
    }

    fn load(&self, default_params: ProtocolParams) -> anyhow::Result<PersistedState> {
        let mut positions = Vec::new();
        {
            let mut stmt = self.0.prepare(
                "SELECT agent_id, amount, staked_at, unstake_requested_at FROM positions",
            )?;
            let rows = stmt.query_map([], |row| {
                let agent: String = row.get(0)?;
                let amount: i64 = row.get(1)?;
                let staked_at: i64 = row.get(2)?;
                let requested: Option<i64> = row.get(3)?;
                Ok((agent, amount, staked_at, requested))
            })?;
            for row in rows {
                let (agent, amount, staked_at, requested) = row?;
                positions.push((
                    AgentId::from_str(&agent)?,
                    StakePosition {
                        amount: amount as u64,
                        staked_at: staked_at as u64,
                        unstake_requested_at: requested.map(|t| t as u64),
                    },
                ));
            }
        }

        let mut claims = Vec::new();
        {
            let mut stmt = self.0.prepare(
                "SELECT claim_id, agent_id, submitter, amount, reason, status,
                        submitted_at, challenge_deadline, slashed, fee, payout, beneficiary
                 FROM claims",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, Option<i64>>(8)?,
                    row.get::<_, Option<i64>>(9)?,
                    row.get::<_, Option<i64>>(10)?,
                    row.get::<_, Option<String>>(11)?,
                ))
            })?;
            for row in rows {
                let (id, agent, submitter, amount, reason, status, submitted_at, deadline,
                    slashed, fee, payout, beneficiary) = row?;
                let submitter = AccountId::from_str(&submitter)?;
                let settlement = match (slashed, fee, payout, beneficiary) {
                    (Some(s), Some(f), Some(p), Some(b)) => Some(Settlement {
                        requested: amount as u64,
                        slashed: s as u64,
                        fee: f as u64,
                        payout: p as u64,
                        beneficiary: AccountId::from_str(&b)?,
                    }),
                    _ => None,
                };
                claims.push(Claim {
                    id: ClaimId::from_str(&id)?,
                    agent_id: AgentId::from_str(&agent)?,
                    submitter,
                    amount: amount as u64,
                    reason,
                    status: ClaimStatus::from_str(&status)
                        .map_err(|e| anyhow::anyhow!("claims row {id}: {e}"))?,
                    submitted_at: submitted_at as u64,
                    challenge_deadline: deadline as u64,
                    settlement,
                });
            }
        }

        let mut accounts = Vec::new();
        {
            let mut stmt = self.0.prepare("SELECT account_id, balance FROM accounts")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (account, balance) = row?;
                accounts.push((AccountId::from_str(&account)?, balance as u64));
            }
        }

        let mut bindings = Vec::new();
        {
            let mut stmt = self.0.prepare("SELECT agent_id, owner FROM directory")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (agent, owner) = row?;
                bindings.push((AgentId::from_str(&agent)?, AccountId::from_str(&owner)?));
            }
        }

        let custodial = self
            .meta_get("custodial")?
            .map(|v| v.parse::<u64>())
            .transpose()?
            .unwrap_or(0);
        let claim_seq = self
            .meta_get("claim_seq")?
            .map(|v| v.parse::<u64>())
            .transpose()?
            .unwrap_or(0);
        let stored_params = self.meta_get("params")?;
        let had_params = stored_params.is_some();
        let params = match stored_params {
            Some(json) => serde_json::from_str(&json)?,
            None => default_params,
        };

        Ok(PersistedState {
            snapshot: LedgerSnapshot {
                params,
                positions,
                claims,
                accounts,
                custodial,
                claim_seq,
            },
            bindings,
            had_params,
        })
    }

    fn meta_get(&self, key: &str) -> rusqlite::Result<Option<String>> {
        let mut stmt = self.0.prepare("SELECT value FROM meta WHERE key = ?1")?;
        let mut rows = stmt.query_map([key], |row| row.get::<_, String>(0))?;
        rows.next().transpose()
    }

    fn meta_put(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        self.0.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    fn upsert_position(&self, info: &StakeInfo) -> rusqlite::Result<()> {
        self.0.execute(
            "INSERT INTO positions (agent_id, amount, staked_at, unstake_requested_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(agent_id) DO UPDATE SET
                 amount               = excluded.amount,
                 staked_at            = excluded.staked_at,
                 unstake_requested_at = excluded.unstake_requested_at",
            rusqlite::params![
                info.agent_id.to_string(),
                info.amount as i64,
                info.staked_at as i64,
                info.unstake_requested_at.map(|t| t as i64),
            ],
        )?;
        Ok(())
    }

    fn upsert_claim(&self, claim: &Claim) -> rusqlite::Result<()> {
        let settlement = claim.settlement.as_ref();
        self.0.execute(
            "INSERT INTO claims
                 (claim_id, agent_id, submitter, amount, reason, status,
                  submitted_at, challenge_deadline, slashed, fee, payout, beneficiary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(claim_id) DO UPDATE SET
                 status      = excluded.status,
                 slashed     = excluded.slashed,
                 fee         = excluded.fee,
                 payout      = excluded.payout,
                 beneficiary = excluded.beneficiary",
            rusqlite::params![
                claim.id.to_string(),
                claim.agent_id.to_string(),
                claim.submitter.to_string(),
                claim.amount as i64,
                claim.reason,
                claim.status.as_str(),
                claim.submitted_at as i64,
                claim.challenge_deadline as i64,
                settlement.map(|s| s.slashed as i64),
                settlement.map(|s| s.fee as i64),
                settlement.map(|s| s.payout as i64),
                settlement.map(|s| s.beneficiary.to_string()),
            ],
        )?;
        Ok(())
    }

    fn upsert_account(&self, account: &AccountId, balance: u64) -> rusqlite::Result<()> {
        self.0.execute(
            "INSERT INTO accounts (account_id, balance) VALUES (?1, ?2)
             ON CONFLICT(account_id) DO UPDATE SET balance = excluded.balance",
            rusqlite::params![account.to_string(), balance as i64],
        )?;
        Ok(())
    }

    fn upsert_binding(&self, agent: &AgentId, owner: &AccountId) -> rusqlite::Result<()> {
        self.0.execute(
            "INSERT INTO directory (agent_id, owner) VALUES (?1, ?2)
             ON CONFLICT(agent_id) DO UPDATE SET owner = excluded.owner",
            rusqlite::params![agent.to_string(), owner.to_string()],
        )?;
        Ok(())
    }
}

/// Shared write-through handle. `None` = in-memory only (no `--db-path`).
#[derive(Clone, Default)]
pub struct Persistence {
    db: Arc<Mutex<Option<Db>>>,
}

impl Persistence {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or create) the database and load any persisted state.
    pub fn open(
        path: &Path,
        default_params: ProtocolParams,
    ) -> anyhow::Result<(Self, PersistedState)> {
        let db = Db::open(path).map_err(|e| anyhow::anyhow!("SQLite open failed: {e}"))?;
        let state = db.load(default_params)?;
        tracing::info!(
            "Loaded {} positions, {} claims, {} accounts from {}",
            state.snapshot.positions.len(),
            state.snapshot.claims.len(),
            state.snapshot.accounts.len(),
            path.display(),
        );
        Ok((
            Self {
                db: Arc::new(Mutex::new(Some(db))),
            },
            state,
        ))
    }

    fn with_db(&self, op: impl FnOnce(&Db) -> rusqlite::Result<()>, what: &str) {
        let db = self.db.lock().unwrap();
        if let Some(ref conn) = *db {
            if let Err(e) = op(conn) {
                tracing::warn!("SQLite write failed ({what}): {e}");
            }
        }
    }

    pub fn save_position(&self, info: &StakeInfo) {
        self.with_db(|db| db.upsert_position(info), "position");
    }

    pub fn save_claim(&self, claim: &Claim) {
        self.with_db(|db| db.upsert_claim(claim), "claim");
    }

    pub fn save_account(&self, account: &AccountId, balance: u64) {
        self.with_db(|db| db.upsert_account(account, balance), "account");
    }

    pub fn save_binding(&self, agent: &AgentId, owner: &AccountId) {
        self.with_db(|db| db.upsert_binding(agent, owner), "binding");
    }

    pub fn save_custody(&self, custodial: u64) {
        self.with_db(|db| db.meta_put("custodial", &custodial.to_string()), "custody");
    }

    pub fn save_claim_seq(&self, seq: u64) {
        self.with_db(|db| db.meta_put("claim_seq", &seq.to_string()), "claim_seq");
    }

    pub fn save_params(&self, params: &ProtocolParams) {
        let json = match serde_json::to_string(params) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("params serialize failed: {e}");
                return;
            }
        };
        self.with_db(|db| db.meta_put("params", &json), "params");
    }
}
