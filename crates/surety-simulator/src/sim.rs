//! Core simulation loop — one randomized workload, many rounds.
//!
//! Drives an in-process [`TrustLedger`] with a mixed operation stream and
//! re-checks the conservation invariants after every round:
//!   - no value is created or destroyed,
//!   - custody always covers the sum of recorded stakes,
//!   - verified status is exactly `amount >= minimum_stake`,
//!   - terminal claims never transition again,
//!   - every approved settlement satisfies `fee + payout == slashed`.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;

use surety_core::{
    AccountId, AgentDirectory, AgentId, Caller, ClaimId, ClaimStatus, Clock, LedgerError,
    MemoryDirectory, NetworkStats, ProtocolParams, TrustLedger,
};

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone)]
pub struct SimParams {
    /// Agents in the simulated network (each with its own owner account).
    pub n_agents: usize,
    /// Rounds to run; each round performs one randomly chosen operation.
    pub n_rounds: usize,
    /// Starting balance credited to every owner account (micro-credits).
    pub initial_credit: u64,
    /// Probability that an open claim gets challenged by the owner.
    pub challenge_prob: f64,
    /// Probability that a resolution approves the claim.
    pub approve_prob: f64,
    /// Protocol configuration under test.
    pub protocol: ProtocolParams,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            n_agents: 20,
            n_rounds: 5_000,
            initial_credit: 50_000_000, // 50 credits per owner
            challenge_prob: 0.25,
            approve_prob: 0.5,
            protocol: ProtocolParams {
                minimum_stake: 10_000_000,
                claim_fee_bps: 100,
                challenge_period_secs: 3_600,
                unstake_cooldown_secs: 7_200,
            },
        }
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Default, Clone, Serialize)]
pub struct OpCounts {
    pub deposits: u64,
    pub unstake_requests: u64,
    pub withdrawals: u64,
    pub claims_submitted: u64,
    pub claims_challenged: u64,
    pub claims_approved: u64,
    pub claims_rejected: u64,
    pub fee_sweeps: u64,
    /// Operations rejected by the ledger (cooldown gates, depleted stakes,
    /// expired windows). Expected under an adversarial mix.
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimResult {
    pub rounds: usize,
    pub ops: OpCounts,
    pub total_slashed: u64,
    pub total_fees: u64,
    pub fees_swept: u64,
    pub invariant_checks: u64,
    pub final_stats: NetworkStats,
}

// ============================================================================
// Workload
// ============================================================================

fn agent_id(i: usize) -> AgentId {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&(i as u64).to_le_bytes());
    bytes[31] = 0xA0;
    AgentId(bytes)
}

fn account_id(i: usize) -> AccountId {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&(i as u64).to_le_bytes());
    bytes[31] = 0xB0;
    AccountId(bytes)
}

const TREASURY: AccountId = {
    let mut bytes = [0u8; 32];
    bytes[31] = 0xFE;
    AccountId(bytes)
};

pub fn run_sim(params: &SimParams, rng: &mut StdRng) -> SimResult {
    let directory = Arc::new(MemoryDirectory::new());
    let clock = Clock::manual(1_700_000_000);
    let ledger = TrustLedger::new(params.protocol, directory.clone(), clock.clone());

    let mut total_credited: u64 = 0;
    for i in 0..params.n_agents {
        directory.register(agent_id(i), account_id(i));
        ledger
            .credit_account(&Caller::Admin, &account_id(i), params.initial_credit)
            .expect("initial credit");
        total_credited += params.initial_credit;
    }

    let mut ops = OpCounts::default();
    let mut open_claims: Vec<ClaimId> = Vec::new();
    // Terminal statuses observed so far, to catch any later transition.
    let mut terminal_seen: HashMap<ClaimId, ClaimStatus> = HashMap::new();
    let mut total_slashed: u64 = 0;
    let mut total_fees: u64 = 0;
    let mut fees_swept: u64 = 0;
    let mut checks: u64 = 0;

    for round in 0..params.n_rounds {
        let i = rng.gen_range(0..params.n_agents);
        let agent = agent_id(i);
        let owner = Caller::Account(account_id(i));

        let outcome: Result<(), LedgerError> = match rng.gen_range(0..100) {
            // Deposits dominate so stakes build up and claims have targets.
            0..=29 => {
                let amount = rng.gen_range(1_000_000..15_000_000);
                ledger.deposit(&owner, &agent, amount).map(|_| {
                    ops.deposits += 1;
                })
            }
            30..=39 => ledger.request_unstake(&owner, &agent).map(|_| {
                ops.unstake_requests += 1;
            }),
            40..=54 => {
                let amount = rng.gen_range(500_000..12_000_000);
                ledger.withdraw(&owner, &agent, amount).map(|_| {
                    ops.withdrawals += 1;
                })
            }
            55..=74 => {
                // A random counterparty files against this agent.
                let submitter = account_id(rng.gen_range(0..params.n_agents));
                let amount = rng.gen_range(500_000..12_000_000);
                ledger
                    .submit_claim(&Caller::Account(submitter), &agent, amount, "sim breach")
                    .map(|claim| {
                        open_claims.push(claim.id);
                        ops.claims_submitted += 1;
                    })
            }
            75..=84 => {
                if open_claims.is_empty() {
                    Ok(())
                } else if rng.gen_bool(params.challenge_prob) {
                    // The accused agent's owner contests a random open claim.
                    let id = open_claims[rng.gen_range(0..open_claims.len())];
                    let claim_owner = ledger
                        .get_claim(&id)
                        .ok()
                        .and_then(|c| directory.owner_of(&c.agent_id));
                    match claim_owner {
                        Some(account) => ledger
                            .challenge(&Caller::Account(account), &id)
                            .map(|_| {
                                ops.claims_challenged += 1;
                            }),
                        None => Ok(()),
                    }
                } else {
                    Ok(())
                }
            }
            85..=96 => {
                if open_claims.is_empty() {
                    Ok(())
                } else {
                    let id = open_claims.swap_remove(rng.gen_range(0..open_claims.len()));
                    let approved = rng.gen_bool(params.approve_prob);
                    ledger.resolve(&Caller::Arbiter, &id, approved).map(|res| {
                        terminal_seen.insert(id, res.claim.status);
                        match res.settlement {
                            Some(s) => {
                                ops.claims_approved += 1;
                                total_slashed += s.slashed;
                                total_fees += s.fee;
                            }
                            None => ops.claims_rejected += 1,
                        }
                    })
                }
            }
            _ => ledger.sweep_fees(&Caller::Admin, &TREASURY).map(|swept| {
                if swept > 0 {
                    ops.fee_sweeps += 1;
                    fees_swept += swept;
                }
            }),
        };
        if outcome.is_err() {
            ops.rejected += 1;
        }

        // Advance time irregularly so cooldowns and challenge windows are
        // exercised on both sides of their deadlines.
        if rng.gen_bool(0.3) {
            clock.advance(rng.gen_range(0..params.protocol.unstake_cooldown_secs / 2 + 1));
        }

        verify_invariants(&ledger, total_credited, &terminal_seen, round);
        checks += 1;
    }

    SimResult {
        rounds: params.n_rounds,
        ops,
        total_slashed,
        total_fees,
        fees_swept,
        invariant_checks: checks,
        final_stats: ledger.network_stats(),
    }
}

// ============================================================================
// Invariant verification
// ============================================================================

fn verify_invariants(
    ledger: &TrustLedger,
    total_credited: u64,
    terminal_seen: &HashMap<ClaimId, ClaimStatus>,
    round: usize,
) {
    let snap = ledger.snapshot();
    let external: u64 = snap.accounts.iter().map(|(_, b)| b).sum();
    let staked: u64 = snap.positions.iter().map(|(_, p)| p.amount).sum();

    assert_eq!(
        external + snap.custodial,
        total_credited,
        "round {round}: value created or destroyed",
    );
    assert!(
        snap.custodial >= staked,
        "round {round}: custody {} below total stake {staked}",
        snap.custodial,
    );

    for (agent, pos) in &snap.positions {
        assert_eq!(
            ledger.is_verified(agent),
            pos.amount >= snap.params.minimum_stake,
            "round {round}: stale verified flag for {agent}",
        );
    }

    for claim in &snap.claims {
        if let Some(frozen) = terminal_seen.get(&claim.id) {
            assert_eq!(
                claim.status, *frozen,
                "round {round}: terminal claim {} transitioned",
                claim.id,
            );
        }
        if claim.status == ClaimStatus::Approved {
            let s = claim
                .settlement
                .unwrap_or_else(|| panic!("round {round}: approved claim without settlement"));
            assert_eq!(
                s.fee + s.payout,
                s.slashed,
                "round {round}: settlement arithmetic broken",
            );
        }
    }
}
