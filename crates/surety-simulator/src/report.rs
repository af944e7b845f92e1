//! Human-readable report + JSON output.

use crate::sim::{SimParams, SimResult};

pub fn print_report(params: &SimParams, result: &SimResult) {
    let credit = 1_000_000.0; // micro-credits per credit

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           surety workload simulator — results                ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Network       : {} agents   Rounds: {}", params.n_agents, result.rounds);
    println!(
        "  Protocol      : min stake {:.2}cr   fee {} bps   challenge {}s   cooldown {}s",
        params.protocol.minimum_stake as f64 / credit,
        params.protocol.claim_fee_bps,
        params.protocol.challenge_period_secs,
        params.protocol.unstake_cooldown_secs,
    );
    println!();
    println!("── Operations ────────────────────────────────────────────────");
    println!("  Deposits           : {}", result.ops.deposits);
    println!("  Unstake requests   : {}", result.ops.unstake_requests);
    println!("  Withdrawals        : {}", result.ops.withdrawals);
    println!("  Claims submitted   : {}", result.ops.claims_submitted);
    println!("  Claims challenged  : {}", result.ops.claims_challenged);
    println!(
        "  Claims resolved    : {} approved / {} rejected",
        result.ops.claims_approved, result.ops.claims_rejected,
    );
    println!("  Fee sweeps         : {}", result.ops.fee_sweeps);
    println!("  Rejected ops       : {}  (gates working as intended)", result.ops.rejected);
    println!();
    println!("── Economics ─────────────────────────────────────────────────");
    println!("  Total slashed      : {:.2} cr", result.total_slashed as f64 / credit);
    println!("  Fees accrued       : {:.2} cr", result.total_fees as f64 / credit);
    println!("  Fees swept         : {:.2} cr", result.fees_swept as f64 / credit);
    println!(
        "  Final custody      : {:.2} cr over {:.2} cr staked (surplus {:.2} cr)",
        result.final_stats.custodial_balance as f64 / credit,
        result.final_stats.total_staked as f64 / credit,
        result.final_stats.fee_surplus as f64 / credit,
    );
    println!();
    println!("── Invariants ────────────────────────────────────────────────");
    println!(
        "  {} checks passed: conservation, custody coverage, derived \n  verification, terminal immutability, settlement arithmetic.",
        result.invariant_checks,
    );
    println!();
}

pub fn print_json(result: &SimResult) {
    // Serialization of plain counters cannot fail.
    println!(
        "{}",
        serde_json::to_string_pretty(result).expect("serialize sim result"),
    );
}
