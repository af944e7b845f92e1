mod report;
mod sim;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use surety_core::ProtocolParams;

use crate::sim::{run_sim, SimParams};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "surety-simulator",
    about = "Randomized workload driver — checks ledger invariants under an adversarial op mix",
)]
struct Cli {
    /// Agents in the simulated network.
    #[arg(long, default_value_t = 20)]
    agents: usize,

    /// Rounds to run (one operation per round).
    #[arg(long, default_value_t = 5_000)]
    rounds: usize,

    /// Starting balance per owner account (micro-credits).
    #[arg(long, default_value_t = 50_000_000)]
    initial_credit: u64,

    /// Minimum stake for verified status (micro-credits).
    #[arg(long, default_value_t = 10_000_000)]
    min_stake: u64,

    /// Protocol fee in basis points (max 1000).
    #[arg(long, default_value_t = 100)]
    fee_bps: u32,

    /// Challenge window in seconds.
    #[arg(long, default_value_t = 3_600)]
    challenge_period: u64,

    /// Withdrawal cooldown in seconds.
    #[arg(long, default_value_t = 7_200)]
    cooldown: u64,

    /// Probability that an open claim gets challenged.
    #[arg(long, default_value_t = 0.25)]
    challenge_prob: f64,

    /// Probability that a resolution approves the claim.
    #[arg(long, default_value_t = 0.5)]
    approve_prob: f64,

    /// RNG seed for reproducibility.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output results as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    let protocol = ProtocolParams {
        minimum_stake: cli.min_stake,
        claim_fee_bps: cli.fee_bps,
        challenge_period_secs: cli.challenge_period,
        unstake_cooldown_secs: cli.cooldown,
    };
    if let Err(e) = protocol.validate() {
        eprintln!("invalid protocol params: {e}");
        std::process::exit(2);
    }

    let params = SimParams {
        n_agents: cli.agents.max(2),
        n_rounds: cli.rounds,
        initial_credit: cli.initial_credit,
        challenge_prob: cli.challenge_prob,
        approve_prob: cli.approve_prob,
        protocol,
    };

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let result = run_sim(&params, &mut rng);

    if cli.json {
        report::print_json(&result);
    } else {
        report::print_report(&params, &result);
    }
}
