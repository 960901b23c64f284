use clap::Args;
use serde_json::Value;

use convex_trader_core::optimization::multi_period::{self, MultiPeriodInput};
use convex_trader_core::optimization::single_period::{self, SinglePeriodInput};

use crate::input;

#[derive(Args)]
pub struct SpoArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// Override the risk aversion in the input
    #[arg(long)]
    pub gamma: Option<f64>,

    /// Cap on solver iterations
    #[arg(long)]
    pub max_iter: Option<u32>,
}

#[derive(Args)]
pub struct MpoArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// Require non-negative planned weights
    #[arg(long)]
    pub long_only: bool,

    /// Cap on solver iterations
    #[arg(long)]
    pub max_iter: Option<u32>,
}

pub fn run_spo(args: SpoArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut spo_input: SinglePeriodInput =
        input::read_input(args.input.as_deref(), "single-period optimization")?;
    if let Some(gamma) = args.gamma {
        spo_input.risk_aversion = gamma;
    }
    if let Some(max_iter) = args.max_iter {
        spo_input.solver.max_iter = max_iter;
    }
    let result = single_period::optimize_single_period(&spo_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_mpo(args: MpoArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mpo_input: MultiPeriodInput =
        input::read_input(args.input.as_deref(), "multi-period optimization")?;
    if args.long_only {
        mpo_input.settings.long_only = true;
    }
    if let Some(max_iter) = args.max_iter {
        mpo_input.solver.max_iter = max_iter;
    }
    let result = multi_period::optimize_multi_period(&mpo_input)?;
    Ok(serde_json::to_value(result)?)
}
