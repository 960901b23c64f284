pub mod cost;
pub mod error;
pub mod optimization;
pub mod portfolio;
pub mod solver;
pub mod trade;
pub mod types;

pub use cost::{CostFunction, CostModel, CostModelSpec, CostSpec};
pub use error::ConvexTraderError;
pub use optimization::{
    MultiPeriodForecast, MultiPeriodOptimizer, Rebalance, SinglePeriodOptimizer, TradeMatrix,
    TradeVector,
};
pub use portfolio::{Portfolio, PortfolioSnapshot, PortfolioState, MAX_HOLDING};
pub use solver::{ClarabelSolver, ConvexSolver, Problem, Solution, SolveStatus, SolverSettings};
pub use trade::{Trade, TradeSide};
pub use types::*;

/// Standard result type for all convex-trader operations
pub type ConvexTraderResult<T> = Result<T, ConvexTraderError>;
