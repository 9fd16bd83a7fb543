//! Pure profit and risk analytics over position history.
//!
//! Nothing here performs I/O. Every function takes the evaluation instant `as_of`
//! explicitly, which is used as "now" for positions that are still open.

pub mod breakdown;
pub mod portfolio;
pub mod profit;
pub mod risk;

pub use breakdown::{
    chain_distribution, correlation_matrix, monthly_seasonality, ChainShare, CorrelationMatrix,
    MonthlyPerformance,
};
pub use portfolio::{compute_portfolio_stats, ChainStats, PortfolioStats, PositionPerformance};
pub use profit::{compute_profit, interpolate_il, ProfitBreakdown, IL_CAP, IL_TABLE};
pub use risk::{compute_risk_metrics, RiskMetrics};

use crate::config::StrategyConfig;
use crate::domain::{Position, TimeMs};

/// Active positions always count. Closed ones count if they exited within the window.
/// A non-positive `lookback_days` disables the filter.
pub fn within_lookback(position: &Position, config: &StrategyConfig, as_of: TimeMs) -> bool {
    if config.lookback_days <= 0 || position.is_active() {
        return true;
    }
    position.end_time(as_of) >= as_of.saturating_sub_days(config.lookback_days)
}
