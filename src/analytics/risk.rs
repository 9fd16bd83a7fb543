use super::profit::{compute_profit, finite_or_zero, ProfitBreakdown};
use super::within_lookback;
use crate::config::StrategyConfig;
use crate::domain::{Position, TimeMs};
use serde::Serialize;
use statrs::statistics::Statistics;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub sample_size: usize,
    /// Mean ROI in percent.
    pub mean_return: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Largest peak-to-trough decline as a fraction (0.25 = 25%).
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub average_win: f64,
    pub average_loss: f64,
}

/// Risk metrics over the ROI of each position in the lookback window.
pub fn compute_risk_metrics(
    positions: &[Position],
    config: &StrategyConfig,
    as_of: TimeMs,
) -> RiskMetrics {
    let mut window: Vec<&Position> = positions
        .iter()
        .filter(|p| within_lookback(p, config, as_of))
        .collect();
    window.sort_by(|a, b| a.entry_time.cmp(&b.entry_time).then(a.id.cmp(&b.id)));

    let breakdowns: Vec<ProfitBreakdown> = window
        .iter()
        .map(|p| compute_profit(p, config, as_of))
        .collect();
    metrics_from_breakdowns(&breakdowns)
}

/// Metrics over breakdowns already in chronological order.
pub fn metrics_from_breakdowns(breakdowns: &[ProfitBreakdown]) -> RiskMetrics {
    if breakdowns.is_empty() {
        return RiskMetrics::default();
    }

    let returns: Vec<f64> = breakdowns.iter().map(|b| b.roi).collect();
    let mean_return = finite_or_zero(returns.iter().mean());
    let variance = finite_or_zero(returns.iter().population_variance());
    let std_dev = finite_or_zero(returns.iter().population_std_dev());

    let sharpe_ratio = if std_dev > 0.0 {
        mean_return / std_dev
    } else {
        0.0
    };

    let downside = downside_deviation(&returns);
    let sortino_ratio = if downside > 0.0 {
        mean_return / downside
    } else {
        0.0
    };

    let profits: Vec<f64> = breakdowns.iter().map(|b| b.net_profit).collect();
    let wins: Vec<f64> = profits.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = profits.iter().copied().filter(|p| *p <= 0.0).collect();

    RiskMetrics {
        sample_size: returns.len(),
        mean_return,
        variance,
        std_dev,
        sharpe_ratio,
        sortino_ratio,
        max_drawdown: max_drawdown(&returns),
        win_rate: wins.len() as f64 / profits.len() as f64,
        average_win: mean_or_zero(&wins),
        average_loss: mean_or_zero(&losses),
    }
}

/// Root mean square of the negative returns only; 0 when there are none.
pub fn downside_deviation(returns: &[f64]) -> f64 {
    let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if negatives.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = negatives.iter().map(|r| r * r).sum();
    finite_or_zero((sum_sq / negatives.len() as f64).sqrt())
}

/// Peak-to-trough decline of equity compounded through `returns_pct` in order.
///
/// Equity cannot go below zero, so a total loss caps the result at 1.0.
pub fn max_drawdown(returns_pct: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = equity;
    let mut worst = 0.0_f64;

    for r in returns_pct {
        equity = (equity * (1.0 + r / 100.0)).max(0.0);
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            worst = worst.max((peak - equity) / peak);
        }
    }
    finite_or_zero(worst)
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        finite_or_zero(values.iter().mean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, NewPosition, Pool, PoolId, MS_PER_DAY, MS_PER_HOUR};
    use uuid::Uuid;

    fn breakdown(roi: f64) -> ProfitBreakdown {
        ProfitBreakdown {
            position_id: Uuid::new_v4(),
            days_in_pool: 1.0,
            stake: 1000.0,
            gross_profit: roi * 10.0,
            fees: 0.0,
            price_change_multiple: 1.0,
            il_fraction: 0.0,
            il_amount: 0.0,
            net_profit: roi * 10.0,
            roi,
            total_value: 1000.0 + roi * 10.0,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_returns_have_zero_sharpe() {
        let m = metrics_from_breakdowns(&[breakdown(2.5), breakdown(2.5), breakdown(2.5)]);
        assert_eq!(m.std_dev, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert!(!m.sharpe_ratio.is_nan());
        assert!(approx(m.mean_return, 2.5));
    }

    #[test]
    fn test_identical_positions_have_zero_sharpe() {
        let config = StrategyConfig::default();
        let positions: Vec<Position> = ["a", "b", "c"]
            .iter()
            .map(|id| {
                let pool = Pool {
                    id: PoolId::new(*id),
                    symbol: "X-Y".to_string(),
                    project: "aave".to_string(),
                    chain: "Base".to_string(),
                    apy: Decimal::from(700),
                    tvl_usd: Decimal::from(1_000_000),
                };
                NewPosition::from_pool(&pool, TimeMs::new(0)).into_position()
            })
            .collect();
        let m = compute_risk_metrics(&positions, &config, TimeMs::new(5 * MS_PER_DAY));
        assert_eq!(m.sample_size, 3);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_empty_history_is_default() {
        let m = compute_risk_metrics(&[], &StrategyConfig::default(), TimeMs::new(0));
        assert_eq!(m, RiskMetrics::default());
    }

    #[test]
    fn test_population_statistics() {
        let m = metrics_from_breakdowns(&[breakdown(1.0), breakdown(3.0)]);
        assert!(approx(m.mean_return, 2.0));
        assert!(approx(m.variance, 1.0));
        assert!(approx(m.std_dev, 1.0));
        assert!(approx(m.sharpe_ratio, 2.0));
    }

    #[test]
    fn test_sortino_uses_negative_subset() {
        let m = metrics_from_breakdowns(&[breakdown(10.0), breakdown(-3.0), breakdown(-4.0)]);
        let downside = ((9.0 + 16.0) / 2.0f64).sqrt();
        assert!(approx(m.sortino_ratio, m.mean_return / downside));

        let no_losses = metrics_from_breakdowns(&[breakdown(1.0), breakdown(2.0)]);
        assert_eq!(no_losses.sortino_ratio, 0.0);
    }

    #[test]
    fn test_max_drawdown_compounds_in_order() {
        // 1.0 -> 1.1 -> 0.88 -> 0.968
        let dd = max_drawdown(&[10.0, -20.0, 10.0]);
        assert!(approx(dd, 0.2));
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_max_drawdown_floors_equity_at_zero() {
        // Fees larger than the stake: each return is below -100%.
        assert_eq!(max_drawdown(&[-250.0, -250.0]), 1.0);
        assert_eq!(max_drawdown(&[20.0, -150.0, 40.0]), 1.0);
    }

    #[test]
    fn test_fees_exceeding_stake_cap_drawdown() {
        let config = StrategyConfig {
            stake_usd: 10.0,
            ..StrategyConfig::default()
        };
        let positions: Vec<Position> = ["a", "b"]
            .iter()
            .map(|id| {
                let pool = Pool {
                    id: PoolId::new(*id),
                    symbol: "ETH-USDC".to_string(),
                    project: "uniswap-v3".to_string(),
                    chain: "Ethereum".to_string(),
                    apy: Decimal::from(700),
                    tvl_usd: Decimal::from(1_000_000),
                };
                NewPosition::from_pool(&pool, TimeMs::new(0)).into_position()
            })
            .collect();
        let m = compute_risk_metrics(&positions, &config, TimeMs::new(3 * MS_PER_HOUR));
        assert!(m.mean_return < -100.0);
        assert_eq!(m.max_drawdown, 1.0);
    }

    #[test]
    fn test_win_rate_and_averages() {
        let m = metrics_from_breakdowns(&[
            breakdown(2.0),
            breakdown(4.0),
            breakdown(-1.0),
            breakdown(0.0),
        ]);
        assert!(approx(m.win_rate, 0.5));
        assert!(approx(m.average_win, 30.0));
        assert!(approx(m.average_loss, -5.0));
    }
}
