use super::profit::{compute_profit, ratio_pct, ProfitBreakdown};
use super::within_lookback;
use crate::config::StrategyConfig;
use crate::domain::{PoolId, Position, TimeMs};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub chain: String,
    pub positions: usize,
    pub total_net_profit: f64,
    pub average_roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPerformance {
    pub position_id: Uuid,
    pub pool_id: PoolId,
    pub symbol: String,
    pub chain: String,
    pub net_profit: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub position_count: usize,
    pub active_count: usize,
    pub closed_count: usize,
    pub initial_capital: f64,
    pub total_gross_profit: f64,
    pub total_fees: f64,
    pub total_il: f64,
    /// Sum of net profits; the portfolio's actual profit.
    pub total_net_profit: f64,
    pub total_value: f64,
    /// Gross profit over initial capital, in percent.
    pub total_roi: f64,
    /// Net profit over initial capital, in percent.
    pub total_net_roi: f64,
    pub chains: Vec<ChainStats>,
    pub best_position: Option<PositionPerformance>,
    pub worst_position: Option<PositionPerformance>,
    /// Mean holding period of closed positions.
    pub average_holding_days: f64,
}

/// Portfolio-wide aggregates over the positions inside the lookback window.
pub fn compute_portfolio_stats(
    positions: &[Position],
    config: &StrategyConfig,
    as_of: TimeMs,
) -> PortfolioStats {
    let evaluated: Vec<(&Position, ProfitBreakdown)> = positions
        .iter()
        .filter(|p| within_lookback(p, config, as_of))
        .map(|p| (p, compute_profit(p, config, as_of)))
        .collect();

    let active_count = evaluated.iter().filter(|(p, _)| p.is_active()).count();
    let closed_count = evaluated.len() - active_count;

    let mut total_gross_profit = 0.0;
    let mut total_fees = 0.0;
    let mut total_il = 0.0;
    let mut total_net_profit = 0.0;
    let mut closed_days = 0.0;
    let mut chains: BTreeMap<&str, (usize, f64, f64)> = BTreeMap::new();

    for (position, breakdown) in &evaluated {
        total_gross_profit += breakdown.gross_profit;
        total_fees += breakdown.fees;
        total_il += breakdown.il_amount;
        total_net_profit += breakdown.net_profit;
        if !position.is_active() {
            closed_days += breakdown.days_in_pool;
        }

        let entry = chains.entry(position.chain.as_str()).or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += breakdown.net_profit;
        entry.2 += breakdown.roi;
    }

    let chains = chains
        .into_iter()
        .map(|(chain, (count, net, roi_sum))| ChainStats {
            chain: chain.to_string(),
            positions: count,
            total_net_profit: net,
            average_roi: roi_sum / count as f64,
        })
        .collect();

    let best_position = evaluated
        .iter()
        .max_by(|a, b| a.1.roi.total_cmp(&b.1.roi))
        .map(|(p, b)| performance(p, b));
    let worst_position = evaluated
        .iter()
        .min_by(|a, b| a.1.roi.total_cmp(&b.1.roi))
        .map(|(p, b)| performance(p, b));

    let initial_capital = config.initial_capital_usd;
    PortfolioStats {
        position_count: evaluated.len(),
        active_count,
        closed_count,
        initial_capital,
        total_gross_profit,
        total_fees,
        total_il,
        total_net_profit,
        total_value: initial_capital + total_net_profit,
        total_roi: ratio_pct(total_gross_profit, initial_capital),
        total_net_roi: ratio_pct(total_net_profit, initial_capital),
        chains,
        best_position,
        worst_position,
        average_holding_days: if closed_count == 0 {
            0.0
        } else {
            closed_days / closed_count as f64
        },
    }
}

fn performance(position: &Position, breakdown: &ProfitBreakdown) -> PositionPerformance {
    PositionPerformance {
        position_id: position.id,
        pool_id: position.pool_id.clone(),
        symbol: position.symbol.clone(),
        chain: position.chain.clone(),
        net_profit: breakdown.net_profit,
        roi: breakdown.roi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, NewPosition, Pool, MS_PER_DAY};

    fn position(id: &str, chain: &str, apy: i64, entry_day: i64) -> Position {
        let pool = Pool {
            id: PoolId::new(id),
            symbol: format!("{}-USDC", id),
            project: "curve".to_string(),
            chain: chain.to_string(),
            apy: Decimal::from(apy),
            tvl_usd: Decimal::from(1_000_000),
        };
        NewPosition::from_pool(&pool, TimeMs::new(entry_day * MS_PER_DAY)).into_position()
    }

    fn close(mut p: Position, exit_day: i64) -> Position {
        p.status = crate::domain::PositionStatus::Unstaked;
        p.exit_time = Some(TimeMs::new(exit_day * MS_PER_DAY));
        p.exit_yield = Some(p.current_yield);
        p.exit_tvl = Some(p.current_tvl);
        p.exit_reason = Some("Pool removed".to_string());
        p
    }

    #[test]
    fn test_empty_history_is_all_zero() {
        let stats = compute_portfolio_stats(&[], &StrategyConfig::default(), TimeMs::new(0));
        assert_eq!(stats.position_count, 0);
        assert_eq!(stats.total_net_profit, 0.0);
        assert_eq!(stats.total_roi, 0.0);
        assert_eq!(stats.total_value, stats.initial_capital);
        assert_eq!(stats.average_holding_days, 0.0);
        assert!(stats.chains.is_empty());
        assert!(stats.best_position.is_none());
    }

    #[test]
    fn test_gross_and_net_roi_stay_distinct() {
        let config = StrategyConfig::default();
        let positions = vec![position("a", "Ethereum", 365, 0), position("b", "Base", 730, 0)];
        let stats = compute_portfolio_stats(&positions, &config, TimeMs::new(10 * MS_PER_DAY));

        assert_eq!(stats.active_count, 2);
        assert!(stats.total_fees > 0.0);
        assert!(stats.total_roi > stats.total_net_roi);
        let expected = stats.total_gross_profit / config.initial_capital_usd * 100.0;
        assert!((stats.total_roi - expected).abs() < 1e-9);
        assert!(
            (stats.total_value - (config.initial_capital_usd + stats.total_net_profit)).abs() < 1e-9
        );
    }

    #[test]
    fn test_zero_capital_roi_is_zero() {
        let config = StrategyConfig {
            initial_capital_usd: 0.0,
            ..StrategyConfig::default()
        };
        let positions = vec![position("a", "Base", 365, 0)];
        let stats = compute_portfolio_stats(&positions, &config, TimeMs::new(10 * MS_PER_DAY));
        assert_eq!(stats.total_roi, 0.0);
        assert_eq!(stats.total_net_roi, 0.0);
    }

    #[test]
    fn test_lookback_excludes_old_closures() {
        let config = StrategyConfig::default();
        let as_of = TimeMs::new(100 * MS_PER_DAY);
        let positions = vec![
            close(position("old", "Base", 365, 0), 10),
            close(position("recent", "Base", 365, 60), 80),
            position("open", "Base", 365, 1),
        ];
        let stats = compute_portfolio_stats(&positions, &config, as_of);
        assert_eq!(stats.position_count, 2);
        assert_eq!(stats.closed_count, 1);
        assert_eq!(stats.active_count, 1);
        assert!((stats.average_holding_days - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_chain_aggregates_and_extremes() {
        let config = StrategyConfig::default();
        let positions = vec![
            position("a", "Ethereum", 365, 0),
            position("b", "Base", 3650, 0),
            position("c", "Base", 365, 0),
        ];
        let stats = compute_portfolio_stats(&positions, &config, TimeMs::new(10 * MS_PER_DAY));

        let chains: Vec<(&str, usize)> = stats
            .chains
            .iter()
            .map(|c| (c.chain.as_str(), c.positions))
            .collect();
        assert_eq!(chains, vec![("Base", 2), ("Ethereum", 1)]);
        assert_eq!(stats.best_position.unwrap().pool_id.as_str(), "b");
        assert_eq!(stats.worst_position.unwrap().pool_id.as_str(), "a");
    }
}
