//! Grouping utilities over the profit breakdown: chain share, monthly seasonality and
//! pairwise pool correlation.

use super::profit::{compute_profit, ratio_pct};
use super::within_lookback;
use crate::config::StrategyConfig;
use crate::domain::{PoolId, Position, TimeMs};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sha2::{Digest, Sha256};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Days of synthesized returns per pool in the correlation analysis.
pub const CORRELATION_DAYS: usize = 30;

/// Noise band applied to each synthesized daily return, relative to the implied rate.
const NOISE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainShare {
    pub chain: String,
    pub positions: usize,
    pub active: usize,
    /// Fraction of positions in the window held on this chain.
    pub share: f64,
    pub total_net_profit: f64,
    pub average_roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPerformance {
    /// Entry month as `YYYY-MM` (UTC).
    pub month: String,
    pub positions: usize,
    pub total_net_profit: f64,
    pub average_roi: f64,
    pub roi_on_stake: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationMatrix {
    pub pool_ids: Vec<PoolId>,
    /// Row-major, `pool_ids.len()` squared entries.
    pub matrix: Vec<Vec<f64>>,
    /// Hex seeds used for each pool's synthesized series.
    pub seeds: Vec<String>,
    pub days: usize,
    /// The series are synthetic; treat the result as illustrative.
    pub approximate: bool,
}

/// Per-chain position counts and profit, sorted by chain name.
pub fn chain_distribution(
    positions: &[Position],
    config: &StrategyConfig,
    as_of: TimeMs,
) -> Vec<ChainShare> {
    let mut groups: BTreeMap<&str, (usize, usize, f64, f64)> = BTreeMap::new();
    let mut total = 0usize;

    for position in positions.iter().filter(|p| within_lookback(p, config, as_of)) {
        let breakdown = compute_profit(position, config, as_of);
        let entry = groups.entry(position.chain.as_str()).or_insert((0, 0, 0.0, 0.0));
        entry.0 += 1;
        if position.is_active() {
            entry.1 += 1;
        }
        entry.2 += breakdown.net_profit;
        entry.3 += breakdown.roi;
        total += 1;
    }

    groups
        .into_iter()
        .map(|(chain, (count, active, net, roi_sum))| ChainShare {
            chain: chain.to_string(),
            positions: count,
            active,
            share: count as f64 / total as f64,
            total_net_profit: net,
            average_roi: roi_sum / count as f64,
        })
        .collect()
}

/// Performance grouped by entry month, oldest first.
pub fn monthly_seasonality(
    positions: &[Position],
    config: &StrategyConfig,
    as_of: TimeMs,
) -> Vec<MonthlyPerformance> {
    let mut groups: BTreeMap<String, (usize, f64, f64)> = BTreeMap::new();

    for position in positions.iter().filter(|p| within_lookback(p, config, as_of)) {
        let breakdown = compute_profit(position, config, as_of);
        let month = position.entry_time.to_datetime().format("%Y-%m").to_string();
        let entry = groups.entry(month).or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += breakdown.net_profit;
        entry.2 += breakdown.roi;
    }

    groups
        .into_iter()
        .map(|(month, (count, net, roi_sum))| MonthlyPerformance {
            month,
            positions: count,
            total_net_profit: net,
            average_roi: roi_sum / count as f64,
            roi_on_stake: ratio_pct(net, config.stake_usd * count as f64),
        })
        .collect()
}

/// Pairwise Pearson correlation of synthesized daily returns, one series per pool.
///
/// Each pool's series is its implied daily rate with bounded noise. The noise is seeded
/// from the pool id and entry time, so identical history gives identical output.
pub fn correlation_matrix(
    positions: &[Position],
    config: &StrategyConfig,
    as_of: TimeMs,
) -> CorrelationMatrix {
    // Latest entry per pool represents it.
    let mut latest: BTreeMap<&PoolId, &Position> = BTreeMap::new();
    for position in positions.iter().filter(|p| within_lookback(p, config, as_of)) {
        latest
            .entry(&position.pool_id)
            .and_modify(|held| {
                if position.entry_time > held.entry_time {
                    *held = position;
                }
            })
            .or_insert(position);
    }

    let mut pool_ids = Vec::with_capacity(latest.len());
    let mut seeds = Vec::with_capacity(latest.len());
    let mut series = Vec::with_capacity(latest.len());
    for (pool_id, position) in latest {
        let seed = series_seed(position);
        pool_ids.push(pool_id.clone());
        seeds.push(hex::encode(seed));
        series.push(synthesize_daily_returns(position, u64::from_be_bytes(seed)));
    }

    let n = series.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(&series[i], &series[j]);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }

    CorrelationMatrix {
        pool_ids,
        matrix,
        seeds,
        days: CORRELATION_DAYS,
        approximate: true,
    }
}

fn series_seed(position: &Position) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(position.pool_id.as_str().as_bytes());
    hasher.update(position.entry_time.as_ms().to_be_bytes());
    let digest = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    seed
}

fn synthesize_daily_returns(position: &Position, seed: u64) -> Vec<f64> {
    let daily_rate = position.entry_yield.to_f64() / 365.0 / 100.0;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..CORRELATION_DAYS)
        .map(|_| daily_rate * (1.0 + rng.random_range(-NOISE..=NOISE)))
        .collect()
}

/// Pearson correlation; 0 when either series is constant or the lengths differ.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return 0.0;
    }
    let mean_x = xs.iter().mean();
    let mean_y = ys.iter().mean();

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}
