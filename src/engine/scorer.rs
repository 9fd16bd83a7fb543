//! Pool eligibility filter and risk-adjusted ranking.

use crate::config::StrategyConfig;
use crate::domain::{Decimal, Pool, PoolId};
use serde::Serialize;
use std::collections::HashSet;

/// A pool that passed the eligibility filter, with its ranking score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredPool {
    pub pool: Pool,
    pub risk_multiplier: f64,
    pub score: f64,
}

/// Admission predicate, excluding pools already held.
pub fn is_eligible(pool: &Pool, config: &StrategyConfig) -> bool {
    pool.monthly_yield() >= config.min_monthly_yield
        && pool.tvl_usd >= config.min_tvl_usd
        && pool.apy > Decimal::zero()
        && pool.apy <= config.max_yearly_yield
}

/// Multiplicative risk adjustment. Yield and TVL penalties apply only their highest tier.
pub fn risk_multiplier(pool: &Pool, config: &StrategyConfig) -> f64 {
    let mut multiplier = 1.0;

    let apy = pool.apy;
    if apy > Decimal::from(2000) {
        multiplier *= 0.70;
    } else if apy > Decimal::from(1000) {
        multiplier *= 0.85;
    } else if apy > Decimal::from(500) {
        multiplier *= 0.95;
    }

    let tvl = pool.tvl_usd;
    if tvl < Decimal::from(500_000) {
        multiplier *= 0.80;
    } else if tvl < Decimal::from(1_000_000) {
        multiplier *= 0.90;
    }

    if pool.chain.eq_ignore_ascii_case(&config.safe_chain) {
        multiplier *= 1.10;
    }
    if config
        .established_chains
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&pool.chain))
    {
        multiplier *= 1.05;
    }

    let project = pool.project.to_ascii_lowercase();
    if config
        .reputable_projects
        .iter()
        .any(|p| !p.is_empty() && project.contains(&p.to_ascii_lowercase()))
    {
        multiplier *= 1.15;
    }

    multiplier
}

/// `tvl * monthlyYield * riskMultiplier`.
pub fn score(pool: &Pool, config: &StrategyConfig) -> (f64, f64) {
    let multiplier = risk_multiplier(pool, config);
    let score = pool.tvl_usd.to_f64() * pool.monthly_yield().to_f64() * multiplier;
    (multiplier, score)
}

/// Filter `pools` to admissible replacement candidates and rank them best first.
///
/// Ties are broken by pool id so the ranking is stable across runs.
pub fn filter_and_rank(
    pools: &[Pool],
    config: &StrategyConfig,
    excluded: &HashSet<PoolId>,
) -> Vec<ScoredPool> {
    let mut ranked: Vec<ScoredPool> = pools
        .iter()
        .filter(|pool| !excluded.contains(&pool.id) && is_eligible(pool, config))
        .map(|pool| {
            let (risk_multiplier, score) = score(pool, config);
            ScoredPool {
                pool: pool.clone(),
                risk_multiplier,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.pool.id.cmp(&b.pool.id))
    });
    ranked
}
