//! Reconciliation planning: decide which active positions close, which are refreshed,
//! and which pools fill the freed capacity.
//!
//! Everything here is pure. The caller persists the resulting [`CyclePlan`] as one unit.

use super::scorer::{filter_and_rank, ScoredPool};
use crate::config::StrategyConfig;
use crate::domain::{ExitRecord, NewPosition, Pool, PoolId, Position, PositionPatch, TimeMs};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const POOL_REMOVED: &str = "Pool removed";

/// Why an active position is being closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitCause {
    PoolRemoved,
    YieldBelowFloor,
    TvlBelowFloor,
}

/// Outcome of evaluating one active position against the fresh feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Still active; carries the refreshed values (None when nothing changed).
    Keep(Option<PositionPatch>),
    Close(ExitCause, PositionPatch),
}

/// Decide the fate of a single active position.
pub fn evaluate_position(
    position: &Position,
    feed_pool: Option<&Pool>,
    config: &StrategyConfig,
    now: TimeMs,
) -> Evaluation {
    let Some(pool) = feed_pool else {
        // Freeze on the last values we saw; the vanished pool has none.
        let patch = PositionPatch {
            id: position.id,
            current_yield: position.current_yield,
            current_tvl: position.current_tvl,
            exit: Some(ExitRecord {
                time: now,
                exit_yield: position.current_yield,
                exit_tvl: position.current_tvl,
                reason: POOL_REMOVED.to_string(),
            }),
        };
        return Evaluation::Close(ExitCause::PoolRemoved, patch);
    };

    let monthly = pool.monthly_yield();
    let exit_with = |reason: String| PositionPatch {
        id: position.id,
        current_yield: pool.apy,
        current_tvl: pool.tvl_usd,
        exit: Some(ExitRecord {
            time: now,
            exit_yield: pool.apy,
            exit_tvl: pool.tvl_usd,
            reason,
        }),
    };

    if monthly < config.exit_monthly_yield {
        let reason = format!("APR dropped to {:.1}%/month", monthly);
        return Evaluation::Close(ExitCause::YieldBelowFloor, exit_with(reason));
    }
    if pool.tvl_usd < config.exit_tvl_usd {
        let reason = format!("TVL dropped to {:.0}", pool.tvl_usd);
        return Evaluation::Close(ExitCause::TvlBelowFloor, exit_with(reason));
    }

    if pool.apy == position.current_yield && pool.tvl_usd == position.current_tvl {
        return Evaluation::Keep(None);
    }
    Evaluation::Keep(Some(PositionPatch {
        id: position.id,
        current_yield: pool.apy,
        current_tvl: pool.tvl_usd,
        exit: None,
    }))
}

/// The decision set of one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CyclePlan {
    /// Surviving positions whose current yield/TVL changed.
    pub updates: Vec<PositionPatch>,
    pub closures: Vec<PositionPatch>,
    pub creations: Vec<NewPosition>,
    /// Active positions that survive this cycle (updated or not).
    pub surviving: usize,
    /// Open slots left after filling.
    pub vacancies_remaining: usize,
    /// Candidates selected for the creations, best first.
    pub selected: Vec<ScoredPool>,
}

impl CyclePlan {
    /// Status transitions (closures plus openings) this plan would perform.
    pub fn transitions(&self) -> usize {
        self.closures.len() + self.creations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.closures.is_empty() && self.creations.is_empty()
    }

    /// Check the plan against the position invariants before anything is persisted.
    pub fn validate(&self, active: &[Position], capacity: usize) -> Result<(), PlanViolation> {
        let active_ids: HashSet<_> = active.iter().map(|p| p.id).collect();
        let mut touched = HashSet::new();

        for patch in self.updates.iter().chain(self.closures.iter()) {
            if !active_ids.contains(&patch.id) {
                return Err(PlanViolation::UnknownPosition(patch.id.to_string()));
            }
            if !touched.insert(patch.id) {
                return Err(PlanViolation::PatchedTwice(patch.id.to_string()));
            }
        }
        if let Some(bad) = self.closures.iter().find(|p| p.exit.is_none()) {
            return Err(PlanViolation::ClosureWithoutExit(bad.id.to_string()));
        }
        if let Some(bad) = self.updates.iter().find(|p| p.exit.is_some()) {
            return Err(PlanViolation::UpdateWithExit(bad.id.to_string()));
        }

        let closing: HashSet<_> = self.closures.iter().map(|p| p.id).collect();
        let mut farming_pools: HashSet<&PoolId> = active
            .iter()
            .filter(|p| !closing.contains(&p.id))
            .map(|p| &p.pool_id)
            .collect();
        let surviving = farming_pools.len();
        for new in &self.creations {
            if !farming_pools.insert(&new.pool_id) {
                return Err(PlanViolation::DuplicatePool(new.pool_id.to_string()));
            }
        }

        if !self.creations.is_empty() && surviving + self.creations.len() > capacity {
            return Err(PlanViolation::OverCapacity {
                active: surviving + self.creations.len(),
                capacity,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanViolation {
    #[error("plan patches unknown or inactive position {0}")]
    UnknownPosition(String),
    #[error("plan patches position {0} more than once")]
    PatchedTwice(String),
    #[error("closure for position {0} has no exit record")]
    ClosureWithoutExit(String),
    #[error("update for position {0} carries an exit record")]
    UpdateWithExit(String),
    #[error("plan would hold pool {0} twice")]
    DuplicatePool(String),
    #[error("plan would hold {active} positions, capacity is {capacity}")]
    OverCapacity { active: usize, capacity: usize },
}

/// Build the full decision set for one cycle.
///
/// `active` must be the positions currently `FARMING`.
pub fn plan_cycle(
    active: &[Position],
    pools: &[Pool],
    config: &StrategyConfig,
    now: TimeMs,
) -> CyclePlan {
    // First listing wins if the feed repeats an id.
    let mut by_id: HashMap<&PoolId, &Pool> = HashMap::with_capacity(pools.len());
    for pool in pools {
        by_id.entry(&pool.id).or_insert(pool);
    }

    let mut plan = CyclePlan::default();
    let mut held: HashSet<PoolId> = HashSet::new();

    for position in active {
        match evaluate_position(position, by_id.get(&position.pool_id).copied(), config, now) {
            Evaluation::Keep(patch) => {
                plan.surviving += 1;
                held.insert(position.pool_id.clone());
                if let Some(patch) = patch {
                    plan.updates.push(patch);
                }
            }
            Evaluation::Close(_, patch) => plan.closures.push(patch),
        }
    }

    let vacancies = config.max_active_positions.saturating_sub(plan.surviving);
    if vacancies > 0 {
        for candidate in filter_and_rank(pools, config, &held) {
            if plan.creations.len() == vacancies {
                break;
            }
            if !held.insert(candidate.pool.id.clone()) {
                continue;
            }
            plan.creations.push(NewPosition::from_pool(&candidate.pool, now));
            plan.selected.push(candidate);
        }
    }
    plan.vacancies_remaining = vacancies - plan.creations.len();
    plan
}
