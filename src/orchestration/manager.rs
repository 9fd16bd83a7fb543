use crate::config::StrategyConfig;
use crate::datasource::{FeedError, PoolFeed};
use crate::db::{PositionStore, StoreError};
use crate::domain::TimeMs;
use crate::engine::{plan_cycle, PlanViolation};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Runs reconciliation cycles: fetch the feed, plan against the active set, persist atomically.
#[derive(Clone)]
pub struct LifecycleManager {
    feed: Arc<dyn PoolFeed>,
    store: Arc<dyn PositionStore>,
    config: StrategyConfig,
}

/// Counts from one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pools_seen: usize,
    pub kept: usize,
    pub updated: usize,
    pub closed: usize,
    pub opened: usize,
    pub vacancies_remaining: usize,
    /// Surviving positions beyond the configured capacity, e.g. after it was lowered.
    pub over_capacity: usize,
}

impl CycleReport {
    pub fn transitions(&self) -> usize {
        self.closed + self.opened
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("pool feed unavailable: {0}")]
    Feed(#[from] FeedError),
    #[error("position store failed: {0}")]
    Store(#[from] StoreError),
    #[error("cycle plan rejected: {0}")]
    Invariant(#[from] PlanViolation),
}

impl LifecycleManager {
    pub fn new(
        feed: Arc<dyn PoolFeed>,
        store: Arc<dyn PositionStore>,
        config: StrategyConfig,
    ) -> Self {
        Self {
            feed,
            store,
            config,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        self.run_cycle_at(TimeMs::now()).await
    }

    /// Run one cycle with `now` as the timestamp for exits and new entries.
    ///
    /// On any error nothing has been written.
    pub async fn run_cycle_at(&self, now: TimeMs) -> Result<CycleReport, CycleError> {
        let pools = self.feed.fetch_pools().await?;
        let active = self.store.list_active().await?;

        let plan = plan_cycle(&active, &pools, &self.config, now);
        plan.validate(&active, self.config.max_active_positions)?;

        for closure in &plan.closures {
            if let Some(exit) = &closure.exit {
                info!(position_id = %closure.id, reason = %exit.reason, "Closing position");
            }
        }
        for candidate in &plan.selected {
            info!(
                pool_id = %candidate.pool.id,
                symbol = %candidate.pool.symbol,
                chain = %candidate.pool.chain,
                score = candidate.score,
                "Opening position"
            );
        }

        if plan.is_empty() {
            debug!("Cycle produced no changes");
        } else {
            self.store
                .apply_batch(&plan.updates, &plan.closures, &plan.creations)
                .await?;
        }

        let capacity = self.config.max_active_positions;
        let over_capacity = plan.surviving.saturating_sub(capacity);
        if over_capacity > 0 {
            warn!(
                active = plan.surviving,
                capacity,
                over_capacity,
                "Active positions exceed capacity; no new entries until they close"
            );
        }

        let report = CycleReport {
            pools_seen: pools.len(),
            kept: plan.surviving,
            updated: plan.updates.len(),
            closed: plan.closures.len(),
            opened: plan.creations.len(),
            vacancies_remaining: plan.vacancies_remaining,
            over_capacity,
        };
        info!(
            pools = report.pools_seen,
            kept = report.kept,
            updated = report.updated,
            closed = report.closed,
            opened = report.opened,
            vacancies = report.vacancies_remaining,
            "Cycle complete"
        );
        Ok(report)
    }
}
