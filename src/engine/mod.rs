//! Pure decision logic for the position lifecycle.

pub mod lifecycle;
pub mod scorer;

pub use lifecycle::{
    evaluate_position, plan_cycle, CyclePlan, Evaluation, ExitCause, PlanViolation, POOL_REMOVED,
};
pub use scorer::{filter_and_rank, is_eligible, risk_multiplier, ScoredPool};
