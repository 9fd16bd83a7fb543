//! Domain types for the yield-farming simulator.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, PoolId
//! - Feed-sourced Pool snapshots
//! - Persisted Position records plus the creation/patch records the lifecycle emits

pub mod decimal;
pub mod pool;
pub mod position;
pub mod primitives;

pub use decimal::Decimal;
pub use pool::Pool;
pub use position::{ExitRecord, NewPosition, Position, PositionPatch, PositionStatus};
pub use primitives::{PoolId, TimeMs, MS_PER_DAY, MS_PER_HOUR};
