//! Position persistence.
//!
//! This module provides:
//! - The `PositionStore` seam used by the lifecycle manager and analytics
//! - SQLite initialization, pragmas and migrations
//! - The SQLite `Repository` and an in-memory `MemoryStore`

pub mod memory;
pub mod migrations;
pub mod repo;
pub mod store;

pub use memory::MemoryStore;
pub use migrations::init_db;
pub use repo::Repository;
pub use store::{PositionStore, StoreError};
