pub mod analytics;
pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::{Config, StrategyConfig};
pub use datasource::{FeedError, LlamaPoolFeed, MockPoolFeed, PoolFeed};
pub use db::{init_db, MemoryStore, PositionStore, Repository, StoreError};
pub use domain::{Decimal, Pool, PoolId, Position, PositionStatus, TimeMs};
pub use error::AppError;
pub use orchestration::{CycleError, CycleReport, LifecycleManager, Ticker};
