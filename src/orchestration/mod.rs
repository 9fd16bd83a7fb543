pub mod manager;
pub mod ticker;

pub use manager::{CycleError, CycleReport, LifecycleManager};
pub use ticker::Ticker;
