//! The narrow persistence seam shared by the lifecycle manager and the analytics engine.

use crate::domain::{NewPosition, Position, PositionPatch};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Durable record of positions.
///
/// `apply_batch` is all-or-nothing: either every update, closure and creation is applied,
/// or none is.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Positions with status `FARMING`, oldest entry first.
    async fn list_active(&self) -> Result<Vec<Position>, StoreError>;

    /// Every position ever created, oldest entry first.
    async fn list_all(&self) -> Result<Vec<Position>, StoreError>;

    /// Apply one reconciliation outcome atomically.
    ///
    /// # Errors
    /// Fails without applying anything if a patched position is missing or no longer
    /// active, if a closure lacks exit fields, or if the backend rejects the write.
    async fn apply_batch(
        &self,
        updates: &[PositionPatch],
        closures: &[PositionPatch],
        creations: &[NewPosition],
    ) -> Result<(), StoreError>;

    async fn get_position(&self, id: Uuid) -> Result<Option<Position>, StoreError> {
        Ok(self.list_all().await?.into_iter().find(|p| p.id == id))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("Position {0} is missing or no longer active")]
    NotActive(Uuid),
    #[error("Pool {0} already has an active position")]
    DuplicateActivePool(String),
    #[error("Closure for position {0} has no exit record")]
    MissingExit(Uuid),
    #[error("Corrupt position row: {0}")]
    Corrupt(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
