//! In-memory position store with the same all-or-nothing batch semantics as SQLite.

use super::store::{PositionStore, StoreError};
use crate::domain::{NewPosition, Position, PositionPatch, TimeMs};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: Mutex<Vec<Position>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing history.
    pub fn with_positions(self, positions: Vec<Position>) -> Self {
        self.lock().extend(positions);
        self
    }

    /// Make `apply_batch` fail until reset, to exercise the fatal-persistence path.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Position> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Position>> {
        self.positions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sorted(mut positions: Vec<Position>) -> Vec<Position> {
        positions.sort_by(|a, b| a.entry_time.cmp(&b.entry_time).then(a.id.cmp(&b.id)));
        positions
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn list_active(&self) -> Result<Vec<Position>, StoreError> {
        let active = self.lock().iter().filter(|p| p.is_active()).cloned().collect();
        Ok(Self::sorted(active))
    }

    async fn list_all(&self) -> Result<Vec<Position>, StoreError> {
        Ok(Self::sorted(self.lock().clone()))
    }

    async fn apply_batch(
        &self,
        updates: &[PositionPatch],
        closures: &[PositionPatch],
        creations: &[NewPosition],
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }

        let now = TimeMs::now();
        let mut guard = self.lock();
        // Work on a copy and swap it in only once every step succeeded.
        let mut staged = guard.clone();

        for patch in closures {
            if patch.exit.is_none() {
                return Err(StoreError::MissingExit(patch.id));
            }
            apply_to(&mut staged, patch, now)?;
        }
        for patch in updates {
            if patch.is_closure() {
                return Err(StoreError::Corrupt(format!(
                    "update for {} carries an exit record",
                    patch.id
                )));
            }
            apply_to(&mut staged, patch, now)?;
        }

        let mut active_pools: HashSet<_> = staged
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.pool_id.clone())
            .collect();
        for new in creations {
            if !active_pools.insert(new.pool_id.clone()) {
                return Err(StoreError::DuplicateActivePool(new.pool_id.to_string()));
            }
            staged.push(new.clone().into_position());
        }

        *guard = staged;
        Ok(())
    }
}

fn apply_to(
    positions: &mut [Position],
    patch: &PositionPatch,
    now: TimeMs,
) -> Result<(), StoreError> {
    let position = positions
        .iter_mut()
        .find(|p| p.id == patch.id)
        .ok_or(StoreError::NotActive(patch.id))?;
    if position.apply_patch(patch, now) {
        Ok(())
    } else {
        Err(StoreError::NotActive(patch.id))
    }
}
