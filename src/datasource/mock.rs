//! Mock pool feed for testing without network calls.

use super::{FeedError, PoolFeed};
use crate::domain::{Pool, PoolId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock feed returning a replaceable in-memory pool list.
#[derive(Debug, Default)]
pub struct MockPoolFeed {
    pools: Mutex<Vec<Pool>>,
    failure: Mutex<Option<FeedError>>,
    calls: AtomicUsize,
}

impl MockPoolFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pool to the mock feed.
    pub fn with_pool(self, pool: Pool) -> Self {
        self.lock_pools().push(pool);
        self
    }

    pub fn with_pools(self, pools: Vec<Pool>) -> Self {
        self.lock_pools().extend(pools);
        self
    }

    /// Make every fetch fail with `error`.
    pub fn failing(self, error: FeedError) -> Self {
        self.set_failure(Some(error));
        self
    }

    /// Replace the pool list served by subsequent fetches.
    pub fn set_pools(&self, pools: Vec<Pool>) {
        *self.lock_pools() = pools;
    }

    pub fn remove_pool(&self, id: &PoolId) {
        self.lock_pools().retain(|p| &p.id != id);
    }

    /// Update yield/TVL of a listed pool in place.
    pub fn update_pool(&self, id: &PoolId, update: impl FnOnce(&mut Pool)) {
        if let Some(pool) = self.lock_pools().iter_mut().find(|p| &p.id == id) {
            update(pool);
        }
    }

    pub fn set_failure(&self, error: Option<FeedError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock_pools(&self) -> std::sync::MutexGuard<'_, Vec<Pool>> {
        self.pools.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PoolFeed for MockPoolFeed {
    async fn fetch_pools(&self) -> Result<Vec<Pool>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(err);
        }
        Ok(self.lock_pools().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;

    fn make_pool(id: &str) -> Pool {
        Pool {
            id: PoolId::new(id),
            symbol: "A-B".to_string(),
            project: "curve".to_string(),
            chain: "Ethereum".to_string(),
            apy: Decimal::from(600),
            tvl_usd: Decimal::from(1_000_000),
        }
    }

    #[tokio::test]
    async fn test_mock_feed_returns_pools() {
        let feed = MockPoolFeed::new().with_pool(make_pool("a"));
        let pools = feed.fetch_pools().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_feed_mutation() {
        let feed = MockPoolFeed::new().with_pools(vec![make_pool("a"), make_pool("b")]);
        feed.remove_pool(&PoolId::new("a"));
        feed.update_pool(&PoolId::new("b"), |p| p.apy = Decimal::from(10));

        let pools = feed.fetch_pools().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].apy, Decimal::from(10));
    }

    #[tokio::test]
    async fn test_mock_feed_failure() {
        let feed = MockPoolFeed::new()
            .with_pool(make_pool("a"))
            .failing(FeedError::RateLimited);
        assert!(matches!(
            feed.fetch_pools().await,
            Err(FeedError::RateLimited)
        ));

        feed.set_failure(None);
        assert_eq!(feed.fetch_pools().await.unwrap().len(), 1);
    }
}
