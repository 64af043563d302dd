//! Quorum coordinator
//!
//! Majority-based mutual exclusion across N independent backing stores: one
//! [`StoreLock`] per store, same key and lease everywhere. Acquisition
//! succeeds when at least ⌊N/2⌋+1 nodes lock within the per-node timeout;
//! release is best-effort across every node.
//!
//! Construction validates `nodes × per_node_timeout × 10 ≤ lease` for a
//! caller-chosen lease, so the acquisition phase cannot eat a meaningful
//! share of the lease itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use relock_common::{LockError, Result};
use relock_store::StoreClient;

use crate::lock::StoreLock;
use crate::options::{DEFAULT_NODE_TIMEOUT, LockOptions, QuorumOptions};

/// Mutual-exclusion lock over a majority of independent backing stores.
pub struct QuorumLock {
    locks: Vec<StoreLock>,
    per_node_timeout: Duration,
}

impl std::fmt::Debug for QuorumLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumLock")
            .field("per_node_timeout", &self.per_node_timeout)
            .finish_non_exhaustive()
    }
}

impl QuorumLock {
    /// Build one lock per store over the shared `key`.
    ///
    /// Fails with [`LockError::Config`] when fewer than 3 stores are given,
    /// or when an explicit lease cannot cover ten times the total per-node
    /// timeout budget. Without an explicit lease every node runs on the
    /// default lease with its renewal watchdog armed.
    pub fn new(
        key: impl Into<String>,
        stores: Vec<Arc<dyn StoreClient>>,
        options: QuorumOptions,
    ) -> Result<Self> {
        if stores.len() < 3 {
            return Err(LockError::Config(format!(
                "quorum requires at least 3 independent stores, got {}",
                stores.len()
            )));
        }
        let per_node_timeout = options.per_node_timeout.unwrap_or(DEFAULT_NODE_TIMEOUT);
        if let Some(lease) = options.lease
            && per_node_timeout * (stores.len() as u32) * 10 > lease
        {
            return Err(LockError::Config(format!(
                "per-node timeout budget {:?} x {} nodes x 10 exceeds lease {:?}",
                per_node_timeout,
                stores.len(),
                lease
            )));
        }

        let key = key.into();
        let locks = stores
            .into_iter()
            .map(|store| {
                let mut node_options = LockOptions::new();
                if let Some(lease) = options.lease {
                    node_options = node_options.with_lease(lease);
                }
                if let Some(ref prefix) = options.key_prefix {
                    node_options = node_options.with_key_prefix(prefix.clone());
                }
                StoreLock::new(key.clone(), store, node_options)
            })
            .collect();

        Ok(Self {
            locks,
            per_node_timeout,
        })
    }

    /// Nodes a successful acquisition requires.
    pub fn majority(&self) -> usize {
        self.locks.len() / 2 + 1
    }

    /// Acquire the lock on a majority of nodes.
    ///
    /// Nodes are attempted sequentially; an attempt counts toward the
    /// quorum only when it succeeds within the per-node timeout. On failure
    /// the nodes that did lock are left locked; call [`Self::release`] to
    /// let them go.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        let needed = self.majority();
        let mut acquired = 0;
        for (node, lock) in self.locks.iter().enumerate() {
            let started = Instant::now();
            let outcome = lock.acquire(cancel).await;
            let elapsed = started.elapsed();
            match outcome {
                Ok(()) if elapsed < self.per_node_timeout => acquired += 1,
                Ok(()) => {
                    debug!(node, ?elapsed, "node locked too slowly to count toward quorum");
                }
                Err(err) => {
                    debug!(node, error = %err, "quorum node acquire failed");
                }
            }
        }
        if acquired >= needed {
            Ok(())
        } else {
            Err(LockError::QuorumNotReached { acquired, needed })
        }
    }

    /// Release every node, best-effort.
    ///
    /// All nodes are always attempted; the first error encountered is
    /// returned after the sweep completes.
    pub async fn release(&self) -> Result<()> {
        let mut first_err = None;
        for (node, lock) in self.locks.iter().enumerate() {
            if let Err(err) = lock.release().await {
                warn!(node, error = %err, "quorum node release failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DEFAULT_KEY_PREFIX;
    use relock_common::StoreError;
    use relock_store::{AtomicScript, MemoryStore, SetOutcome};

    struct FailingStore;

    #[async_trait::async_trait]
    impl StoreClient for FailingStore {
        async fn conditional_set(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> std::result::Result<SetOutcome, StoreError> {
            Err(StoreError::Transport("store unreachable".to_string()))
        }

        async fn run_script(
            &self,
            _script: AtomicScript,
            _key: &str,
            _args: &[String],
        ) -> std::result::Result<i64, StoreError> {
            Err(StoreError::Transport("store unreachable".to_string()))
        }
    }

    /// Store that answers correctly but only after a fixed delay.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl SlowStore {
        fn new(delay: Duration) -> Self {
            Self {
                inner: MemoryStore::new(),
                delay,
            }
        }
    }

    #[async_trait::async_trait]
    impl StoreClient for SlowStore {
        async fn conditional_set(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> std::result::Result<SetOutcome, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.conditional_set(key, value, ttl).await
        }

        async fn run_script(
            &self,
            script: AtomicScript,
            key: &str,
            args: &[String],
        ) -> std::result::Result<i64, StoreError> {
            self.inner.run_script(script, key, args).await
        }
    }

    fn memory_stores(n: usize) -> (Vec<Arc<MemoryStore>>, Vec<Arc<dyn StoreClient>>) {
        let stores: Vec<Arc<MemoryStore>> = (0..n).map(|_| Arc::new(MemoryStore::new())).collect();
        let handles = stores
            .iter()
            .map(|s| s.clone() as Arc<dyn StoreClient>)
            .collect();
        (stores, handles)
    }

    fn lock_key(key: &str) -> String {
        format!("{DEFAULT_KEY_PREFIX}{key}")
    }

    #[tokio::test]
    async fn test_requires_three_nodes() {
        let (_, handles) = memory_stores(2);
        let err = QuorumLock::new("job-1", handles, QuorumOptions::new()).unwrap_err();
        assert!(matches!(err, LockError::Config(_)));
    }

    #[tokio::test]
    async fn test_default_lease_constructs() {
        let (_, handles) = memory_stores(5);
        let quorum = QuorumLock::new(
            "job-1",
            handles,
            QuorumOptions::new().with_per_node_timeout(Duration::from_millis(50)),
        )
        .unwrap();
        assert_eq!(quorum.majority(), 3);
    }

    #[tokio::test]
    async fn test_lease_budget_validation() {
        // 3 nodes x 50 ms x 10 = 1.5 s: a 1 s lease is infeasible.
        let (_, handles) = memory_stores(3);
        let err = QuorumLock::new(
            "job-1",
            handles,
            QuorumOptions::new()
                .with_per_node_timeout(Duration::from_millis(50))
                .with_lease(Duration::from_secs(1)),
        )
        .unwrap_err();
        assert!(matches!(err, LockError::Config(_)));

        // A 2 s lease covers the same budget.
        let (_, handles) = memory_stores(3);
        assert!(
            QuorumLock::new(
                "job-1",
                handles,
                QuorumOptions::new()
                    .with_per_node_timeout(Duration::from_millis(50))
                    .with_lease(Duration::from_secs(2)),
            )
            .is_ok()
        );
    }

    #[tokio::test]
    async fn test_acquire_and_release_all_healthy() {
        let (stores, handles) = memory_stores(3);
        let quorum = QuorumLock::new(
            "job-1",
            handles,
            QuorumOptions::new().with_lease(Duration::from_secs(30)),
        )
        .unwrap();
        let cancel = CancellationToken::new();

        quorum.acquire(&cancel).await.unwrap();
        for store in &stores {
            assert!(store.get(&lock_key("job-1")).is_some());
        }

        quorum.release().await.unwrap();
        for store in &stores {
            assert!(store.get(&lock_key("job-1")).is_none());
        }
    }

    #[tokio::test]
    async fn test_acquire_tolerates_minority_failures() {
        let handles: Vec<Arc<dyn StoreClient>> = vec![
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(FailingStore),
        ];
        let quorum = QuorumLock::new(
            "job-1",
            handles,
            QuorumOptions::new().with_lease(Duration::from_secs(30)),
        )
        .unwrap();
        quorum.acquire(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_acquire_fails_without_majority() {
        let survivor = Arc::new(MemoryStore::new());
        let handles: Vec<Arc<dyn StoreClient>> = vec![
            survivor.clone(),
            Arc::new(FailingStore),
            Arc::new(FailingStore),
        ];
        let quorum = QuorumLock::new(
            "job-1",
            handles,
            QuorumOptions::new().with_lease(Duration::from_secs(30)),
        )
        .unwrap();

        let err = quorum.acquire(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            LockError::QuorumNotReached {
                acquired: 1,
                needed: 2
            }
        ));

        // No rollback: the node that locked stays locked until release.
        assert!(survivor.get(&lock_key("job-1")).is_some());
        let _ = quorum.release().await;
        assert!(survivor.get(&lock_key("job-1")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_nodes_do_not_count() {
        let handles: Vec<Arc<dyn StoreClient>> = vec![
            Arc::new(MemoryStore::new()),
            Arc::new(SlowStore::new(Duration::from_millis(100))),
            Arc::new(SlowStore::new(Duration::from_millis(100))),
        ];
        let quorum = QuorumLock::new(
            "job-1",
            handles,
            QuorumOptions::new()
                .with_per_node_timeout(Duration::from_millis(50))
                .with_lease(Duration::from_secs(30)),
        )
        .unwrap();

        // The slow nodes lock, but past the timeout: no quorum.
        let err = quorum.acquire(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            LockError::QuorumNotReached {
                acquired: 1,
                needed: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_release_attempts_every_node() {
        let (stores, _) = memory_stores(2);
        let handles: Vec<Arc<dyn StoreClient>> = vec![
            stores[0].clone(),
            Arc::new(FailingStore),
            stores[1].clone(),
        ];
        let quorum = QuorumLock::new(
            "job-1",
            handles,
            QuorumOptions::new().with_lease(Duration::from_secs(30)),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        quorum.acquire(&cancel).await.unwrap();

        // The failing node errors first, but the node after it is still
        // released; the first error is what comes back.
        let err = quorum.release().await.unwrap_err();
        assert!(matches!(err, LockError::Transport(_)));
        assert!(stores[0].get(&lock_key("job-1")).is_none());
        assert!(stores[1].get(&lock_key("job-1")).is_none());
    }
}
