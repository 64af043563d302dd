//! Single-store lease lock
//!
//! The protocol against one backing store: an atomic conditional set proves
//! acquisition, the check-and-delete script proves release, and the
//! check-and-refresh script extends a held lease. A background watchdog
//! renews the lease while the lock is held.
//!
//! Mutual exclusion is carried by the store's atomic primitives. The only
//! in-process synchronization is the watchdog slot, which guarantees at most
//! one live renewal task per lock instance.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use relock_common::{LockError, Result, owner_token};
use relock_store::{AtomicScript, SetOutcome, StoreClient};

use crate::options::{
    BLOCK_POLL_INTERVAL, LockOptions, ResolvedLockOptions, WATCHDOG_PERIOD, WATCHDOG_TTL_MARGIN,
};

/// Handle to a running renewal watchdog.
struct Watchdog {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Mutual-exclusion lock backed by one remote key-value store.
///
/// The owner token is generated once at construction and reused for every
/// acquire/renew/release of this instance, across repeated cycles.
pub struct StoreLock {
    key: String,
    token: String,
    store: Arc<dyn StoreClient>,
    opts: ResolvedLockOptions,
    watchdog: Mutex<Option<Watchdog>>,
}

impl StoreLock {
    pub fn new(key: impl Into<String>, store: Arc<dyn StoreClient>, options: LockOptions) -> Self {
        Self {
            key: key.into(),
            token: owner_token(),
            store,
            opts: options.resolve(),
            watchdog: Mutex::new(None),
        }
    }

    /// The owner token of this instance.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The namespaced key this lock occupies at the store.
    pub fn lock_key(&self) -> String {
        format!("{}{}", self.opts.key_prefix, self.key)
    }

    /// Acquire the lock.
    ///
    /// Tries once; with blocking enabled and the key held elsewhere, polls
    /// until acquired, `cancel` fires, or the wait budget elapses. On
    /// success the renewal watchdog starts when enabled, scoped to a child
    /// of `cancel`. Non-retryable failures are returned immediately.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        match self.try_acquire().await {
            Ok(()) => {}
            Err(err) if self.opts.blocking && err.is_retryable() => {
                self.block_acquire(cancel).await?;
            }
            Err(err) => return Err(err),
        }
        debug!(key = %self.lock_key(), token = %self.token, "lock acquired");
        self.start_watchdog(cancel).await;
        Ok(())
    }

    /// One conditional-set attempt.
    async fn try_acquire(&self) -> Result<()> {
        let outcome = self
            .store
            .conditional_set(&self.lock_key(), &self.token, self.opts.lease)
            .await?;
        match outcome {
            SetOutcome::Set => Ok(()),
            SetOutcome::AlreadyPresent => Err(LockError::AcquiredByOther),
        }
    }

    /// Poll for the lock at a fixed interval until acquired, cancelled, or
    /// out of budget. Cancellation is checked before the budget on every
    /// tick; only contention is retried.
    async fn block_acquire(&self, cancel: &CancellationToken) -> Result<()> {
        let deadline = Instant::now() + self.opts.block_wait;
        let mut poll = tokio::time::interval(BLOCK_POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LockError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(LockError::block_wait_timeout());
                }
                _ = poll.tick() => {}
            }
            match self.try_acquire().await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Release the lock.
    ///
    /// Atomically deletes the key iff it still holds this instance's token;
    /// otherwise reports [`LockError::NotOwner`] and leaves the stored lease
    /// untouched. The watchdog is stopped on every exit path.
    pub async fn release(&self) -> Result<()> {
        let result = self.delete_if_owner().await;
        self.stop_watchdog().await;
        if result.is_ok() {
            debug!(key = %self.lock_key(), token = %self.token, "lock released");
        }
        result
    }

    async fn delete_if_owner(&self) -> Result<()> {
        let reply = self
            .store
            .run_script(
                AtomicScript::CheckAndDelete,
                &self.lock_key(),
                &[self.token.clone()],
            )
            .await?;
        if reply == 1 { Ok(()) } else { Err(LockError::NotOwner) }
    }

    /// Extend the held lease's TTL.
    ///
    /// Atomic at the store: refreshes only while the key still holds this
    /// instance's token, otherwise reports [`LockError::NotOwner`]. The TTL
    /// is applied at whole-second granularity; fractions round up.
    pub async fn renew(&self, ttl: Duration) -> Result<()> {
        refresh_lease(self.store.as_ref(), &self.lock_key(), &self.token, ttl).await
    }

    /// Install the renewal watchdog under a child of the caller's token.
    ///
    /// At most one watchdog is live per instance: a previous one still in
    /// the slot is cancelled and awaited to full stop before the new task
    /// is installed.
    async fn start_watchdog(&self, cancel: &CancellationToken) {
        if !self.opts.watchdog {
            return;
        }
        let mut slot = self.watchdog.lock().await;
        if let Some(prev) = slot.take() {
            prev.cancel.cancel();
            let _ = prev.task.await;
        }
        let child = cancel.child_token();
        let task = tokio::spawn(run_watchdog(
            self.store.clone(),
            self.lock_key(),
            self.token.clone(),
            child.clone(),
        ));
        *slot = Some(Watchdog {
            cancel: child,
            task,
        });
    }

    /// Stop the renewal watchdog, if one is running, and wait for it to
    /// fully exit so a future start can install a fresh one.
    pub async fn stop_watchdog(&self) {
        let mut slot = self.watchdog.lock().await;
        if let Some(dog) = slot.take() {
            dog.cancel.cancel();
            let _ = dog.task.await;
        }
    }
}

async fn refresh_lease(
    store: &dyn StoreClient,
    lock_key: &str,
    token: &str,
    ttl: Duration,
) -> Result<()> {
    // The refresh script takes whole seconds; round a fractional TTL up so
    // the lease never comes back already expired.
    let mut ttl_seconds = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        ttl_seconds += 1;
    }
    let reply = store
        .run_script(
            AtomicScript::CheckAndRefresh,
            lock_key,
            &[token.to_string(), ttl_seconds.to_string()],
        )
        .await?;
    if reply == 1 { Ok(()) } else { Err(LockError::NotOwner) }
}

/// Periodic lease renewal. Each tick checks cancellation first, then
/// refreshes the TTL to period + margin. A failed renewal is logged and the
/// loop keeps running; only cancellation stops it.
async fn run_watchdog(
    store: Arc<dyn StoreClient>,
    lock_key: String,
    token: String,
    cancel: CancellationToken,
) {
    let ttl = WATCHDOG_PERIOD + WATCHDOG_TTL_MARGIN;
    let mut ticker = tokio::time::interval_at(Instant::now() + WATCHDOG_PERIOD, WATCHDOG_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if cancel.is_cancelled() {
            break;
        }
        if let Err(err) = refresh_lease(store.as_ref(), &lock_key, &token, ttl).await {
            warn!(key = %lock_key, error = %err, "lease renewal failed");
        }
    }
    debug!(key = %lock_key, "watchdog stopped");
}
