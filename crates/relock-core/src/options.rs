//! Lock and quorum configuration
//!
//! Every default is an explicit per-instance value carried in the options,
//! never process-wide state. Normalization mirrors the repair pass the
//! constructors run: unset values are replaced, and leaving the lease unset
//! is what arms the renewal watchdog.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Namespace prefix prepended to every lock key at the store.
pub const DEFAULT_KEY_PREFIX: &str = "relock:";

/// Lease substituted when the caller does not choose one.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

/// Wait budget substituted when blocking is enabled without one.
pub const DEFAULT_BLOCK_WAIT: Duration = Duration::from_secs(5);

/// Poll interval of a blocking acquire.
pub const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Period of the renewal watchdog.
pub const WATCHDOG_PERIOD: Duration = Duration::from_secs(10);

/// Safety margin added to the watchdog period when refreshing the TTL, so
/// the lease cannot expire between ticks under scheduling jitter.
pub const WATCHDOG_TTL_MARGIN: Duration = Duration::from_secs(5);

/// Per-node timeout substituted for a quorum that does not choose one.
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_millis(50);

/// Configuration of a single-store lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockOptions {
    /// Poll for the lock instead of failing fast on contention.
    pub blocking: bool,
    /// Maximum blocking wait. `None` with `blocking` set means the default.
    pub block_wait: Option<Duration>,
    /// Lease duration. `None` means the default lease with the watchdog
    /// auto-enabled.
    pub lease: Option<Duration>,
    /// Run the renewal watchdog while the lock is held.
    pub watchdog: bool,
    /// Namespace prefix for the stored key. `None` means the default.
    pub key_prefix: Option<String>,
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn with_block_wait(mut self, wait: Duration) -> Self {
        self.block_wait = Some(wait);
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn with_watchdog(mut self) -> Self {
        self.watchdog = true;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub(crate) fn resolve(self) -> ResolvedLockOptions {
        let mut watchdog = self.watchdog;
        let lease = match self.lease {
            Some(lease) if lease > Duration::ZERO => lease,
            // No explicit lease: substitute the default and arm the watchdog.
            _ => {
                watchdog = true;
                DEFAULT_LEASE
            }
        };
        let block_wait = match self.block_wait {
            Some(wait) if wait > Duration::ZERO => wait,
            _ => DEFAULT_BLOCK_WAIT,
        };
        ResolvedLockOptions {
            blocking: self.blocking,
            block_wait,
            lease,
            watchdog,
            key_prefix: self
                .key_prefix
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
        }
    }
}

/// Options after the repair pass; every field concrete.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedLockOptions {
    pub blocking: bool,
    pub block_wait: Duration,
    pub lease: Duration,
    pub watchdog: bool,
    pub key_prefix: String,
}

/// Configuration of a quorum lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuorumOptions {
    /// Budget within which a node's acquire must complete to count toward
    /// the majority. `None` means the default.
    pub per_node_timeout: Option<Duration>,
    /// Overall lease duration shared by every node. `None` means each node
    /// uses the default lease with its watchdog auto-enabled.
    pub lease: Option<Duration>,
    /// Namespace prefix shared by every node. `None` means the default.
    pub key_prefix: Option<String>,
}

impl QuorumOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_per_node_timeout(mut self, timeout: Duration) -> Self {
        self.per_node_timeout = Some(timeout);
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}
