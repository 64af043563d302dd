//! Store capability trait and per-client options

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use relock_common::StoreError;

use crate::script::AtomicScript;

/// Default number of command retries a wire backend performs.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Reply of a conditional set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key had no live value; the caller's value is now stored.
    Set,
    /// A live value already existed; nothing was written.
    AlreadyPresent,
}

/// Capability interface the lock protocol consumes.
///
/// Implementations must guarantee that both operations are atomic at the
/// store: `conditional_set` observes and writes in one step, and
/// `run_script` executes the whole check-and-act body without interleaving.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Set `key` to `value` with the given TTL only if no live value exists.
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<SetOutcome, StoreError>;

    /// Run one of the fixed check-and-act scripts against `key`.
    ///
    /// Returns the script's integer reply: 1 when the action was taken,
    /// 0 when the stored value was absent or did not match.
    async fn run_script(
        &self,
        script: AtomicScript,
        key: &str,
        args: &[String],
    ) -> Result<i64, StoreError>;
}

/// Configuration for a wire store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Maximum command retries inside the backend. Negative values are
    /// repaired to the default.
    pub max_retries: i32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ClientOptions {
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Repair out-of-range values.
    pub fn normalize(mut self) -> Self {
        if self.max_retries < 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        self
    }
}
