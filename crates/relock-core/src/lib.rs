//! Relock Core - distributed mutual exclusion over remote key-value stores
//!
//! This crate provides:
//! - [`StoreLock`]: the acquire/renew/release protocol against one backing
//!   store, with optional blocking acquisition and a background renewal
//!   watchdog
//! - [`QuorumLock`]: majority-based mutual exclusion across three or more
//!   independent backing stores
//! - [`LockOptions`] / [`QuorumOptions`]: per-instance configuration with
//!   repaired defaults
//!
//! Correctness of mutual exclusion is carried entirely by the backing
//! store's atomic primitives; no in-process locking guards the
//! caller-visible operations.

pub mod lock;
pub mod options;
pub mod quorum;

pub use lock::StoreLock;
pub use options::{LockOptions, QuorumOptions};
pub use quorum::QuorumLock;

// Re-exports for convenience
pub use relock_common::{LockError, Result, owner_token};
pub use relock_store::{MemoryStore, SetOutcome, StoreClient};
pub use tokio_util::sync::CancellationToken;
