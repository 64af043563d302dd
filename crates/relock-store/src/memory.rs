//! In-process store implementation
//!
//! Backs the lock protocol without a network: leases live in a concurrent map
//! with per-entry deadlines and are expired lazily on access. Used by the
//! test suites and for single-process embedding; the capability semantics
//! match what a wire backend provides.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

use relock_common::StoreError;

use crate::client::{SetOutcome, StoreClient};
use crate::script::AtomicScript;

#[derive(Debug, Clone)]
struct Lease {
    value: String,
    deadline: Instant,
}

/// In-process key-value store with TTL semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Lease>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current live value at `key`, if any. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(live) => {
                if live.get().deadline <= now {
                    live.remove();
                    None
                } else {
                    Some(live.get().value.clone())
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Remaining TTL of the live value at `key`, if any.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries.get(key).and_then(|lease| {
            if lease.deadline <= now {
                None
            } else {
                Some(lease.deadline - now)
            }
        })
    }

    fn check_args(script: AtomicScript, args: &[String]) -> Result<(), StoreError> {
        if args.len() != script.arity() {
            return Err(StoreError::InvalidArguments(format!(
                "{:?} expects {} args, got {}",
                script,
                script.arity(),
                args.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<SetOutcome, StoreError> {
        if key.is_empty() || value.is_empty() {
            return Err(StoreError::EmptyKeyOrValue);
        }
        let now = Instant::now();
        let lease = Lease {
            value: value.to_string(),
            deadline: now + ttl,
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut live) => {
                if live.get().deadline > now {
                    Ok(SetOutcome::AlreadyPresent)
                } else {
                    live.insert(lease);
                    Ok(SetOutcome::Set)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(lease);
                Ok(SetOutcome::Set)
            }
        }
    }

    async fn run_script(
        &self,
        script: AtomicScript,
        key: &str,
        args: &[String],
    ) -> Result<i64, StoreError> {
        Self::check_args(script, args)?;
        let now = Instant::now();
        match script {
            AtomicScript::CheckAndDelete => match self.entries.entry(key.to_string()) {
                Entry::Occupied(live) => {
                    if live.get().deadline <= now {
                        live.remove();
                        Ok(0)
                    } else if live.get().value == args[0] {
                        live.remove();
                        Ok(1)
                    } else {
                        Ok(0)
                    }
                }
                Entry::Vacant(_) => Ok(0),
            },
            AtomicScript::CheckAndRefresh => {
                let ttl_seconds: u64 = args[1].parse().map_err(|_| {
                    StoreError::InvalidArguments(format!("bad ttl argument: {}", args[1]))
                })?;
                match self.entries.entry(key.to_string()) {
                    Entry::Occupied(mut live) => {
                        if live.get().deadline <= now {
                            live.remove();
                            Ok(0)
                        } else if live.get().value == args[0] {
                            live.get_mut().deadline = now + Duration::from_secs(ttl_seconds);
                            Ok(1)
                        } else {
                            Ok(0)
                        }
                    }
                    Entry::Vacant(_) => Ok(0),
                }
            }
        }
    }
}
