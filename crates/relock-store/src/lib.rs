//! Relock Store - backing-store capability for relock
//!
//! The lock protocol never talks to a concrete store directly. It consumes the
//! narrow [`StoreClient`] capability: an atomic conditional set with TTL, and
//! two atomic check-and-act scripts. Anything that can provide those two
//! primitives can back a lock.
//!
//! This crate provides:
//! - The [`StoreClient`] trait and its [`SetOutcome`] reply
//! - The two [`AtomicScript`] bodies the protocol relies on
//! - [`ClientOptions`] consumed by wire backends
//! - [`MemoryStore`], an in-process implementation for tests and
//!   single-process embedding

pub mod client;
pub mod memory;
pub mod script;

pub use client::{ClientOptions, SetOutcome, StoreClient};
pub use memory::MemoryStore;
pub use script::AtomicScript;
