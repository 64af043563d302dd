//! Relock Common - shared types for the relock workspace
//!
//! This crate provides the pieces every other relock crate builds on:
//! - The lock and store error taxonomies
//! - The owner-token generator that identifies a lock holder

pub mod error;
pub mod token;

// Re-exports for convenience
pub use error::{LockError, Result, StoreError};
pub use token::owner_token;
