//! # Mesh Lease - TTL-Backed Liveness Claims
//!
//! The lease store is the single source of truth for device liveness: a
//! device record exists in the registry if and only if its lease is
//! currently valid, and lease expiry is the sole offline-detection signal —
//! there is no explicit disconnect message anywhere in the protocol.
//!
//! This crate specifies the store at its interface boundary
//! ([`LeaseStore`]): create-with-TTL, renew, get, update-value,
//! delete, list, and watch-for-expiry. The in-memory implementation
//! ([`InMemoryLeaseStore`]) serves single-node operation; a deployment
//! against etcd or NATS KV would implement the same trait.
//!
//! ## Invariants
//!
//! - Renewal is idempotent and monotonic: renewing an already-valid lease
//!   never shortens its remaining life below the TTL from the renewal
//!   instant.
//! - Every lease carries a generation id; expiry notifications name the
//!   generation so downstream consumers can dedup duplicates.
//! - An unavailable store fails operations with
//!   [`LeaseError::Unavailable`] instead of lying about liveness.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod memory;
pub mod store;

pub use memory::InMemoryLeaseStore;
pub use store::{LeaseError, LeaseExpiry, LeaseKey, LeaseStore};
