//! # Mesh Discovery - Filtered Device Lookup
//!
//! Read-side companion to the registry: answers "which devices of this
//! kind are online right now" without touching the lease store on every
//! query.
//!
//! ## Read Path
//!
//! Queries hit a per-tenant snapshot cache with a configurable staleness
//! bound; a snapshot past the bound is refetched from the registry, and
//! callers that need registration-fresh answers set `bypass_cache` on the
//! query. Filters (`device_type`, `location`) are case-insensitive
//! substring matches, and an empty result is a normal answer, not an
//! error.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod cache;
pub mod service;

pub use cache::SnapshotCache;
pub use service::{DiscoveryConfig, DiscoveryService};
