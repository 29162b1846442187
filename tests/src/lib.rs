//! # Device-Mesh Test Suite
//!
//! Unified test crate for flows that cross crate boundaries: the
//! per-crate unit tests live next to their code, while everything here
//! exercises a fully wired node (bus + lease store + registry +
//! discovery + invocation + events).
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Shared fixtures
//! └── integration/
//!     ├── lifecycle.rs  # Lease lifecycle: register, heartbeat, expiry
//!     ├── discovery.rs  # Filtered queries and cache behavior
//!     ├── invocation.rs # Discover-then-invoke and ordered fallback
//!     ├── isolation.rs  # Tenant isolation at the transport seam
//!     └── events.rs     # Emission, batching, handler dispatch
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mesh-tests
//! cargo test -p mesh-tests integration::lifecycle
//! ```

#![allow(dead_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod integration;
pub mod support;
