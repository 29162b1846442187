//! # Mesh Registry - Lease-Backed Device Directory
//!
//! The authoritative directory of currently-live devices per tenant.
//!
//! ## Liveness Model
//!
//! A device record exists if and only if its lease is valid. Registration
//! creates record and lease together; every accepted heartbeat renews the
//! lease; lease expiry — observed through the store's watch channel — is
//! the sole offline trigger. There is no disconnect message.
//!
//! ## State Machine (per device id)
//!
//! ```text
//! Unregistered → Registered(leased) → [heartbeat renews, stays Registered]
//!                                    → Expired → Unregistered
//! ```
//!
//! The transition to `Unregistered` is irreversible except via a fresh
//! `register`: a heartbeat on an expired lease returns `UnknownDevice`, so
//! a stale device can never silently reappear without fresh capability
//! data.
//!
//! ## Concurrency
//!
//! Register, heartbeat, status update, and expiry reconciliation for the
//! same device id are serialized through a per-device-id lock table; work
//! on distinct device ids proceeds fully in parallel. There is no global
//! registry lock, so throughput is independent of fleet size.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod locks;
pub mod reconciler;
pub mod registry;
pub mod service;

pub use config::RegistryConfig;
pub use registry::DeviceRegistry;
pub use service::RegistryService;
