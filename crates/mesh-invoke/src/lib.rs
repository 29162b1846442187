//! # Mesh Invoke - Typed Command Dispatch
//!
//! Routes function invocations to devices over their command subjects and
//! serves them on the device side.
//!
//! ## Failure Taxonomy
//!
//! Every failed invocation is exactly one of: `UnknownDevice` (no live
//! lease, checked before dispatch), `DeviceError` (the device answered
//! and said no), `Timeout` (no answer within the deadline),
//! `AuthorizationDenied` (the transport refused the caller's credential),
//! or `BusClosed`. The router never retries on its own; retry policy
//! belongs to the caller, who can tell the cases apart.
//!
//! ## Ordered Fallback
//!
//! `invoke_with_fallback` walks a caller-supplied candidate list strictly
//! in order with at most one call in flight, returning the first success
//! together with the failures that preceded it, or every failure when the
//! list is exhausted.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod responder;
pub mod router;

pub use responder::{CommandHandler, CommandResponder};
pub use router::{FallbackExhausted, FallbackSuccess, InvocationRouter, InvokeConfig};
