//! Cross-crate integration flows over a fully wired node.

pub mod discovery;
pub mod events;
pub mod invocation;
pub mod isolation;
pub mod lifecycle;
