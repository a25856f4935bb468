//! The bounded generate/validate refinement loop.

/// Unified diffs between consecutive attempts.
pub mod diff;
mod engine;
/// Cheap static syntax checks.
pub mod lint;
/// Closed-form quality scoring over an attempt history.
pub mod quality;

pub use engine::{AttemptCallback, RefinementLoop, RefinementRequest};
