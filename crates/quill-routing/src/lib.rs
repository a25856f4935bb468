//! Complexity analysis and backend tier routing.
//!
//! Scores a natural-language task description and selects a generation
//! backend tier, with an explicit fallback chain for provider failures.
//! Both components are stateless: the same input always yields the same
//! analysis and routing decision.

/// Heuristic task complexity scoring.
pub mod complexity;
/// Tier selection from complexity and caller preference.
pub mod router;

pub use complexity::{ComplexityAnalysis, ComplexityAnalyzer, ComplexityTier};
pub use router::{BackendRouter, RoutePreference, RoutingDecision};
