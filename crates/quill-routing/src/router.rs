use serde::{Deserialize, Serialize};

use crate::complexity::{ComplexityAnalysis, ComplexityAnalyzer, ComplexityTier};
use quill_core::{BackendConfig, BackendTier};

/// Caller preference for the cost/quality trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePreference {
    /// Always the cheapest tier, regardless of complexity
    Fast,
    /// Tier selected from the computed complexity
    Balanced,
    /// Always the most capable tier, regardless of complexity
    Quality,
}

/// Outcome of one routing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Primary backend tier to try first
    pub tier: BackendTier,
    /// Configured model name for the primary tier
    pub model: String,
    /// Tiers to try if the primary backend call fails, in order
    pub fallback: Vec<BackendTier>,
    /// Complexity breakdown the decision was derived from
    pub analysis: ComplexityAnalysis,
    /// Human-readable explanation of the selection
    pub reasoning: String,
}

/// Selects a generation backend tier for a task.
///
/// Stateless and side-effect-free given its input string; routing the same
/// task with the same preference always yields the same decision.
#[derive(Default)]
pub struct BackendRouter {
    analyzer: ComplexityAnalyzer,
    backends: BackendConfig,
}

impl BackendRouter {
    /// Creates a router with the default complexity analyzer and backends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy routing against the given backend configuration.
    #[must_use]
    pub fn with_backends(mut self, backends: BackendConfig) -> Self {
        self.backends = backends;
        self
    }

    /// Configured model name for a tier.
    #[must_use]
    pub fn model_for(&self, tier: BackendTier) -> &str {
        match tier {
            BackendTier::Local => &self.backends.local_model,
            BackendTier::Remote => &self.backends.remote_model,
        }
    }

    /// Analyzes the task without making a routing decision.
    #[must_use]
    pub fn analyze(&self, task: &str) -> ComplexityAnalysis {
        self.analyzer.analyze(task)
    }

    /// Routes a task to a backend tier.
    #[must_use]
    pub fn route(&self, task: &str, preference: RoutePreference) -> RoutingDecision {
        let analysis = self.analyzer.analyze(task);

        let tier = match preference {
            RoutePreference::Fast => BackendTier::Local,
            RoutePreference::Quality => BackendTier::Remote,
            RoutePreference::Balanced => match analysis.tier {
                ComplexityTier::Simple => BackendTier::Local,
                ComplexityTier::Medium | ComplexityTier::Complex => BackendTier::Remote,
            },
        };

        let model = self.model_for(tier).to_owned();
        let reasoning = format!(
            "Selected {tier:?} ({model}) for {:?} task (score {}, preference {preference:?})",
            analysis.tier, analysis.score
        );

        tracing::info!(
            "Routing decision: {:?} ({}) | complexity: {:?} | score: {}",
            tier,
            model,
            analysis.tier,
            analysis.score
        );

        RoutingDecision {
            tier,
            model,
            fallback: vec![tier.fallback()],
            analysis,
            reasoning,
        }
    }
}
