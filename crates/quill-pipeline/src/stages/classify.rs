use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::stage::{Stage, CLASSIFY};
use quill_core::{IntentAnalysis, PrimaryIntent, RequestState, Result};

/// Keyword tables per intent category.
const INTENT_KEYWORDS: &[(PrimaryIntent, &[&str])] = &[
    (
        PrimaryIntent::CodeGeneration,
        &[
            "generate",
            "write code",
            "implement",
            "code for",
            "snippet",
            "sample code",
            "script",
            "function that",
            "build me",
        ],
    ),
    (
        PrimaryIntent::EndpointLookup,
        &[
            "endpoint",
            "route",
            "url",
            "which api",
            "api call",
            "request to",
            "path for",
        ],
    ),
    (
        PrimaryIntent::SchemaExplanation,
        &[
            "schema",
            "field",
            "payload",
            "response body",
            "data model",
            "structure of",
            "format of",
        ],
    ),
    (
        PrimaryIntent::Authentication,
        &[
            "auth",
            "token",
            "login",
            "credential",
            "api key",
            "oauth",
            "permission",
        ],
    ),
    (
        PrimaryIntent::DocumentationGap,
        &[
            "not documented",
            "undocumented",
            "missing docs",
            "no documentation",
            "docs are wrong",
            "documentation gap",
        ],
    ),
];

/// Confidence assigned when no keyword matches and the request falls back
/// to the general intent.
const NO_MATCH_CONFIDENCE: f64 = 0.4;

/// Deterministic local intent classifier.
///
/// Scores the request against fixed keyword tables; confidence grows with
/// hit density and is capped below 1.0. No model call is involved, so the
/// same query always classifies the same way.
#[derive(Default)]
pub struct ClassifyStage;

impl ClassifyStage {
    /// Classifies a query into an intent analysis.
    #[must_use]
    pub fn classify(query: &str) -> IntentAnalysis {
        let query_lower = query.to_lowercase();

        let mut best_intent = PrimaryIntent::General;
        let mut best_hits: Vec<&str> = Vec::new();

        for (intent, keywords) in INTENT_KEYWORDS {
            let hits: Vec<&str> = keywords
                .iter()
                .filter(|keyword| query_lower.contains(*keyword))
                .copied()
                .collect();
            if hits.len() > best_hits.len() {
                best_intent = *intent;
                best_hits = hits;
            }
        }

        let confidence = if best_hits.is_empty() {
            NO_MATCH_CONFIDENCE
        } else {
            (0.5 + 0.15 * best_hits.len() as f64).min(0.95)
        };

        let keywords: BTreeSet<String> =
            best_hits.iter().map(|keyword| (*keyword).to_owned()).collect();

        IntentAnalysis {
            primary_intent: best_intent,
            confidence,
            keywords,
            requires_code: best_intent == PrimaryIntent::CodeGeneration,
        }
    }
}

#[async_trait]
impl Stage for ClassifyStage {
    fn name(&self) -> &'static str {
        CLASSIFY
    }

    async fn run(&self, state: RequestState) -> Result<RequestState> {
        let analysis = Self::classify(&state.query);
        tracing::info!(
            "Classified intent: {:?} (confidence {:.2})",
            analysis.primary_intent,
            analysis.confidence
        );
        Ok(state.with_intent(analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ConfidenceLevel;

    #[test]
    fn test_code_generation_detected() {
        let analysis = ClassifyStage::classify("Generate a python script to upload files");
        assert_eq!(analysis.primary_intent, PrimaryIntent::CodeGeneration);
        assert!(analysis.requires_code);
        assert!(analysis.confidence >= 0.5);
    }

    #[test]
    fn test_authentication_detected() {
        let analysis = ClassifyStage::classify("How do I refresh an oauth token?");
        assert_eq!(analysis.primary_intent, PrimaryIntent::Authentication);
        assert!(!analysis.requires_code);
        assert!(analysis.keywords.contains("oauth"));
    }

    #[test]
    fn test_documentation_gap_detected() {
        let analysis = ClassifyStage::classify("The webhooks feature is not documented at all");
        assert_eq!(analysis.primary_intent, PrimaryIntent::DocumentationGap);
    }

    #[test]
    fn test_no_match_falls_back_to_general() {
        let analysis = ClassifyStage::classify("hello there");
        assert_eq!(analysis.primary_intent, PrimaryIntent::General);
        assert!((analysis.confidence - 0.4).abs() < f64::EPSILON);
        assert_eq!(analysis.confidence_level(), ConfidenceLevel::Low);
        assert!(analysis.keywords.is_empty());
    }

    #[test]
    fn test_more_hits_raise_confidence() {
        let single = ClassifyStage::classify("Which endpoint should I use?");
        let double = ClassifyStage::classify("Which endpoint and route should I use?");
        assert!(double.confidence > single.confidence);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let first = ClassifyStage::classify("Generate a snippet for pagination");
        let second = ClassifyStage::classify("Generate a snippet for pagination");
        assert_eq!(first.primary_intent, second.primary_intent);
        assert!((first.confidence - second.confidence).abs() < f64::EPSILON);
    }
}
