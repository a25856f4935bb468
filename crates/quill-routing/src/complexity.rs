use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Domain keywords and the score each contributes.
const DOMAIN_KEYWORDS: &[(&str, u32)] = &[
    ("authentication", 2),
    ("authorization", 2),
    ("oauth", 2),
    ("database", 2),
    ("migration", 2),
    ("cryptography", 3),
    ("encryption", 3),
    ("concurrency", 2),
    ("concurrent", 2),
    ("async", 1),
    ("websocket", 2),
    ("streaming", 2),
    ("api integration", 1),
    ("pagination", 1),
    ("caching", 1),
    ("retry", 1),
    ("rate limit", 2),
    ("distributed", 3),
];

/// Size-indicator keywords mapped to estimated output lines.
const SIZE_INDICATORS: &[(&str, u32)] = &[
    ("one-liner", 5),
    ("simple", 20),
    ("small", 20),
    ("snippet", 20),
    ("script", 40),
    ("function", 30),
    ("class", 60),
    ("module", 60),
    ("service", 100),
    ("application", 100),
    ("microservice", 150),
    ("full stack", 150),
];

/// Structural keywords suggesting a multi-file deliverable.
const STRUCTURE_KEYWORDS: &[&str] = &["multiple files", "project", "package", "repository"];

/// Languages the analyzer can detect in a task description.
const KNOWN_LANGUAGES: &[&str] = &[
    "python",
    "rust",
    "javascript",
    "typescript",
    "go",
    "java",
    "c++",
    "sql",
    "bash",
];

/// Default estimated output size when no size indicator matches.
const DEFAULT_ESTIMATED_LINES: u32 = 30;

/// Score added when more than one target language is detected.
const MULTI_LANGUAGE_PENALTY: u32 = 3;

/// Complexity breakdown for one task description.
///
/// Recomputed per generation attempt and never persisted across attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    /// Total additive score
    pub score: u32,
    /// Tier derived from the score
    pub tier: ComplexityTier,
    /// Contributing signal name to the weight it added
    pub factors: BTreeMap<String, u32>,
    /// Target languages mentioned in the description
    pub detected_languages: BTreeSet<String>,
}

/// Task complexity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    /// Score below 3
    Simple,
    /// Score 3 through 6
    Medium,
    /// Score above 6
    Complex,
}

impl ComplexityTier {
    fn from_score(score: u32) -> Self {
        match score {
            0..=2 => Self::Simple,
            3..=6 => Self::Medium,
            _ => Self::Complex,
        }
    }
}

/// Scores task descriptions from fixed keyword tables.
///
/// Stateless and side-effect-free: the same description always yields the
/// same score and factor breakdown.
#[derive(Default)]
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    /// Analyzes a task description into a score, tier, and factor breakdown.
    #[must_use]
    pub fn analyze(&self, task: &str) -> ComplexityAnalysis {
        let task_lower = task.to_lowercase();
        let mut factors = BTreeMap::new();

        for (keyword, weight) in DOMAIN_KEYWORDS {
            if task_lower.contains(keyword) {
                factors.insert((*keyword).to_owned(), *weight);
            }
        }

        let estimated_lines = Self::estimate_output_lines(&task_lower);
        let size_weight = estimated_lines / 50;
        if size_weight > 0 {
            factors.insert("estimated_size".to_owned(), size_weight);
        }

        let file_count = Self::estimate_file_count(&task_lower);
        if file_count > 0 {
            factors.insert("file_count".to_owned(), file_count);
        }

        let detected_languages = Self::detect_languages(&task_lower);
        if detected_languages.len() > 1 {
            factors.insert("multi_language".to_owned(), MULTI_LANGUAGE_PENALTY);
        }

        let score = factors.values().sum();

        ComplexityAnalysis {
            score,
            tier: ComplexityTier::from_score(score),
            factors,
            detected_languages,
        }
    }

    fn estimate_output_lines(task: &str) -> u32 {
        SIZE_INDICATORS
            .iter()
            .filter(|(keyword, _)| task.contains(keyword))
            .map(|(_, lines)| *lines)
            .max()
            .unwrap_or(DEFAULT_ESTIMATED_LINES)
    }

    fn estimate_file_count(task: &str) -> u32 {
        STRUCTURE_KEYWORDS
            .iter()
            .filter(|keyword| task.contains(*keyword))
            .count() as u32
    }

    fn detect_languages(task: &str) -> BTreeSet<String> {
        KNOWN_LANGUAGES
            .iter()
            .filter(|language| task.contains(*language))
            .map(|language| (*language).to_owned())
            .collect()
    }
}
