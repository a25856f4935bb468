//! Cheap static syntax check used as the "lint" validation signal.
//!
//! Only brace-delimited languages get a real check; for anything else the
//! signal passes by default and real validation is deferred to execution.

use quill_core::ValidationSignal;

/// Languages with a meaningful delimiter-balance check.
const BRACE_LANGUAGES: &[&str] = &[
    "rust",
    "javascript",
    "typescript",
    "java",
    "go",
    "c",
    "c++",
    "c#",
];

/// Runs the lint check for the given code and language.
#[must_use]
pub fn check(code: &str, language: &str) -> ValidationSignal {
    let language_lower = language.to_lowercase();
    if !BRACE_LANGUAGES.contains(&language_lower.as_str()) {
        return ValidationSignal::new(
            "lint",
            true,
            format!("no static check for {language}; deferred to execution"),
        );
    }

    let mut issues = Vec::new();

    if code.matches('{').count() != code.matches('}').count() {
        issues.push("mismatched braces");
    }
    if code.matches('(').count() != code.matches(')').count() {
        issues.push("mismatched parentheses");
    }
    if code.matches('[').count() != code.matches(']').count() {
        issues.push("mismatched brackets");
    }

    if issues.is_empty() {
        ValidationSignal::new("lint", true, "delimiter balance check passed")
    } else {
        ValidationSignal::new("lint", false, issues.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_code_passes() {
        let signal = check("fn main() { println!(\"hi\"); }", "rust");
        assert!(signal.passed);
    }

    #[test]
    fn test_unbalanced_braces_fail() {
        let signal = check("fn main() {", "rust");
        assert!(!signal.passed);
        assert!(signal.message.contains("mismatched braces"));
    }

    #[test]
    fn test_unknown_language_passes_by_default() {
        let signal = check("def broken(:", "python");
        assert!(signal.passed);
        assert!(signal.message.contains("deferred"));
    }

    #[test]
    fn test_language_match_is_case_insensitive() {
        let signal = check("function f() {", "TypeScript");
        assert!(!signal.passed);
    }
}
