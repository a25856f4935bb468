//! Unified diffs between consecutive refinement attempts.
//!
//! Diffs are computed on normalized line sequences: input is coerced to end
//! with a newline before diffing, and [`apply_patch`] reproduces the
//! normalized target exactly.

use similar::TextDiff;

/// Ensures the text ends with a newline so line diffs are stable.
#[must_use]
pub fn normalize(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_owned()
    } else {
        format!("{text}\n")
    }
}

/// Computes a unified diff from `previous` to `current`.
#[must_use]
pub fn unified_diff(previous: &str, current: &str) -> String {
    let previous = normalize(previous);
    let current = normalize(current);

    TextDiff::from_lines(&previous, &current)
        .unified_diff()
        .context_radius(3)
        .header("previous", "current")
        .to_string()
}

/// Applies a unified diff produced by [`unified_diff`] to `previous`.
///
/// Returns `None` when the patch does not fit the base text. On success the
/// result equals the normalized `current` the diff was computed from.
#[must_use]
pub fn apply_patch(previous: &str, patch: &str) -> Option<String> {
    let base = normalize(previous);
    let base_lines: Vec<&str> = base.lines().collect();

    let mut output: Vec<String> = Vec::new();
    let mut cursor = 0usize;

    for line in patch.lines() {
        if line.starts_with("---") || line.starts_with("+++") || line.starts_with('\\') {
            continue;
        }
        if let Some(header) = line.strip_prefix("@@") {
            let old_range = header.split_whitespace().next()?.strip_prefix('-')?;
            let (start, count) = parse_range(old_range)?;
            // A zero-length old range addresses the line the insertion
            // follows rather than a consumed line.
            let hunk_start = if count == 0 { start } else { start.checked_sub(1)? };
            if hunk_start < cursor || hunk_start > base_lines.len() {
                return None;
            }
            output.extend(base_lines[cursor..hunk_start].iter().map(|text| (*text).to_owned()));
            cursor = hunk_start;
        } else if let Some(added) = line.strip_prefix('+') {
            output.push(added.to_owned());
        } else if line.strip_prefix('-').is_some() {
            cursor += 1;
        } else if let Some(context) = line.strip_prefix(' ') {
            if base_lines.get(cursor).copied() != Some(context) {
                return None;
            }
            output.push(context.to_owned());
            cursor += 1;
        } else if line.is_empty() {
            // Some emitters strip the trailing space from blank context lines.
            if base_lines.get(cursor).copied() != Some("") {
                return None;
            }
            output.push(String::new());
            cursor += 1;
        }
    }

    if cursor > base_lines.len() {
        return None;
    }
    output.extend(base_lines[cursor..].iter().map(|text| (*text).to_owned()));

    if output.is_empty() {
        Some(String::new())
    } else {
        Some(format!("{}\n", output.join("\n")))
    }
}

/// Parses a unified-diff range like `3,4` or `3` into (start, count).
fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREVIOUS: &str = "fn main() {\n    println!(\"hello\");\n}\n";
    const CURRENT: &str = "fn main() {\n    println!(\"hello, world\");\n    println!(\"done\");\n}\n";

    #[test]
    fn test_diff_round_trip() {
        let patch = unified_diff(PREVIOUS, CURRENT);
        let applied = apply_patch(PREVIOUS, &patch).expect("patch should apply");
        assert_eq!(applied, CURRENT);
    }

    #[test]
    fn test_round_trip_with_missing_trailing_newline() {
        let previous = "a\nb";
        let current = "a\nc\nb";
        let patch = unified_diff(previous, current);
        let applied = apply_patch(previous, &patch).expect("patch should apply");
        assert_eq!(applied, normalize(current));
    }

    #[test]
    fn test_identical_inputs_produce_empty_diff() {
        let patch = unified_diff(PREVIOUS, PREVIOUS);
        // No hunks beyond the headers.
        assert!(!patch.contains("@@") || patch.trim().is_empty());
        let applied = apply_patch(PREVIOUS, &patch).expect("patch should apply");
        assert_eq!(applied, PREVIOUS);
    }

    #[test]
    fn test_round_trip_full_replacement() {
        let previous = "old line one\nold line two\n";
        let current = "completely different\n";
        let patch = unified_diff(previous, current);
        let applied = apply_patch(previous, &patch).expect("patch should apply");
        assert_eq!(applied, current);
    }

    #[test]
    fn test_mismatched_patch_rejected() {
        let patch = unified_diff(PREVIOUS, CURRENT);
        assert!(apply_patch("entirely unrelated text\n", &patch).is_none());
    }
}
