//! Closed-form quality scoring over an attempt history.

use quill_core::Attempt;

/// Scores a finished attempt history on a 1-10 scale.
///
/// Starts at 10, subtracts one per attempt beyond the first and two per
/// failed validation signal on the final attempt, clamped to [1, 10].
#[must_use]
pub fn score(attempts: &[Attempt]) -> u8 {
    let extra_attempts = attempts.len().saturating_sub(1) as i64;
    let failed_on_final = attempts.last().map_or(0, |attempt| {
        attempt.signals.iter().filter(|signal| !signal.passed).count()
    }) as i64;

    (10 - extra_attempts - 2 * failed_on_final).clamp(1, 10) as u8
}
