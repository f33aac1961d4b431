//! Confidence scoring for reported positions.

use crate::types::PositionSource;

/// Score how trustworthy a reported position is.
///
/// Starts at 100 and applies fixed penalties: 30 for an array-index
/// fallback, 50 for an unknown source, 5 per detected SERP feature capped
/// at 20, 10 for a thin organic set (< 10 entries), and 5 per warning
/// capped at 15. The result is clamped to 0..=100. Callers set the score
/// to 0 outright when the domain was not found.
pub fn score(
    source: PositionSource,
    feature_count: usize,
    organic_count: usize,
    warning_count: usize,
) -> u8 {
    let mut confidence: i32 = 100;

    confidence -= match source {
        PositionSource::ProviderField | PositionSource::CrossVerified => 0,
        PositionSource::ArrayIndexFallback => 30,
        PositionSource::Unknown => 50,
    };

    confidence -= (5 * feature_count as i32).min(20);

    if organic_count < 10 {
        confidence -= 10;
    }

    confidence -= (5 * warning_count as i32).min(15);

    confidence.clamp(0, 100) as u8
}
