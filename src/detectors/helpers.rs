//! Common helper functions for candlestick pattern detection
//!
//! Default classification boundaries and the comparisons built on them.
//! The boundaries are deliberately permissive so that limited or synthetic
//! histories still surface labels; detectors must use them unchanged unless
//! configured otherwise.
//!
//! Every comparison is inclusive and literal: no division, no epsilon, no
//! special case for zero-size bodies or ranges.

// ============================================================
// DEFAULT THRESHOLDS
// ============================================================

/// Doji: body <= range * DOJI_BODY_RATIO
pub const DOJI_BODY_RATIO: f64 = 0.1;
/// Hammer / shooting star: long shadow >= body * SHADOW_BODY_FACTOR
pub const SHADOW_BODY_FACTOR: f64 = 1.5;
/// Hammer / shooting star: body <= range * SMALL_BODY_RATIO
pub const SMALL_BODY_RATIO: f64 = 0.4;
/// Hammer / shooting star: opposite shadow <= body * OPPOSITE_SHADOW_RATIO
pub const OPPOSITE_SHADOW_RATIO: f64 = 0.3;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// Body negligible against the bar's range.
///
/// A flat bar (range 0) is a doji only when its body is 0 as well.
#[inline]
pub fn is_doji(body: f64, range: f64, ratio: f64) -> bool {
    body <= range * ratio
}

/// Body small relative to the full range
#[inline]
pub fn is_small_body(body: f64, range: f64, ratio: f64) -> bool {
    body <= range * ratio
}

/// Shadow at least `factor` times the body
#[inline]
pub fn is_long_shadow(shadow: f64, body: f64, factor: f64) -> bool {
    shadow >= body * factor
}

/// Shadow at most `ratio` times the body. With a zero body only a zero
/// shadow qualifies.
#[inline]
pub fn is_short_shadow(shadow: f64, body: f64, ratio: f64) -> bool {
    shadow <= body * ratio
}

/// Outer body `[outer_low, outer_high]` contains inner body
/// `[inner_low, inner_high]`, shared edges included.
#[inline]
pub fn body_engulfs(outer_low: f64, outer_high: f64, inner_low: f64, inner_high: f64) -> bool {
    outer_high >= inner_high && outer_low <= inner_low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doji_boundary() {
        assert!(is_doji(0.5, 10.0, DOJI_BODY_RATIO));
        assert!(is_doji(1.0, 10.0, DOJI_BODY_RATIO));
        assert!(!is_doji(11.0, 20.0, DOJI_BODY_RATIO));
    }

    #[test]
    fn test_doji_zero_range() {
        assert!(is_doji(0.0, 0.0, DOJI_BODY_RATIO));
        assert!(!is_doji(0.1, 0.0, DOJI_BODY_RATIO));
    }

    #[test]
    fn test_short_shadow_zero_body() {
        assert!(is_short_shadow(0.0, 0.0, OPPOSITE_SHADOW_RATIO));
        assert!(!is_short_shadow(0.01, 0.0, OPPOSITE_SHADOW_RATIO));
    }

    #[test]
    fn test_long_shadow() {
        assert!(is_long_shadow(3.0, 2.0, SHADOW_BODY_FACTOR));
        assert!(!is_long_shadow(2.9, 2.0, SHADOW_BODY_FACTOR));
        assert!(is_long_shadow(0.0, 0.0, SHADOW_BODY_FACTOR));
    }

    #[test]
    fn test_body_engulfs_inclusive() {
        assert!(body_engulfs(44.0, 51.0, 45.0, 50.0));
        assert!(body_engulfs(45.0, 50.0, 45.0, 50.0));
        assert!(!body_engulfs(45.5, 51.0, 45.0, 50.0));
        assert!(!body_engulfs(44.0, 49.5, 45.0, 50.0));
    }

    #[test]
    fn test_nan_never_matches() {
        assert!(!is_doji(f64::NAN, 10.0, DOJI_BODY_RATIO));
        assert!(!is_small_body(1.0, f64::NAN, SMALL_BODY_RATIO));
        assert!(!body_engulfs(f64::NAN, 51.0, 45.0, 50.0));
    }
}
