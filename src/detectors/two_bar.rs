//! Two-bar candlestick pattern detectors
//!
//! Bullish and bearish engulfing: the newest body covers the previous body
//! of the opposite color. Body edges may coincide.

use std::collections::HashMap;

use super::helpers::body_engulfs;
use crate::params::{check_keys, ParamMeta, ParameterizedDetector};
use crate::{OHLCVExt, PatternDetector, PatternKind, Result, Trend, Window, OHLCV};

impl_with_defaults!(BullishEngulfingDetector, BearishEngulfingDetector);

// ============================================================
// ENGULFING PATTERNS
// ============================================================

/// Bullish Engulfing: bullish bar whose body contains the previous bearish
/// body, after a bearish or neutral run
#[derive(Debug, Clone, Copy, Default)]
pub struct BullishEngulfingDetector;

impl PatternDetector for BullishEngulfingDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::BullishEngulfing
    }

    fn detect<T: OHLCV>(&self, window: &Window<'_, T>, trend: Trend) -> bool {
        if !trend.permits_bullish_reversal() {
            return false;
        }
        let (Some(curr), Some(prev)) = (window.current(), window.previous()) else {
            return false;
        };

        curr.is_bullish()
            && prev.is_bearish()
            && body_engulfs(curr.open(), curr.close(), prev.close(), prev.open())
    }
}

/// Bearish Engulfing: bearish bar whose body contains the previous bullish
/// body, after a bullish or neutral run
#[derive(Debug, Clone, Copy, Default)]
pub struct BearishEngulfingDetector;

impl PatternDetector for BearishEngulfingDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::BearishEngulfing
    }

    fn detect<T: OHLCV>(&self, window: &Window<'_, T>, trend: Trend) -> bool {
        if !trend.permits_bearish_reversal() {
            return false;
        }
        let (Some(curr), Some(prev)) = (window.current(), window.previous()) else {
            return false;
        };

        curr.is_bearish()
            && prev.is_bullish()
            && body_engulfs(curr.close(), curr.open(), prev.open(), prev.close())
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

impl ParameterizedDetector for BullishEngulfingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        &[]
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_keys(params, Self::param_meta())?;
        Ok(Self)
    }
}

impl ParameterizedDetector for BearishEngulfingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        &[]
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_keys(params, Self::param_meta())?;
        Ok(Self)
    }
}
