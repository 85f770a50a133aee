//! Single-bar candlestick pattern detectors
//!
//! Doji, Hammer and Shooting Star. All three judge only the newest bar; the
//! hammer family additionally requires a compatible preceding trend.

use std::collections::HashMap;

use super::helpers::{self, is_doji, is_long_shadow, is_short_shadow, is_small_body};
use crate::params::{check_keys, get_factor, get_ratio, ParamMeta, ParameterizedDetector};
use crate::{
    Factor, OHLCVExt, PatternDetector, PatternKind, Ratio, Result, Thresholds, Trend, Window,
    OHLCV,
};

impl_with_defaults!(DojiDetector, HammerDetector, ShootingStarDetector);

// ============================================================
// DOJI
// ============================================================

/// Doji: body at most `body_ratio` of the bar's range
#[derive(Debug, Clone, Copy)]
pub struct DojiDetector {
    pub body_ratio: Ratio,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            body_ratio: Ratio::new_const(helpers::DOJI_BODY_RATIO),
        }
    }
}

impl DojiDetector {
    pub fn from_thresholds(t: &Thresholds) -> Self {
        Self {
            body_ratio: t.doji_body_ratio,
        }
    }
}

impl PatternDetector for DojiDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Doji
    }

    fn detect<T: OHLCV>(&self, window: &Window<'_, T>, _trend: Trend) -> bool {
        let Some(bar) = window.current() else {
            return false;
        };
        is_doji(bar.body(), bar.range(), self.body_ratio.get())
    }

    fn validate_config(&self) -> Result<()> {
        Ratio::new(self.body_ratio.get())?;
        Ok(())
    }
}

// ============================================================
// HAMMER FAMILY
// ============================================================

/// Shared geometry of the hammer and the shooting star; they differ only in
/// which shadow must be long and which short.
#[derive(Debug, Clone, Copy)]
struct HammerShape {
    shadow_factor: Factor,
    body_ratio: Ratio,
    opposite_shadow_ratio: Ratio,
}

impl HammerShape {
    #[inline]
    fn matches(&self, body: f64, range: f64, long_shadow: f64, short_shadow: f64) -> bool {
        is_long_shadow(long_shadow, body, self.shadow_factor.get())
            && is_small_body(body, range, self.body_ratio.get())
            && is_short_shadow(short_shadow, body, self.opposite_shadow_ratio.get())
    }

    fn validate(&self) -> Result<()> {
        Factor::new(self.shadow_factor.get())?;
        Ratio::new(self.body_ratio.get())?;
        Ratio::new(self.opposite_shadow_ratio.get())?;
        Ok(())
    }
}

/// Hammer: small body near the top, long lower shadow, after a bearish or
/// neutral run
#[derive(Debug, Clone, Copy)]
pub struct HammerDetector {
    pub shadow_factor: Factor,
    pub body_ratio: Ratio,
    pub opposite_shadow_ratio: Ratio,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self::from_thresholds(&Thresholds::default())
    }
}

impl HammerDetector {
    pub fn from_thresholds(t: &Thresholds) -> Self {
        Self {
            shadow_factor: t.shadow_body_factor,
            body_ratio: t.small_body_ratio,
            opposite_shadow_ratio: t.opposite_shadow_ratio,
        }
    }

    fn shape(&self) -> HammerShape {
        HammerShape {
            shadow_factor: self.shadow_factor,
            body_ratio: self.body_ratio,
            opposite_shadow_ratio: self.opposite_shadow_ratio,
        }
    }
}

impl PatternDetector for HammerDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Hammer
    }

    fn detect<T: OHLCV>(&self, window: &Window<'_, T>, trend: Trend) -> bool {
        if !trend.permits_bullish_reversal() {
            return false;
        }
        let Some(bar) = window.current() else {
            return false;
        };
        self.shape().matches(
            bar.body(),
            bar.range(),
            bar.lower_shadow(),
            bar.upper_shadow(),
        )
    }

    fn validate_config(&self) -> Result<()> {
        self.shape().validate()
    }
}

/// Shooting Star: small body near the bottom, long upper shadow, after a
/// bullish or neutral run
#[derive(Debug, Clone, Copy)]
pub struct ShootingStarDetector {
    pub shadow_factor: Factor,
    pub body_ratio: Ratio,
    pub opposite_shadow_ratio: Ratio,
}

impl Default for ShootingStarDetector {
    fn default() -> Self {
        Self::from_thresholds(&Thresholds::default())
    }
}

impl ShootingStarDetector {
    pub fn from_thresholds(t: &Thresholds) -> Self {
        Self {
            shadow_factor: t.shadow_body_factor,
            body_ratio: t.small_body_ratio,
            opposite_shadow_ratio: t.opposite_shadow_ratio,
        }
    }

    fn shape(&self) -> HammerShape {
        HammerShape {
            shadow_factor: self.shadow_factor,
            body_ratio: self.body_ratio,
            opposite_shadow_ratio: self.opposite_shadow_ratio,
        }
    }
}

impl PatternDetector for ShootingStarDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::ShootingStar
    }

    fn detect<T: OHLCV>(&self, window: &Window<'_, T>, trend: Trend) -> bool {
        if !trend.permits_bearish_reversal() {
            return false;
        }
        let Some(bar) = window.current() else {
            return false;
        };
        self.shape().matches(
            bar.body(),
            bar.range(),
            bar.upper_shadow(),
            bar.lower_shadow(),
        )
    }

    fn validate_config(&self) -> Result<()> {
        self.shape().validate()
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static DOJI_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "body_ratio",
    helpers::DOJI_BODY_RATIO,
    "Maximum body as a fraction of the range",
)];

static HAMMER_FAMILY_PARAMS: &[ParamMeta] = &[
    ParamMeta::factor(
        "shadow_factor",
        helpers::SHADOW_BODY_FACTOR,
        "Minimum long shadow as a multiple of the body",
    ),
    ParamMeta::ratio(
        "body_ratio",
        helpers::SMALL_BODY_RATIO,
        "Maximum body as a fraction of the range",
    ),
    ParamMeta::ratio(
        "opposite_shadow_ratio",
        helpers::OPPOSITE_SHADOW_RATIO,
        "Maximum opposite shadow as a fraction of the body",
    ),
];

impl HammerShape {
    fn from_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_keys(params, HAMMER_FAMILY_PARAMS)?;
        Ok(Self {
            shadow_factor: get_factor(params, "shadow_factor", helpers::SHADOW_BODY_FACTOR)?,
            body_ratio: get_ratio(params, "body_ratio", helpers::SMALL_BODY_RATIO)?,
            opposite_shadow_ratio: get_ratio(
                params,
                "opposite_shadow_ratio",
                helpers::OPPOSITE_SHADOW_RATIO,
            )?,
        })
    }
}

impl ParameterizedDetector for DojiDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOJI_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_keys(params, DOJI_PARAMS)?;
        Ok(Self {
            body_ratio: get_ratio(params, "body_ratio", helpers::DOJI_BODY_RATIO)?,
        })
    }
}

impl ParameterizedDetector for HammerDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HAMMER_FAMILY_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        HammerShape::from_params(params).map(|shape| Self {
            shadow_factor: shape.shadow_factor,
            body_ratio: shape.body_ratio,
            opposite_shadow_ratio: shape.opposite_shadow_ratio,
        })
    }
}

impl ParameterizedDetector for ShootingStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HAMMER_FAMILY_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        HammerShape::from_params(params).map(|shape| Self {
            shadow_factor: shape.shadow_factor,
            body_ratio: shape.body_ratio,
            opposite_shadow_ratio: shape.opposite_shadow_ratio,
        })
    }
}
