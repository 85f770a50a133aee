//! # candlewise - trend-conditioned candlestick pattern detection
//!
//! Classifies the newest bar of a short OHLC window into a handful of classic
//! candlestick patterns, using the direction of the preceding bars as context.
//!
//! ## Quick Start
//!
//! ```rust
//! use candlewise::prelude::*;
//!
//! struct Bar { o: f64, h: f64, l: f64, c: f64 }
//!
//! impl OHLCV for Bar {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//! }
//!
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .build()
//!     .unwrap();
//!
//! // Fewer than five bars: nothing to say
//! let bars: Vec<Bar> = vec![];
//! let patterns = engine.detect(&bars).unwrap();
//! assert!(patterns.is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, trace};

pub mod detectors;
pub mod history;
pub mod params;

pub mod prelude {
    pub use crate::{
        // Entry points
        classify_trend,
        detect_patterns,
        // Detectors
        detectors::*,
        // History ingestion
        history::{parse_history, Candle, HistoryRequest},
        // Parameters
        params::{get_factor, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Parallel
        scan_parallel,
        // Iterator
        BarPatterns,
        // Engine
        BuiltinDetector,
        Direction,
        EngineBuilder,
        EngineConfig,
        Factor,
        MajorityVote,
        OHLCVExt,
        PatternDetector,
        PatternEngine,
        // Errors
        PatternError,
        PatternIterator,
        PatternKind,
        PatternSet,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        Thresholds,
        Trend,
        TrendClassifier,
        Window,
        OHLCV,
        WINDOW_LEN,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during configuration, ingestion or validation.
///
/// Short windows are not an error: detection simply yields an empty
/// [`PatternSet`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Malformed price history: {0}")]
    MalformedHistory(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Non-negative multiplier, used where a threshold may exceed 1.0
/// (e.g. "shadow at least 1.5x the body").
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Factor(f64);

impl Factor {
    /// Create a new Factor, validating the value is finite and >= 0
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Factor cannot be NaN or infinite",
            ));
        }
        if value < 0.0 {
            return Err(PatternError::OutOfRange {
                field: "Factor",
                value,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Factor {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Factor {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Factor::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLC(V) data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    fn volume(&self) -> f64 {
        0.0
    }
}

impl<B: OHLCV + ?Sized> OHLCV for &B {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }
}

/// Extension trait with computed bar geometry
///
/// Shadows are measured from the body edge picked by the bar's color: a
/// bar that is not bullish (including `open == close`) measures its upper
/// shadow from the open and its lower shadow from the close.
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        if self.is_bullish() {
            self.high() - self.close()
        } else {
            self.high() - self.open()
        }
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        if self.is_bullish() {
            self.open() - self.low()
        } else {
            self.close() - self.low()
        }
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.open() > self.close()
    }

    /// Body as ratio of range. Returns None if range ≈ 0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    /// Validate bar consistency: finite prices and
    /// `low <= min(open, close) <= max(open, close) <= high`.
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.open().min(self.close()) < self.low() || self.open().max(self.close()) > self.high()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "body outside high-low range",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// PATTERN IDENTITY
// ============================================================

/// The patterns this crate recognizes.
///
/// Serialized in snake_case (`"shooting_star"`), which is also the key used
/// in a serialized [`PatternSet`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Doji,
    Hammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
}

impl PatternKind {
    pub const ALL: [PatternKind; 5] = [
        PatternKind::Doji,
        PatternKind::Hammer,
        PatternKind::ShootingStar,
        PatternKind::BullishEngulfing,
        PatternKind::BearishEngulfing,
    ];

    /// Returns the string identifier
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Doji => "doji",
            PatternKind::Hammer => "hammer",
            PatternKind::ShootingStar => "shooting_star",
            PatternKind::BullishEngulfing => "bullish_engulfing",
            PatternKind::BearishEngulfing => "bearish_engulfing",
        }
    }

    /// Human-readable name, e.g. "Shooting Star"
    pub fn label(&self) -> &'static str {
        match self {
            PatternKind::Doji => "Doji",
            PatternKind::Hammer => "Hammer",
            PatternKind::ShootingStar => "Shooting Star",
            PatternKind::BullishEngulfing => "Bullish Engulfing",
            PatternKind::BearishEngulfing => "Bearish Engulfing",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PatternKind::Doji => {
                "Open and close almost equal: the body is negligible against the range, signaling indecision."
            }
            PatternKind::Hammer => {
                "Bullish pattern hinting at a reversal after a downtrend: small body on top of a long lower shadow."
            }
            PatternKind::ShootingStar => {
                "Bearish pattern hinting at a reversal after an uptrend: small body below a long upper shadow."
            }
            PatternKind::BullishEngulfing => {
                "Strong bullish pattern: a bullish candle fully engulfs the body of the previous bearish candle."
            }
            PatternKind::BearishEngulfing => {
                "Strong bearish pattern: a bearish candle fully engulfs the body of the previous bullish candle."
            }
        }
    }

    /// Returns the typical/expected direction of this pattern.
    pub fn typical_direction(&self) -> Direction {
        match self {
            PatternKind::Doji => Direction::Neutral,
            PatternKind::Hammer | PatternKind::BullishEngulfing => Direction::Bullish,
            PatternKind::ShootingStar | PatternKind::BearishEngulfing => Direction::Bearish,
        }
    }

    pub fn is_typically_bullish(&self) -> bool {
        self.typical_direction().is_bullish()
    }

    pub fn is_typically_bearish(&self) -> bool {
        self.typical_direction().is_bearish()
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternKind {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        PatternKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PatternError::InvalidConfig(format!("unknown pattern '{s}'")))
    }
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

// ============================================================
// PATTERN SET - result of detection
// ============================================================

/// Pattern → detected flag for one window.
///
/// Empty when the window was too short to judge. Otherwise it holds one
/// entry per enabled detector; several entries may be `true` at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PatternSet(BTreeMap<PatternKind, bool>);

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: PatternKind, detected: bool) {
        self.0.insert(kind, detected);
    }

    /// `None` when the pattern was not evaluated
    #[inline]
    pub fn get(&self, kind: PatternKind) -> Option<bool> {
        self.0.get(&kind).copied()
    }

    #[inline]
    pub fn is_detected(&self, kind: PatternKind) -> bool {
        self.get(kind).unwrap_or(false)
    }

    /// True when no pattern was evaluated at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn any(&self) -> bool {
        self.0.values().any(|&detected| detected)
    }

    /// Patterns flagged as detected, in [`PatternKind`] order
    pub fn detected(&self) -> impl Iterator<Item = PatternKind> + '_ {
        self.0
            .iter()
            .filter(|&(_, &detected)| detected)
            .map(|(&kind, _)| kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatternKind, bool)> + '_ {
        self.0.iter().map(|(&kind, &detected)| (kind, detected))
    }
}

impl fmt::Display for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut detected = self.detected().peekable();
        if detected.peek().is_none() {
            return f.write_str("no significant candlestick pattern");
        }
        for (i, kind) in detected.enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(kind.label())?;
        }
        Ok(())
    }
}

// ============================================================
// WINDOW
// ============================================================

/// Number of bars a detection window spans: the newest bar plus the four
/// that set the trend.
pub const WINDOW_LEN: usize = 5;

/// Newest-first view over the [`WINDOW_LEN`] bars ending at some index.
///
/// Age 0 is the newest bar, age 1 the one before it, and so on. The view
/// borrows the caller's oldest-first slice; nothing is copied or reversed.
#[derive(Debug)]
pub struct Window<'a, T> {
    bars: &'a [T],
    start: usize,
}

impl<T> Clone for Window<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Window<'_, T> {}

impl<'a, T: OHLCV> Window<'a, T> {
    /// Window over the last [`WINDOW_LEN`] bars, `None` if there are fewer
    pub fn latest(bars: &'a [T]) -> Option<Self> {
        Self::ending_at(bars, bars.len().checked_sub(1)?)
    }

    /// Window whose newest bar is `bars[index]`
    pub fn ending_at(bars: &'a [T], index: usize) -> Option<Self> {
        if index >= bars.len() || index + 1 < WINDOW_LEN {
            return None;
        }
        let start = index + 1 - WINDOW_LEN;
        Some(Self {
            bars: &bars[start..=index],
            start,
        })
    }

    /// Offset of the oldest window bar in the original slice
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bar by age (0 = newest)
    #[inline]
    pub fn get(&self, age: usize) -> Option<&'a T> {
        let i = self.bars.len().checked_sub(age + 1)?;
        self.bars.get(i)
    }

    #[inline]
    pub fn current(&self) -> Option<&'a T> {
        self.get(0)
    }

    #[inline]
    pub fn previous(&self) -> Option<&'a T> {
        self.get(1)
    }

    /// The bars before the newest one, oldest first
    #[inline]
    pub fn preceding(&self) -> &'a [T] {
        &self.bars[..self.bars.len().saturating_sub(1)]
    }

    /// Bars newest first
    pub fn iter(&self) -> impl Iterator<Item = &'a T> {
        self.bars.iter().rev()
    }

    /// Bars oldest first, as supplied
    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.bars
    }
}

// ============================================================
// TREND CLASSIFICATION
// ============================================================

/// Coarse direction of the bars preceding a candidate pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Trend {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Trend::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Trend::Bearish)
    }

    /// Context in which a bullish reversal pattern is meaningful
    #[inline]
    pub fn permits_bullish_reversal(self) -> bool {
        matches!(self, Trend::Bearish | Trend::Neutral)
    }

    /// Context in which a bearish reversal pattern is meaningful
    #[inline]
    pub fn permits_bearish_reversal(self) -> bool {
        matches!(self, Trend::Bullish | Trend::Neutral)
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Neutral => "neutral",
        })
    }
}

/// Classifies the trend of the bars that precede the newest one
pub trait TrendClassifier: Send + Sync {
    fn classify<T: OHLCV>(&self, bars: &[T]) -> Trend;
}

/// Majority vote of bar colors.
///
/// Bullish bars (`close > open`) vote up, bearish bars (`open > close`) vote
/// down, flat bars abstain. Ties, including an empty slice, are neutral.
/// Order of the bars does not matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityVote;

impl TrendClassifier for MajorityVote {
    fn classify<T: OHLCV>(&self, bars: &[T]) -> Trend {
        let (bullish, bearish) = bars.iter().fold((0usize, 0usize), |(up, down), bar| {
            (
                up + usize::from(bar.is_bullish()),
                down + usize::from(bar.is_bearish()),
            )
        });

        match bullish.cmp(&bearish) {
            std::cmp::Ordering::Greater => Trend::Bullish,
            std::cmp::Ordering::Less => Trend::Bearish,
            std::cmp::Ordering::Equal => Trend::Neutral,
        }
    }
}

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

/// Pattern detector evaluated against a newest-first window
pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> PatternKind;
    fn detect<T: OHLCV>(&self, window: &Window<'_, T>, trend: Trend) -> bool;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - static dispatch via enum
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(&self, window: &Window<'_, T>, trend: Trend) -> bool {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, window, trend)),*
                }
            }

            #[inline]
            pub fn kind(&self) -> PatternKind {
                match self {
                    $(Self::$variant(d) => PatternDetector::kind(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Single bar
    Doji(DojiDetector),
    Hammer(HammerDetector),
    ShootingStar(ShootingStarDetector),

    // Two bar
    BullishEngulfing(BullishEngulfingDetector),
    BearishEngulfing(BearishEngulfingDetector),
}

impl BuiltinDetector {
    /// The five detectors, parameterized by `thresholds`
    pub fn all_from(thresholds: &Thresholds) -> [BuiltinDetector; 5] {
        [
            BuiltinDetector::Doji(DojiDetector::from_thresholds(thresholds)),
            BuiltinDetector::Hammer(HammerDetector::from_thresholds(thresholds)),
            BuiltinDetector::ShootingStar(ShootingStarDetector::from_thresholds(thresholds)),
            BuiltinDetector::BullishEngulfing(BullishEngulfingDetector::with_defaults()),
            BuiltinDetector::BearishEngulfing(BearishEngulfingDetector::with_defaults()),
        ]
    }

    /// Build the detector for `kind` from named parameters
    pub fn with_params(
        kind: PatternKind,
        params: &std::collections::HashMap<&str, f64>,
    ) -> Result<BuiltinDetector> {
        use crate::params::ParameterizedDetector;

        Ok(match kind {
            PatternKind::Doji => BuiltinDetector::Doji(DojiDetector::with_params(params)?),
            PatternKind::Hammer => BuiltinDetector::Hammer(HammerDetector::with_params(params)?),
            PatternKind::ShootingStar => {
                BuiltinDetector::ShootingStar(ShootingStarDetector::with_params(params)?)
            }
            PatternKind::BullishEngulfing => {
                BuiltinDetector::BullishEngulfing(BullishEngulfingDetector::with_params(params)?)
            }
            PatternKind::BearishEngulfing => {
                BuiltinDetector::BearishEngulfing(BearishEngulfingDetector::with_params(params)?)
            }
        })
    }
}

// ============================================================
// CONFIGURATION
// ============================================================

/// Classification boundaries shared by the single-bar detectors
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Doji: body <= range * doji_body_ratio
    pub doji_body_ratio: Ratio,
    /// Hammer / shooting star: long shadow >= body * shadow_body_factor
    pub shadow_body_factor: Factor,
    /// Hammer / shooting star: body <= range * small_body_ratio
    pub small_body_ratio: Ratio,
    /// Hammer / shooting star: opposite shadow <= body * opposite_shadow_ratio
    pub opposite_shadow_ratio: Ratio,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            doji_body_ratio: Ratio::new_const(detectors::helpers::DOJI_BODY_RATIO),
            shadow_body_factor: Factor::new_const(detectors::helpers::SHADOW_BODY_FACTOR),
            small_body_ratio: Ratio::new_const(detectors::helpers::SMALL_BODY_RATIO),
            opposite_shadow_ratio: Ratio::new_const(detectors::helpers::OPPOSITE_SHADOW_RATIO),
        }
    }
}

/// Engine configuration
///
/// Every field is optional when deserializing; the defaults reproduce the
/// stock detector set without input validation.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reject malformed bars in the detection window instead of classifying them
    pub validate_data: bool,
    /// Evaluate only these patterns
    pub pattern_filter: Option<Vec<PatternKind>>,
    /// Rebuild the stock detectors with these thresholds
    pub thresholds: Option<Thresholds>,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PatternError::InvalidConfig(e.to_string()))
    }
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Main pattern detection engine
pub struct PatternEngine<C: TrendClassifier = MajorityVote> {
    builtin: Vec<BuiltinDetector>,
    classifier: C,
    config: EngineConfig,
}

impl<C: TrendClassifier> PatternEngine<C> {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Trend of the bars preceding the newest one in `window`
    #[inline]
    pub fn trend_of<T: OHLCV>(&self, window: &Window<'_, T>) -> Trend {
        self.classifier.classify(window.preceding())
    }

    /// Detect patterns on the newest bar of `bars` (oldest first).
    ///
    /// Fewer than [`WINDOW_LEN`] bars yields an empty set. Errors only when
    /// data validation is enabled and a window bar is malformed.
    pub fn detect<T: OHLCV>(&self, bars: &[T]) -> Result<PatternSet> {
        let Some(window) = Window::latest(bars) else {
            debug!(
                "need {} bars for pattern detection, got {}",
                WINDOW_LEN,
                bars.len()
            );
            return Ok(PatternSet::new());
        };

        if self.config.validate_data {
            self.validate_window(&window)?;
        }

        let patterns = self.detect_window(&window);
        debug!("patterns at bar {}: {}", bars.len() - 1, patterns);
        Ok(patterns)
    }

    /// Evaluate every enabled detector against one window
    pub fn detect_window<T: OHLCV>(&self, window: &Window<'_, T>) -> PatternSet {
        self.detect_window_with_trend(window, self.trend_of(window))
    }

    /// Evaluate every enabled detector against a window whose trend is known
    pub fn detect_window_with_trend<T: OHLCV>(
        &self,
        window: &Window<'_, T>,
        trend: Trend,
    ) -> PatternSet {
        let mut patterns = PatternSet::new();

        for detector in &self.builtin {
            let kind = detector.kind();
            if self.should_include(kind) {
                patterns.insert(kind, detector.detect(window, trend));
            }
        }

        patterns
    }

    /// Detect at every bar, validating the whole input first if enabled.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<BarPatterns>> {
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }
        Ok(self.iter(bars).collect())
    }

    /// Iterate over bars, yielding the patterns of the window ending at each.
    pub fn iter<'a, T: OHLCV>(&'a self, bars: &'a [T]) -> PatternIterator<'a, T, C> {
        PatternIterator::new(self, bars)
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn should_include(&self, kind: PatternKind) -> bool {
        match self.config.pattern_filter {
            Some(ref filter) => filter.contains(&kind),
            None => true,
        }
    }

    fn validate_window<T: OHLCV>(&self, window: &Window<'_, T>) -> Result<()> {
        for (offset, bar) in window.as_slice().iter().enumerate() {
            bar.validate()
                .map_err(|e| reindex(e, window.start() + offset))?;
        }
        Ok(())
    }

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| reindex(e, i))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for d in &self.builtin {
            d.validate_config()?;
        }
        Ok(())
    }
}

fn reindex(error: PatternError, index: usize) -> PatternError {
    match error {
        PatternError::InvalidOHLCV { reason, .. } => PatternError::InvalidOHLCV { index, reason },
        other => other,
    }
}

// ============================================================
// PATTERN ITERATOR
// ============================================================

/// Patterns of the window ending at a specific bar
#[derive(Debug, Clone)]
pub struct BarPatterns {
    pub index: usize,
    /// Trend of the four preceding bars, `None` before a full window exists
    pub trend: Option<Trend>,
    pub patterns: PatternSet,
}

/// Iterator over bars with their patterns
pub struct PatternIterator<'a, T: OHLCV, C: TrendClassifier> {
    engine: &'a PatternEngine<C>,
    bars: &'a [T],
    current: usize,
}

impl<'a, T: OHLCV, C: TrendClassifier> PatternIterator<'a, T, C> {
    fn new(engine: &'a PatternEngine<C>, bars: &'a [T]) -> Self {
        Self {
            engine,
            bars,
            current: 0,
        }
    }
}

impl<'a, T: OHLCV, C: TrendClassifier> Iterator for PatternIterator<'a, T, C> {
    type Item = BarPatterns;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.bars.len() {
            return None;
        }

        let index = self.current;
        self.current += 1;

        let item = match Window::ending_at(self.bars, index) {
            Some(window) => {
                let trend = self.engine.trend_of(&window);
                BarPatterns {
                    index,
                    trend: Some(trend),
                    patterns: self.engine.detect_window_with_trend(&window, trend),
                }
            }
            None => BarPatterns {
                index,
                trend: None,
                patterns: PatternSet::new(),
            },
        };

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bars.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl<'a, T: OHLCV, C: TrendClassifier> ExactSizeIterator for PatternIterator<'a, T, C> {}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
pub struct EngineBuilder<C: TrendClassifier = MajorityVote> {
    classifier: C,
    builtin: Vec<BuiltinDetector>,
    config: EngineConfig,
}

impl Default for EngineBuilder<MajorityVote> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<MajorityVote> {
    pub fn new() -> Self {
        Self {
            classifier: MajorityVote,
            builtin: Vec::new(),
            config: EngineConfig::default(),
        }
    }
}

impl<C: TrendClassifier> EngineBuilder<C> {
    /// Change trend classifier
    pub fn trend_classifier<C2: TrendClassifier>(self, classifier: C2) -> EngineBuilder<C2> {
        EngineBuilder {
            classifier,
            builtin: self.builtin,
            config: self.config,
        }
    }

    /// Add all builtin patterns with default thresholds
    pub fn with_all_defaults(self) -> Self {
        self.with_thresholds(Thresholds::default())
    }

    /// Replace the detector set with the five builtins using `thresholds`.
    ///
    /// Detectors added earlier through [`add`](Self::add) or
    /// [`add_checked`](Self::add_checked) are discarded; call `add` afterwards
    /// to extend the stock set.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.builtin = BuiltinDetector::all_from(&thresholds).to_vec();
        self.config.thresholds = Some(thresholds);
        self
    }

    /// Apply a loaded configuration.
    ///
    /// `thresholds` rebuilds the stock detectors. Without it, an empty builder
    /// gets the stock detectors at their defaults and detectors added earlier
    /// are kept.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        match config.thresholds {
            Some(thresholds) => self = self.with_thresholds(thresholds),
            None if self.builtin.is_empty() => self = self.with_all_defaults(),
            None => {}
        }
        self.config.validate_data = config.validate_data;
        self.config.pattern_filter = config.pattern_filter;
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Filter to specific patterns only
    pub fn only_patterns(mut self, kinds: impl IntoIterator<Item = PatternKind>) -> Self {
        self.config.pattern_filter = Some(kinds.into_iter().collect());
        self
    }

    /// Build the engine; fails when no detector was added
    pub fn build(self) -> Result<PatternEngine<C>> {
        if self.builtin.is_empty() {
            return Err(PatternError::InvalidConfig(
                "engine has no detectors".to_string(),
            ));
        }
        let engine = PatternEngine {
            builtin: self.builtin,
            classifier: self.classifier,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: PatternSet,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Detect patterns on the latest bar of several instruments in parallel
pub fn scan_parallel<'a, T, I, C>(
    engine: &PatternEngine<C>,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    C: TrendClassifier,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            trace!("scanning {} ({} bars)", symbol, bars.len());
            engine
                .detect(bars)
                .map(|patterns| ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// CONVENIENCE
// ============================================================

/// Default engine with the majority-vote trend classifier
pub type DefaultEngine = PatternEngine<MajorityVote>;

impl Default for DefaultEngine {
    fn default() -> Self {
        Self {
            builtin: BuiltinDetector::all_from(&Thresholds::default()).to_vec(),
            classifier: MajorityVote,
            config: EngineConfig::default(),
        }
    }
}

/// Majority-vote trend of `bars`; order does not matter, empty is neutral.
pub fn classify_trend<T: OHLCV>(bars: &[T]) -> Trend {
    MajorityVote.classify(bars)
}

/// Detect the five stock patterns on the newest of `bars` (oldest first).
///
/// Returns an empty set for fewer than [`WINDOW_LEN`] bars. Never fails:
/// malformed bars are classified as-is.
pub fn detect_patterns<T: OHLCV>(bars: &[T]) -> PatternSet {
    let engine = DefaultEngine::default();
    match Window::latest(bars) {
        Some(window) => engine.detect_window(&window),
        None => PatternSet::new(),
    }
}

// ============================================================
// TESTS
// ============================================================
