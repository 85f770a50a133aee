//! Candlestick pattern detectors
//!
//! Every detector looks at a newest-first [`Window`](crate::Window) and the
//! trend of the bars that precede its newest bar.
//!
//! # Pattern Categories
//!
//! - **Single-bar (3)**: Doji, Hammer, Shooting Star
//! - **Two-bar (2)**: Bullish Engulfing, Bearish Engulfing

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod single_bar;
pub mod two_bar;

// Re-export all detectors for convenience
pub use helpers::*;
pub use single_bar::*;
pub use two_bar::*;
