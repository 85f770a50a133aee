//! Named detector parameters
//!
//! Detectors can be built from string-keyed values (a config file, a tuning
//! harness) instead of typed fields. Values still pass through [`Ratio`] and
//! [`Factor`] validation, and keys a detector does not know are rejected so a
//! typo never silently falls back to a default.
//!
//! ```rust
//! use std::collections::HashMap;
//! use candlewise::prelude::*;
//!
//! let mut params = HashMap::new();
//! params.insert("shadow_factor", 2.0);
//! let hammer = HammerDetector::with_params(&params).unwrap();
//! assert_eq!(hammer.shadow_factor.get(), 2.0);
//!
//! params.insert("shadow_factr", 2.0);
//! assert!(HammerDetector::with_params(&params).is_err());
//! ```

use std::collections::HashMap;

use crate::{Factor, PatternError, Ratio, Result};

/// Kind of value a parameter holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0
  Ratio,
  /// Non-negative multiplier, may exceed 1.0
  Factor,
}

/// One named threshold of a detector
#[derive(Debug, Clone)]
pub struct ParamMeta {
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(name: &'static str, default: f64, description: &'static str) -> Self {
    Self { name, param_type: ParamType::Ratio, default, description }
  }

  pub const fn factor(name: &'static str, default: f64, description: &'static str) -> Self {
    Self { name, param_type: ParamType::Factor, default, description }
  }
}

/// Detector constructible from named parameters
pub trait ParameterizedDetector: Sized {
  /// Parameters accepted by [`with_params`](Self::with_params)
  fn param_meta() -> &'static [ParamMeta];

  /// Build from `params`; absent keys take their defaults, unknown keys fail.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;
}

/// Reject any key not described by `meta`
pub fn check_keys(params: &HashMap<&str, f64>, meta: &[ParamMeta]) -> Result<()> {
  // Sorted so the error names the same key on every run
  let mut unknown: Vec<&str> =
    params.keys().copied().filter(|key| !meta.iter().any(|m| m.name == *key)).collect();
  unknown.sort_unstable();

  match unknown.first() {
    Some(key) => Err(PatternError::InvalidConfig(format!("unknown parameter `{key}`"))),
    None => Ok(()),
  }
}

pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  Ratio::new(params.get(key).copied().unwrap_or(default))
}

pub fn get_factor(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Factor> {
  Factor::new(params.get(key).copied().unwrap_or(default))
}

#[cfg(test)]
mod tests {
  use super::*;

  const META: &[ParamMeta] = &[
    ParamMeta::ratio("body_ratio", 0.4, "body limit"),
    ParamMeta::factor("shadow_factor", 1.5, "shadow multiple"),
  ];

  #[test]
  fn test_constructors_set_type() {
    assert_eq!(META[0].param_type, ParamType::Ratio);
    assert_eq!(META[1].param_type, ParamType::Factor);
    assert_eq!(META[1].default, 1.5);
  }

  #[test]
  fn test_check_keys_accepts_known_and_empty() {
    assert!(check_keys(&HashMap::new(), META).is_ok());

    let mut params = HashMap::new();
    params.insert("body_ratio", 0.3);
    params.insert("shadow_factor", 2.0);
    assert!(check_keys(&params, META).is_ok());
  }

  #[test]
  fn test_check_keys_names_first_unknown() {
    let mut params = HashMap::new();
    params.insert("body_ratio", 0.3);
    params.insert("zeta", 1.0);
    params.insert("alpha", 1.0);

    match check_keys(&params, META) {
      Err(PatternError::InvalidConfig(message)) => assert!(message.contains("`alpha`")),
      other => panic!("expected InvalidConfig, got {other:?}"),
    }
    assert!(check_keys(&params, &[]).is_err());
  }

  #[test]
  fn test_get_ratio_helper() {
    let mut params = HashMap::new();
    params.insert("key1", 0.8);

    assert_eq!(get_ratio(&params, "key1", 0.5).unwrap().get(), 0.8);
    assert_eq!(get_ratio(&params, "key2", 0.5).unwrap().get(), 0.5);
    params.insert("key3", 1.2);
    assert!(get_ratio(&params, "key3", 0.5).is_err());
  }

  #[test]
  fn test_get_factor_helper() {
    let mut params = HashMap::new();
    params.insert("key1", 2.5);

    assert_eq!(get_factor(&params, "key1", 1.5).unwrap().get(), 2.5);
    assert_eq!(get_factor(&params, "key2", 1.5).unwrap().get(), 1.5);
    params.insert("key3", -0.1);
    assert!(get_factor(&params, "key3", 1.5).is_err());
  }
}
