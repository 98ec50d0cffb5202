//! Generation parameters, range limits, and seed resolution.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits and defaults
// ---------------------------------------------------------------------------

/// Fewest sampler steps accepted (the 4-step Lightning LoRA).
pub const MIN_STEPS: u32 = 4;
/// Most sampler steps accepted (the 8-step Lightning LoRA).
pub const MAX_STEPS: u32 = 8;
pub const DEFAULT_STEPS: u32 = 8;

pub const MIN_CFG_SCALE: f64 = 1.0;
pub const MAX_CFG_SCALE: f64 = 5.0;
pub const DEFAULT_CFG_SCALE: f64 = 3.0;

/// Largest seed the sampler accepts: seeds live in `[0, 2^63)`.
pub const MAX_SEED: u64 = i64::MAX as u64;

/// Default filename prefix for saved artifacts.
pub const DEFAULT_OUTPUT_PREFIX: &str = "qwen";

// ---------------------------------------------------------------------------
// Seeds
// ---------------------------------------------------------------------------

/// A caller-supplied seed, either a JSON integer or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedInput {
    Number(u64),
    Text(String),
}

impl SeedInput {
    /// Resolve to a concrete sampler seed.
    ///
    /// Numeric strings are parsed as-is (no trimming). Anything else, or a
    /// value outside `[0, 2^63)`, is an [`CoreError::InvalidParameter`].
    pub fn resolve(&self) -> Result<u64, CoreError> {
        let value = match self {
            SeedInput::Number(n) => *n,
            SeedInput::Text(s) => {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(CoreError::InvalidParameter(format!(
                        "seed must be a numeric string, got '{s}'"
                    )));
                }
                s.parse::<u64>().map_err(|_| {
                    CoreError::InvalidParameter(format!("seed '{s}' is out of range"))
                })?
            }
        };
        if value > MAX_SEED {
            return Err(CoreError::InvalidParameter(format!(
                "seed must be between 0 and {MAX_SEED}, got {value}"
            )));
        }
        Ok(value)
    }

    /// Treat an empty string the same as an omitted seed.
    pub fn normalize(seed: Option<SeedInput>) -> Option<SeedInput> {
        match seed {
            Some(SeedInput::Text(s)) if s.is_empty() => None,
            other => other,
        }
    }
}

/// Draw a fresh random seed in `[0, 2^63)`.
pub fn random_seed() -> u64 {
    rand::rng().random_range(0..=MAX_SEED)
}

/// Use the provided seed if there is one, otherwise draw a random one.
pub fn resolve_seed(seed: Option<&SeedInput>) -> Result<u64, CoreError> {
    match seed {
        Some(s) => s.resolve(),
        None => Ok(random_seed()),
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Concrete inputs for one generation job.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParameters {
    /// Engine-side reference to the uploaded source image.
    pub input_image_ref: String,
    /// Positive prompt text (the perspective description).
    pub prompt: String,
    pub steps: u32,
    pub cfg_scale: f64,
    /// `None` means "pick a random seed".
    pub seed: Option<SeedInput>,
    /// Filename prefix for the saved artifact.
    pub output_prefix: String,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate that `steps` is within `[MIN_STEPS, MAX_STEPS]`.
pub fn validate_steps(steps: i64) -> Result<u32, CoreError> {
    if steps < MIN_STEPS as i64 || steps > MAX_STEPS as i64 {
        return Err(CoreError::InvalidParameter(format!(
            "steps must be an integer between {MIN_STEPS} and {MAX_STEPS}, got {steps}"
        )));
    }
    Ok(steps as u32)
}

/// Validate that `cfg_scale` is a finite number within `[MIN_CFG_SCALE, MAX_CFG_SCALE]`.
pub fn validate_cfg_scale(cfg_scale: f64) -> Result<f64, CoreError> {
    if !cfg_scale.is_finite() || !(MIN_CFG_SCALE..=MAX_CFG_SCALE).contains(&cfg_scale) {
        return Err(CoreError::InvalidParameter(format!(
            "cfg_scale must be a number between {MIN_CFG_SCALE:.1} and {MAX_CFG_SCALE:.1}, got {cfg_scale}"
        )));
    }
    Ok(cfg_scale)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // -- Seeds --

    #[test]
    fn numeric_string_seed_parses_exactly() {
        assert_eq!(SeedInput::Text("12345".into()).resolve().unwrap(), 12345);
    }

    #[test]
    fn integer_seed_is_used_as_is() {
        assert_eq!(SeedInput::Number(0).resolve().unwrap(), 0);
        assert_eq!(SeedInput::Number(MAX_SEED).resolve().unwrap(), MAX_SEED);
    }

    #[test]
    fn non_numeric_seed_is_invalid_parameter() {
        assert_matches!(
            SeedInput::Text("abc".into()).resolve(),
            Err(CoreError::InvalidParameter(msg)) if msg.contains("seed")
        );
        assert_matches!(
            SeedInput::Text(" 42".into()).resolve(),
            Err(CoreError::InvalidParameter(_))
        );
        assert_matches!(
            SeedInput::Text("-1".into()).resolve(),
            Err(CoreError::InvalidParameter(_))
        );
    }

    #[test]
    fn seed_at_or_above_two_pow_63_is_rejected() {
        assert_matches!(
            SeedInput::Number(MAX_SEED + 1).resolve(),
            Err(CoreError::InvalidParameter(_))
        );
        assert_matches!(
            SeedInput::Text("99999999999999999999999".into()).resolve(),
            Err(CoreError::InvalidParameter(_))
        );
    }

    #[test]
    fn empty_seed_normalizes_to_none() {
        assert_eq!(SeedInput::normalize(Some(SeedInput::Text(String::new()))), None);
        assert_eq!(
            SeedInput::normalize(Some(SeedInput::Text("7".into()))),
            Some(SeedInput::Text("7".into()))
        );
    }

    #[test]
    fn seed_deserializes_from_string_or_number() {
        let s: SeedInput = serde_json::from_str(r#""12345""#).unwrap();
        assert_eq!(s, SeedInput::Text("12345".into()));
        let n: SeedInput = serde_json::from_str("12345").unwrap();
        assert_eq!(n, SeedInput::Number(12345));
    }

    #[test]
    fn random_seeds_stay_below_two_pow_63() {
        for _ in 0..1_000 {
            assert!(random_seed() <= MAX_SEED);
        }
    }

    #[test]
    fn resolve_seed_falls_back_to_random() {
        assert!(resolve_seed(None).unwrap() <= MAX_SEED);
        assert_eq!(resolve_seed(Some(&SeedInput::Number(9))).unwrap(), 9);
    }

    // -- Ranges --

    #[test]
    fn steps_range_is_inclusive() {
        assert_eq!(validate_steps(4).unwrap(), 4);
        assert_eq!(validate_steps(8).unwrap(), 8);
    }

    #[test]
    fn steps_outside_range_mention_steps() {
        for steps in [0, 3, 9, 10, -1] {
            assert_matches!(
                validate_steps(steps),
                Err(CoreError::InvalidParameter(msg)) if msg.contains("steps")
            );
        }
    }

    #[test]
    fn cfg_scale_range_is_inclusive() {
        assert_eq!(validate_cfg_scale(1.0).unwrap(), 1.0);
        assert_eq!(validate_cfg_scale(5.0).unwrap(), 5.0);
        assert_eq!(validate_cfg_scale(3.0).unwrap(), 3.0);
    }

    #[test]
    fn cfg_scale_outside_range_is_rejected() {
        for cfg in [0.99, 5.01, f64::NAN, f64::INFINITY] {
            assert_matches!(
                validate_cfg_scale(cfg),
                Err(CoreError::InvalidParameter(msg)) if msg.contains("cfg_scale")
            );
        }
    }
}
