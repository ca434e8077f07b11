//! Data Sanitization
//!
//! Numerical stability utilities shared by the memory model and the ability
//! estimator. Every state update funnels its numbers through these so that
//! NaN/Inf inputs degrade to safe values instead of poisoning stored state.

use crate::types::{MAX_SCALE, MIN_SCALE};

/// True for NaN or ±Inf
pub fn is_invalid(x: f64) -> bool {
    x.is_nan() || x.is_infinite()
}

/// Clamp to `[min, max]`, replacing NaN/Inf with `fallback` first.
///
/// Total for any inputs: swapped bounds are reordered, NaN bounds are
/// ignored and an invalid fallback becomes the lower bound.
pub fn clamp_finite(x: f64, min: f64, max: f64, fallback: f64) -> f64 {
    let (lo, hi) = if min > max { (max, min) } else { (min, max) };
    let value = if !is_invalid(x) {
        x
    } else if !is_invalid(fallback) {
        fallback
    } else if lo.is_finite() {
        lo
    } else {
        0.0
    };
    // f64::max/min skip NaN operands, unlike f64::clamp which panics
    value.max(lo).min(hi)
}

/// Clamp an ability or difficulty onto the shared [-3, 3] scale.
pub fn clamp_scale(x: f64) -> f64 {
    clamp_finite(x, MIN_SCALE, MAX_SCALE, 0.0)
}

/// Clamp a probability-like value onto [0, 1].
pub fn clamp_unit(x: f64) -> f64 {
    clamp_finite(x, 0.0, 1.0, 0.0)
}
