//! Ability Estimation
//!
//! Tracks a single ability estimate θ on the same scale as item difficulty,
//! together with an uncertainty that shrinks with every response.
//!
//! Response model: P(correct) = 1 / (1 + exp(d - θ))
//!
//! The update is a heuristic binary search rather than a calibrated IRT
//! estimator. With gap = d - θ and jump = 0.5 + uncertainty * 0.5:
//!
//! | response  | gap      | new θ                         |
//! |-----------|----------|-------------------------------|
//! | correct   | > 0      | θ + gap * jump                |
//! | correct   | <= 0     | θ + step * uncertainty        |
//! | incorrect | < 0      | θ + gap * jump                |
//! | incorrect | >= 0     | d - margin                    |
//!
//! Large corrective jumps happen while uncertain, small refinements once
//! confident.

use crate::config::AbilityParams;
use crate::sanitize::{clamp_finite, clamp_scale, clamp_unit};
use crate::types::LearnerState;

/// Probability that a learner at `theta` answers an item of `difficulty`.
pub fn probability_correct(theta: f64, difficulty: f64) -> f64 {
    1.0 / (1.0 + (difficulty - theta).exp())
}

/// Fisher-information style score used to rank probe items.
pub fn information_gain(theta: f64, uncertainty: f64, difficulty: f64) -> f64 {
    let p = probability_correct(theta, difficulty);
    uncertainty * p * (1.0 - p)
}

pub fn apply_response(
    learner: &LearnerState,
    item_difficulty: f64,
    correct: bool,
    params: &AbilityParams,
) -> LearnerState {
    let theta = clamp_scale(learner.theta);
    let uncertainty = clamp_uncertainty(learner.uncertainty, params);
    let difficulty = clamp_scale(item_difficulty);

    let gap = difficulty - theta;
    let jump_factor = 0.5 + uncertainty * 0.5;

    let next_theta = match (correct, gap) {
        (true, gap) if gap > 0.0 => theta + gap * jump_factor,
        (true, _) => theta + params.confirmation_step * uncertainty,
        (false, gap) if gap < 0.0 => theta + gap * jump_factor,
        (false, _) => difficulty - params.miss_margin,
    };

    let decay_rate = if gap.abs() < params.informative_gap {
        params.uncertainty_decay
    } else {
        params.uncertainty_decay * params.uninformative_slowdown
    };

    let observation = if correct { 1.0 } else { 0.0 };
    let accuracy = clamp_unit(learner.average_accuracy);

    LearnerState {
        theta: clamp_scale(next_theta),
        uncertainty: clamp_uncertainty(uncertainty * decay_rate, params),
        average_accuracy: clamp_unit(
            params.accuracy_alpha * observation + (1.0 - params.accuracy_alpha) * accuracy,
        ),
        ..learner.clone()
    }
}

/// Fresh learner at the configured starting level, fully uncertain.
pub fn initial_learner(now: i64, params: &AbilityParams) -> LearnerState {
    LearnerState {
        theta: clamp_scale(params.initial_theta),
        ..LearnerState::new(now)
    }
}

/// Calibration is over once uncertainty drops to `threshold` or below.
pub fn is_calibrating(learner: &LearnerState, threshold: f64) -> bool {
    learner.uncertainty > threshold
}

fn clamp_uncertainty(uncertainty: f64, params: &AbilityParams) -> f64 {
    // NaN.min(1.0) is 1.0, so a broken floor pins uncertainty at 1
    clamp_finite(uncertainty, params.min_uncertainty.min(1.0), 1.0, 1.0)
}
