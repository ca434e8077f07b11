//! Forgetting-Curve Memory Model
//!
//! A simplified spaced-repetition model of how well a learner currently
//! retains one item:
//!
//! - Retrievability: R(t) = exp(-t / S)
//!   - t: days since the item was last seen
//!   - S: stability in days
//! - Correct recall: S' = S * growth * (1 + (1 - R) * bonus)
//!   (harder recalls, i.e. lower R, earn larger gains)
//! - Failed recall: S' = S * decay
//!
//! Newly taught items also get a short queue of reinforcement timestamps
//! (1, 5 and 15 minutes by default), independent of the review cycle.
//!
//! Every function is pure and total: inputs are never mutated and
//! out-of-range numbers are clamped.

use rayon::prelude::*;

use crate::config::MemoryParams;
use crate::sanitize::{clamp_finite, clamp_scale, clamp_unit, is_invalid};
use crate::types::{ItemMemoryState, ItemStatus, LastResponse, MS_PER_DAY};

/// Modeled probability of recall at `now`.
///
/// Returns 0 for items never seen (`last_seen == 0`) or without positive
/// stability. Timestamps in the future count as zero elapsed time.
pub fn retrievability(last_seen: i64, stability: f64, now: i64) -> f64 {
    if last_seen == 0 || is_invalid(stability) || stability <= 0.0 {
        return 0.0;
    }
    let days_since = (now.saturating_sub(last_seen)).max(0) as f64 / MS_PER_DAY;
    clamp_unit((-days_since / stability).exp())
}

/// Update one item's state after a quiz response.
pub fn apply_response(
    state: &ItemMemoryState,
    correct: bool,
    now: i64,
    params: &MemoryParams,
) -> ItemMemoryState {
    let mut updated = state.clone();
    updated.last_seen = now;
    updated.exposure_count = state.exposure_count.saturating_add(1);

    let base_stability = if state.stability > 0.0 && !is_invalid(state.stability) {
        state.stability
    } else {
        params.initial_stability
    };
    let base_difficulty = clamp_scale(state.difficulty);

    if correct {
        updated.last_response = LastResponse::Correct;
        updated.correct_count = state.correct_count.saturating_add(1);

        let prior_r = retrievability(state.last_seen, state.stability, now);
        let bonus = 1.0 + (1.0 - prior_r) * params.retrieval_bonus;
        updated.stability = clamp_stability(
            base_stability * params.stability_growth * bonus,
            params,
        );
        updated.difficulty = clamp_scale(base_difficulty - params.difficulty_decrease);

        if updated.status == ItemStatus::Learning
            && updated.correct_count >= params.graduation_correct_count
            && updated.stability >= params.graduation_min_stability
        {
            updated.status = ItemStatus::Known;
            tracing::info!(
                item_id = %state.item_id,
                stability = updated.stability,
                "item graduated to known"
            );
        }
    } else {
        updated.last_response = LastResponse::Incorrect;
        updated.stability = clamp_stability(base_stability * params.stability_decay, params);
        updated.difficulty = clamp_scale(base_difficulty + params.difficulty_increase);

        if updated.status == ItemStatus::Known {
            updated.status = ItemStatus::Lapsed;
            updated.lapse_count = state.lapse_count.saturating_add(1);
            tracing::info!(
                item_id = %state.item_id,
                lapses = updated.lapse_count,
                "known item lapsed"
            );
        }
    }

    updated.retrievability = 1.0;
    updated
}

/// Fresh learning state for an item that was just taught.
pub fn initialize_after_teaching(
    item_id: &str,
    base_difficulty: f64,
    now: i64,
    params: &MemoryParams,
) -> ItemMemoryState {
    ItemMemoryState {
        item_id: item_id.to_string(),
        status: ItemStatus::Learning,
        stability: clamp_stability(params.initial_stability, params),
        difficulty: clamp_scale(base_difficulty),
        last_seen: now,
        retrievability: 1.0,
        exposure_count: 1,
        correct_count: 0,
        lapse_count: 0,
        last_response: LastResponse::None,
        reinforcements_due: params
            .reinforcement_offsets_ms
            .iter()
            .map(|&offset| now.saturating_add(offset))
            .collect(),
    }
}

/// Drop the earliest pending reinforcement.
pub fn pop_reinforcement(state: &ItemMemoryState) -> ItemMemoryState {
    let mut updated = state.clone();
    updated.reinforcements_due.pop_front();
    updated
}

/// Refresh the cached retrievability of many states, e.g. after a long absence.
pub fn recalculate_retrievabilities(
    states: &[ItemMemoryState],
    now: i64,
) -> Vec<ItemMemoryState> {
    states
        .par_iter()
        .map(|state| ItemMemoryState {
            retrievability: retrievability(state.last_seen, state.stability, now),
            ..state.clone()
        })
        .collect()
}

fn clamp_stability(stability: f64, params: &MemoryParams) -> f64 {
    clamp_finite(
        stability,
        params.min_stability,
        params.max_stability,
        params.initial_stability,
    )
}
