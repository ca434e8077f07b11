use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Forgetting-curve parameters for the per-item memory model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryParams {
    /// Days; used after teaching and when a state has no stability yet
    pub initial_stability: f64,
    /// Multiplier on successful recall
    pub stability_growth: f64,
    /// Multiplier on failure
    pub stability_decay: f64,
    pub min_stability: f64,
    pub max_stability: f64,
    /// Extra growth per unit of forgotten retrievability
    pub retrieval_bonus: f64,
    pub difficulty_increase: f64,
    pub difficulty_decrease: f64,
    pub graduation_correct_count: u32,
    pub graduation_min_stability: f64,
    /// Offsets from the teaching time, in milliseconds
    pub reinforcement_offsets_ms: Vec<i64>,
}

impl Default for MemoryParams {
    fn default() -> Self {
        Self {
            initial_stability: 0.5,
            stability_growth: 2.5,
            stability_decay: 0.3,
            min_stability: 0.1,
            max_stability: 365.0,
            retrieval_bonus: 0.5,
            difficulty_increase: 0.2,
            difficulty_decrease: 0.05,
            graduation_correct_count: 2,
            graduation_min_stability: 1.0,
            reinforcement_offsets_ms: vec![60 * 1000, 5 * 60 * 1000, 15 * 60 * 1000],
        }
    }
}

/// Ability (θ) estimator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbilityParams {
    pub initial_theta: f64,
    pub min_uncertainty: f64,
    /// Per-response multiplier for informative items
    pub uncertainty_decay: f64,
    /// Uninformative items decay uncertainty by `uncertainty_decay * this`
    pub uninformative_slowdown: f64,
    /// |difficulty - θ| below this counts as informative
    pub informative_gap: f64,
    /// θ nudge (times uncertainty) after a correct answer on an easy item
    pub confirmation_step: f64,
    /// θ lands this far below a missed hard item
    pub miss_margin: f64,
    /// Smoothing weight of the newest observation in average accuracy
    pub accuracy_alpha: f64,
}

impl Default for AbilityParams {
    fn default() -> Self {
        Self {
            initial_theta: 0.5,
            min_uncertainty: 0.1,
            uncertainty_decay: 0.85,
            uninformative_slowdown: 1.05,
            informative_gap: 1.0,
            confirmation_step: 0.1,
            miss_margin: 0.3,
            accuracy_alpha: 0.1,
        }
    }
}

/// Priority auction weights, thresholds and caps for the item selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorParams {
    pub urgency_weight: f64,
    pub information_weight: f64,
    pub learning_value_weight: f64,
    pub priority_scale: f64,
    pub reinforcement_priority: f64,
    pub target_retrievability: f64,
    /// Uncertainty above this is the calibration phase
    pub calibration_threshold: f64,
    /// Outside calibration, probe on every Nth card
    pub probe_interval: u32,
    pub probe_jump: f64,
    pub probe_floor: f64,
    pub probe_pool: usize,
    pub probe_pick: usize,
    /// Probes consider items exposed fewer times than this
    pub probe_max_exposures: u32,
    pub teach_offset: f64,
    pub teach_floor: f64,
    pub teach_pool: usize,
    pub teach_pick: usize,
    pub max_new_per_session: u32,
    pub max_learning_queue: usize,
    pub recent_item_penalty: f64,
    pub kind_window: usize,
    pub kind_limit: usize,
    pub kind_penalty: f64,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            urgency_weight: 0.4,
            information_weight: 0.25,
            learning_value_weight: 0.25,
            priority_scale: 100.0,
            reinforcement_priority: 1000.0,
            target_retrievability: 0.85,
            calibration_threshold: 0.3,
            probe_interval: 5,
            probe_jump: 1.5,
            probe_floor: 0.5,
            probe_pool: 10,
            probe_pick: 3,
            probe_max_exposures: 2,
            teach_offset: 0.3,
            teach_floor: 1.5,
            teach_pool: 10,
            teach_pick: 5,
            max_new_per_session: 10,
            max_learning_queue: 10,
            recent_item_penalty: 0.3,
            kind_window: 5,
            kind_limit: 3,
            kind_penalty: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionParams {
    pub recent_items_tracked: usize,
    pub recent_kinds_tracked: usize,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            recent_items_tracked: 10,
            recent_kinds_tracked: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardParams {
    pub backfill_radius: f64,
    pub backfill_scan: usize,
    pub pool_cap: usize,
    pub missing_answer: String,
    pub placeholder: String,
}

impl Default for CardParams {
    fn default() -> Self {
        Self {
            backfill_radius: 1.0,
            backfill_scan: 20,
            pool_cap: 10,
            missing_answer: "Definition not available".to_string(),
            placeholder: "No definition available".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub memory: MemoryParams,
    pub ability: AbilityParams,
    pub selector: SelectorParams,
    pub session: SessionParams,
    pub cards: CardParams,
}

impl EngineConfig {
    /// Defaults with `VOCAB_*` overrides applied. An override that fails to
    /// parse or would make the config invalid is skipped with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        env_override(&mut config, "VOCAB_TARGET_RETRIEVABILITY", |c| &mut c.selector.target_retrievability);
        env_override(&mut config, "VOCAB_CALIBRATION_THRESHOLD", |c| &mut c.selector.calibration_threshold);
        env_override(&mut config, "VOCAB_PROBE_INTERVAL", |c| &mut c.selector.probe_interval);
        env_override(&mut config, "VOCAB_MAX_NEW_PER_SESSION", |c| &mut c.selector.max_new_per_session);
        env_override(&mut config, "VOCAB_MAX_LEARNING_QUEUE", |c| &mut c.selector.max_learning_queue);
        env_override(&mut config, "VOCAB_MIN_UNCERTAINTY", |c| &mut c.ability.min_uncertainty);
        env_override(&mut config, "VOCAB_UNCERTAINTY_DECAY", |c| &mut c.ability.uncertainty_decay);
        env_override(&mut config, "VOCAB_INITIAL_STABILITY", |c| &mut c.memory.initial_stability);

        config
    }

    /// Parse a JSON object; missing fields keep their defaults.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(invalid("config must be a JSON object"));
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let Some(name) = self.first_non_finite() {
            return Err(invalid(&format!("{name} must be finite")));
        }

        let m = &self.memory;
        if !(m.min_stability > 0.0 && m.min_stability <= m.max_stability) {
            return Err(invalid("memory stability bounds must satisfy 0 < min <= max"));
        }
        if m.initial_stability <= 0.0 || m.stability_growth <= 0.0 || m.stability_decay <= 0.0 {
            return Err(invalid("memory stability factors must be positive"));
        }
        if m.reinforcement_offsets_ms.iter().any(|&o| o < 0) {
            return Err(invalid("reinforcement offsets must not be negative"));
        }

        let a = &self.ability;
        if !(a.min_uncertainty > 0.0 && a.min_uncertainty <= 1.0) {
            return Err(invalid("ability.minUncertainty must be in (0, 1]"));
        }
        if !(a.uncertainty_decay > 0.0 && a.uncertainty_decay <= 1.0) {
            return Err(invalid("ability.uncertaintyDecay must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&a.accuracy_alpha) {
            return Err(invalid("ability.accuracyAlpha must be in [0, 1]"));
        }

        let s = &self.selector;
        if !(s.target_retrievability > 0.0 && s.target_retrievability < 1.0) {
            return Err(invalid("selector.targetRetrievability must be in (0, 1)"));
        }
        for (name, value) in [
            ("recentItemPenalty", s.recent_item_penalty),
            ("kindPenalty", s.kind_penalty),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(&format!("selector.{name} must be in [0, 1]")));
            }
        }
        if s.probe_interval == 0 {
            return Err(invalid("selector.probeInterval must be at least 1"));
        }
        if s.probe_pick == 0 || s.teach_pick == 0 {
            return Err(invalid("selector pick sizes must be at least 1"));
        }

        Ok(())
    }
}

impl EngineConfig {
    fn first_non_finite(&self) -> Option<&'static str> {
        let (m, a, s, c) = (&self.memory, &self.ability, &self.selector, &self.cards);
        [
            ("memory.initialStability", m.initial_stability),
            ("memory.stabilityGrowth", m.stability_growth),
            ("memory.stabilityDecay", m.stability_decay),
            ("memory.minStability", m.min_stability),
            ("memory.maxStability", m.max_stability),
            ("memory.retrievalBonus", m.retrieval_bonus),
            ("memory.difficultyIncrease", m.difficulty_increase),
            ("memory.difficultyDecrease", m.difficulty_decrease),
            ("memory.graduationMinStability", m.graduation_min_stability),
            ("ability.initialTheta", a.initial_theta),
            ("ability.minUncertainty", a.min_uncertainty),
            ("ability.uncertaintyDecay", a.uncertainty_decay),
            ("ability.uninformativeSlowdown", a.uninformative_slowdown),
            ("ability.informativeGap", a.informative_gap),
            ("ability.confirmationStep", a.confirmation_step),
            ("ability.missMargin", a.miss_margin),
            ("ability.accuracyAlpha", a.accuracy_alpha),
            ("selector.urgencyWeight", s.urgency_weight),
            ("selector.informationWeight", s.information_weight),
            ("selector.learningValueWeight", s.learning_value_weight),
            ("selector.priorityScale", s.priority_scale),
            ("selector.reinforcementPriority", s.reinforcement_priority),
            ("selector.targetRetrievability", s.target_retrievability),
            ("selector.calibrationThreshold", s.calibration_threshold),
            ("selector.probeJump", s.probe_jump),
            ("selector.probeFloor", s.probe_floor),
            ("selector.teachOffset", s.teach_offset),
            ("selector.teachFloor", s.teach_floor),
            ("selector.recentItemPenalty", s.recent_item_penalty),
            ("selector.kindPenalty", s.kind_penalty),
            ("cards.backfillRadius", c.backfill_radius),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(name, _)| name)
    }
}

fn invalid(message: &str) -> EngineError {
    EngineError::Config(message.to_string())
}

fn env_override<T, F>(config: &mut EngineConfig, key: &str, field: F)
where
    T: std::str::FromStr,
    F: Fn(&mut EngineConfig) -> &mut T,
{
    let Ok(val) = std::env::var(key) else {
        return;
    };
    let Ok(parsed) = val.parse::<T>() else {
        tracing::warn!(key, value = %val, "ignoring unparsable config override");
        return;
    };

    let mut candidate = config.clone();
    *field(&mut candidate) = parsed;
    match candidate.validate() {
        Ok(()) => *config = candidate,
        Err(e) => tracing::warn!(key, value = %val, error = %e, "ignoring invalid config override"),
    }
}
