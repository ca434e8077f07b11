//! Response Handling and Session Driver
//!
//! `apply_quiz_response` and `apply_teaching_ack` are the two pure entry
//! points that fold one learner event into new state. `LearningSession`
//! wraps them with the selector into the full loop a front end runs:
//!
//! select card → show → answer / acknowledge → update → select again
//!
//! The driver owns its RNG, so a seeded session replays identically.

use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, SessionParams};
use crate::error::{EngineError, EngineResult};
use crate::store::Snapshot;
use crate::types::{
    Card, CardKind, Corpus, DistractorPool, ItemMemoryState, ItemStates, ItemStatus,
    LearnerState, SessionState,
};
use crate::{ability, memory, selector};

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ==================== Pure Entry Points ====================

/// Fold one quiz answer into the learner and the item's memory state.
///
/// Graduation to Known moves one item from the learning total to the known
/// total.
pub fn apply_quiz_response(
    learner: &LearnerState,
    item_state: &ItemMemoryState,
    item_difficulty: f64,
    correct: bool,
    now: i64,
    config: &EngineConfig,
) -> (LearnerState, ItemMemoryState) {
    let mut next_learner = ability::apply_response(learner, item_difficulty, correct, &config.ability);
    let next_item = memory::apply_response(item_state, correct, now, &config.memory);

    if next_item.status == ItemStatus::Known && item_state.status != ItemStatus::Known {
        next_learner.total_known = next_learner.total_known.saturating_add(1);
        next_learner.total_learning = next_learner.total_learning.saturating_sub(1);
    }

    tracing::debug!(
        item_id = %item_state.item_id,
        item_difficulty,
        correct,
        old_theta = learner.theta,
        new_theta = next_learner.theta,
        old_uncertainty = learner.uncertainty,
        new_uncertainty = next_learner.uncertainty,
        "theta_update"
    );

    (next_learner, next_item)
}

/// Memory state for an item whose teaching card was just acknowledged.
///
/// Callers bump their counters with [`LearnerState::record_teaching`].
pub fn apply_teaching_ack(
    item_id: &str,
    item_difficulty: f64,
    now: i64,
    config: &EngineConfig,
) -> ItemMemoryState {
    memory::initialize_after_teaching(item_id, item_difficulty, now, &config.memory)
}

// ==================== Session Bookkeeping ====================

impl SessionState {
    pub fn record_quiz(&mut self, card: &Card, correct: bool, params: &SessionParams) {
        if correct {
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }
        self.push_recent(card, params);
    }

    pub fn record_teaching(&mut self, card: &Card, params: &SessionParams) {
        self.new_items_taught += 1;
        self.push_recent(card, params);
    }

    fn push_recent(&mut self, card: &Card, params: &SessionParams) {
        self.cards_shown += 1;

        self.recent_item_ids.push_back(card.item_id().to_string());
        while self.recent_item_ids.len() > params.recent_items_tracked {
            self.recent_item_ids.pop_front();
        }

        self.recent_card_kinds.push_back(card.kind);
        while self.recent_card_kinds.len() > params.recent_kinds_tracked {
            self.recent_card_kinds.pop_front();
        }
    }

    /// Share of quiz answers that were correct, 0 before the first answer.
    pub fn accuracy(&self) -> f64 {
        let answered = self.correct_count + self.incorrect_count;
        if answered == 0 {
            0.0
        } else {
            self.correct_count as f64 / answered as f64
        }
    }
}

/// Stats for an end-of-session or overlay display
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub cards_shown: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub accuracy: f64,
    pub new_items_taught: u32,
    pub theta: f64,
    pub uncertainty: f64,
    pub total_known: u32,
    pub total_learning: u32,
    pub duration_ms: i64,
}

/// Result of answering one quiz card
#[derive(Clone, Debug)]
pub struct AnswerOutcome {
    pub learner: LearnerState,
    pub item_state: ItemMemoryState,
    pub graduated: bool,
    pub lapsed: bool,
}

// ==================== Session Driver ====================

pub struct LearningSession<R: Rng = ChaCha8Rng> {
    config: EngineConfig,
    rng: R,
    learner: LearnerState,
    items: ItemStates,
    session: SessionState,
}

impl LearningSession<ChaCha8Rng> {
    /// Reproducible session, mainly for tests and replays.
    pub fn with_seed(
        config: EngineConfig,
        learner: LearnerState,
        items: ItemStates,
        now: i64,
        seed: u64,
    ) -> Self {
        Self::new(config, learner, items, now, ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy(config: EngineConfig, learner: LearnerState, items: ItemStates, now: i64) -> Self {
        Self::new(config, learner, items, now, ChaCha8Rng::from_entropy())
    }

    /// Resume from a persisted snapshot.
    pub fn from_snapshot(config: EngineConfig, snapshot: Snapshot, now: i64, seed: u64) -> Self {
        Self::with_seed(config, snapshot.learner, snapshot.items, now, seed)
    }
}

impl<R: Rng> LearningSession<R> {
    /// Starting a session bumps the learner's session counter.
    pub fn new(config: EngineConfig, learner: LearnerState, items: ItemStates, now: i64, rng: R) -> Self {
        let learner = learner.start_session(now);
        tracing::debug!(
            session_count = learner.session_count,
            theta = learner.theta,
            items = items.len(),
            "session started"
        );
        Self {
            config,
            rng,
            learner,
            items,
            session: SessionState::new(now),
        }
    }

    pub fn next_card(&mut self, corpus: &Corpus, pool: &DistractorPool, now: i64) -> Option<Card> {
        selector::select_next_card(
            &self.learner,
            &self.items,
            &self.session,
            corpus,
            pool,
            now,
            &self.config,
            &mut self.rng,
        )
    }

    /// Record a quiz answer. Reinforcement cards also consume their due slot.
    pub fn answer(&mut self, card: &Card, correct: bool, now: i64) -> EngineResult<AnswerOutcome> {
        if !card.is_quiz() {
            return Err(EngineError::UnexpectedCard(card.kind.as_str()));
        }

        let item_id = card.item_id();
        let current = self
            .items
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| ItemMemoryState::unseen(item_id, card.item.difficulty));

        let (learner, mut item_state) = apply_quiz_response(
            &self.learner,
            &current,
            card.item.difficulty,
            correct,
            now,
            &self.config,
        );
        if card.kind == CardKind::Reinforcement {
            item_state = memory::pop_reinforcement(&item_state);
        }

        tracing::debug!(
            item_id = %item_id,
            kind = card.kind.as_str(),
            correct,
            theta = learner.theta,
            "quiz_response"
        );

        let outcome = AnswerOutcome {
            graduated: current.status != ItemStatus::Known && item_state.status == ItemStatus::Known,
            lapsed: current.status == ItemStatus::Known && item_state.status == ItemStatus::Lapsed,
            learner: learner.clone(),
            item_state: item_state.clone(),
        };

        self.learner = learner;
        self.items.insert(item_id.to_string(), item_state);
        self.session.record_quiz(card, correct, &self.config.session);

        Ok(outcome)
    }

    /// Record that the learner has read a teaching card.
    pub fn acknowledge_teaching(&mut self, card: &Card, now: i64) -> EngineResult<ItemMemoryState> {
        if card.is_quiz() {
            return Err(EngineError::UnexpectedCard(card.kind.as_str()));
        }

        let item_state = apply_teaching_ack(card.item_id(), card.item.difficulty, now, &self.config);
        tracing::debug!(
            item_id = %card.item_id(),
            difficulty = item_state.difficulty,
            "teaching_shown"
        );

        self.learner = self.learner.record_teaching();
        self.items.insert(card.item_id().to_string(), item_state.clone());
        self.session.record_teaching(card, &self.config.session);

        Ok(item_state)
    }

    pub fn summary(&self, now: i64) -> SessionSummary {
        SessionSummary {
            cards_shown: self.session.cards_shown,
            correct_count: self.session.correct_count,
            incorrect_count: self.session.incorrect_count,
            accuracy: self.session.accuracy(),
            new_items_taught: self.session.new_items_taught,
            theta: self.learner.theta,
            uncertainty: self.learner.uncertainty,
            total_known: self.learner.total_known,
            total_learning: self.learner.total_learning,
            duration_ms: now.saturating_sub(self.session.started_at).max(0),
        }
    }

    /// Persistable state; the per-session bookkeeping is left out.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.learner.clone(), self.items.clone())
    }

    pub fn learner(&self) -> &LearnerState {
        &self.learner
    }

    pub fn items(&self) -> &ItemStates {
        &self.items
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
