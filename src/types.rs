//! Common Types and Constants
//!
//! Shared data structures used across the memory model, ability estimator,
//! card factory and item selector.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

// ==================== Constants ====================

/// Lower bound for ability (θ) and item difficulty
pub const MIN_SCALE: f64 = -3.0;

/// Upper bound for ability (θ) and item difficulty
pub const MAX_SCALE: f64 = 3.0;

/// Milliseconds per day, used for retrievability decay
pub const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Per-item memory states keyed by item id
pub type ItemStates = HashMap<String, ItemMemoryState>;

// ==================== Corpus Types ====================

/// One dictionary sense of an item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Part of speech of this sense
    pub pos: String,
    /// Gloss text shown as a quiz answer
    pub def: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// A learnable vocabulary item, supplied by the corpus and never mutated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub word: String,
    #[serde(default)]
    pub rank: u32,
    /// Frequency-derived difficulty, roughly [-3, 3]
    pub difficulty: f64,
    #[serde(default)]
    pub pos: Vec<String>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipa: Option<String>,
    #[serde(default)]
    pub sentences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cefr: Option<String>,
}

impl Item {
    /// Gloss of the first definition, if any
    pub fn primary_gloss(&self) -> Option<&str> {
        self.definitions
            .first()
            .map(|d| d.def.as_str())
            .filter(|d| !d.is_empty())
    }
}

/// Ordered item list with an id index
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    items: Vec<Item>,
    index: HashMap<String, usize>,
}

impl Corpus {
    pub fn new(items: Vec<Item>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        Self { items, index }
    }

    /// Parse the corpus JSON file shape (an array of items)
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let items: Vec<Item> = serde_json::from_str(json)?;
        Ok(Self::new(items))
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Distractor glosses bucketed by difficulty band ("-1.5", "0.0", "2.5", ...)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistractorPool {
    bands: HashMap<String, Vec<String>>,
}

impl DistractorPool {
    pub fn new(bands: HashMap<String, Vec<String>>) -> Self {
        Self { bands }
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Band key for a difficulty: nearest 0.5, halves rounded up, one decimal.
    pub fn band_key(difficulty: f64) -> String {
        let difficulty = if difficulty.is_finite() { difficulty } else { 0.0 };
        let rounded = (difficulty * 2.0 + 0.5).floor() / 2.0;
        // normalizes -0.0
        format!("{:.1}", rounded + 0.0)
    }

    /// Glosses for the item's band, falling back to the "0.0" band
    pub fn for_difficulty(&self, difficulty: f64) -> &[String] {
        self.bands
            .get(&Self::band_key(difficulty))
            .or_else(|| self.bands.get("0.0"))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn insert(&mut self, key: impl Into<String>, glosses: Vec<String>) {
        self.bands.insert(key.into(), glosses);
    }
}

// ==================== Learner Types ====================

/// Learner-level ability estimate and counters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerState {
    /// Ability estimate θ, same scale as item difficulty
    pub theta: f64,
    /// 1.0 = uncertain, floor = confident
    pub uncertainty: f64,
    pub total_known: u32,
    pub total_learning: u32,
    pub total_seen: u32,
    /// Exponentially smoothed accuracy in [0, 1]
    pub average_accuracy: f64,
    pub session_count: u32,
    pub created_at: i64,
    pub last_session_at: i64,
}

impl LearnerState {
    /// Fresh learner at an intermediate level with maximal uncertainty.
    pub fn new(now: i64) -> Self {
        Self {
            theta: 0.5,
            uncertainty: 1.0,
            total_known: 0,
            total_learning: 0,
            total_seen: 0,
            average_accuracy: 0.5,
            session_count: 0,
            created_at: now,
            last_session_at: now,
        }
    }

    /// Counter bookkeeping after a teaching card is acknowledged
    pub fn record_teaching(&self) -> Self {
        Self {
            total_learning: self.total_learning + 1,
            total_seen: self.total_seen + 1,
            ..self.clone()
        }
    }

    pub fn start_session(&self, now: i64) -> Self {
        Self {
            session_count: self.session_count + 1,
            last_session_at: now,
            ..self.clone()
        }
    }
}

impl Default for LearnerState {
    fn default() -> Self {
        Self::new(0)
    }
}

// ==================== Item Memory Types ====================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Unseen,
    Learning,
    Known,
    Lapsed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastResponse {
    #[default]
    None,
    Correct,
    Incorrect,
}

/// Memory state of one learner-item pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMemoryState {
    pub item_id: String,
    pub status: ItemStatus,
    /// Days until retrievability decays by a factor of e
    pub stability: f64,
    /// Learner-specific difficulty, starts at the item's base difficulty
    pub difficulty: f64,
    /// Millisecond timestamp, 0 = never seen
    pub last_seen: i64,
    pub retrievability: f64,
    pub exposure_count: u32,
    pub correct_count: u32,
    pub lapse_count: u32,
    pub last_response: LastResponse,
    /// Pending short-delay re-exposures, earliest first
    pub reinforcements_due: VecDeque<i64>,
}

impl ItemMemoryState {
    /// Default for an item that has never been shown
    pub fn unseen(item_id: impl Into<String>, base_difficulty: f64) -> Self {
        Self {
            item_id: item_id.into(),
            status: ItemStatus::Unseen,
            stability: 0.0,
            difficulty: base_difficulty,
            last_seen: 0,
            retrievability: 0.0,
            exposure_count: 0,
            correct_count: 0,
            lapse_count: 0,
            last_response: LastResponse::None,
            reinforcements_due: VecDeque::new(),
        }
    }

    /// Earliest pending reinforcement at or before `now`
    pub fn due_reinforcement(&self, now: i64) -> Option<i64> {
        self.reinforcements_due.front().copied().filter(|&t| t <= now)
    }
}

// ==================== Card Types ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Teaching,
    Probe,
    Review,
    Reinforcement,
}

impl CardKind {
    pub fn is_quiz(self) -> bool {
        !matches!(self, CardKind::Teaching)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CardKind::Teaching => "teaching",
            CardKind::Probe => "probe",
            CardKind::Review => "review",
            CardKind::Reinforcement => "reinforcement",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub text: String,
    pub is_correct: bool,
}

/// A presentable unit: teaching reveal or four-option quiz
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub kind: CardKind,
    pub item: Item,
    /// Empty for teaching cards, exactly four entries otherwise
    pub options: Vec<QuizOption>,
    pub correct_index: Option<usize>,
}

impl Card {
    pub fn item_id(&self) -> &str {
        &self.item.id
    }

    pub fn is_quiz(&self) -> bool {
        self.kind.is_quiz()
    }
}

// ==================== Session Types ====================

/// In-memory per-session bookkeeping, never persisted
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub cards_shown: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    /// Most recent last
    pub recent_item_ids: VecDeque<String>,
    /// Most recent last
    pub recent_card_kinds: VecDeque<CardKind>,
    pub new_items_taught: u32,
    pub started_at: i64,
}

impl SessionState {
    pub fn new(now: i64) -> Self {
        Self {
            started_at: now,
            ..Self::default()
        }
    }

    pub fn is_recent(&self, item_id: &str) -> bool {
        self.recent_item_ids.iter().any(|id| id == item_id)
    }

    /// Occurrences of `kind` among the last `window` cards
    pub fn recent_kind_count(&self, kind: CardKind, window: usize) -> usize {
        self.recent_card_kinds
            .iter()
            .rev()
            .take(window)
            .filter(|&&k| k == kind)
            .count()
    }
}
