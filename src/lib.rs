//! # vocab-engine - adaptive vocabulary learning engine
//!
//! Decides which card a learner sees next and how every answer updates the
//! learner's state. Pure Rust with no I/O; persistence goes through the
//! [`store::LearnerStore`] trait.
//!
//! - **Memory Model** - forgetting curve, stability growth, short reinforcement queue
//! - **Ability Estimator** - θ/uncertainty binary-search style calibration
//! - **Item Selector** - priority auction between reinforcement, review, probe and teaching
//! - **Card Factory** - teaching cards and four-option quiz cards with distractors
//!
//! ## Modules
//!
//! - [`memory`] - retrievability, response updates, reinforcement schedule
//! - [`ability`] - response model, information gain, θ updates
//! - [`selector`] - candidate collection, variety penalties, selection
//! - [`cards`] - distractor filtering, backfill, option assembly
//! - [`session`] - response entry points and the `LearningSession` driver
//! - [`store`] - snapshots and the persistence trait
//! - [`config`] - every tuning constant, with env/JSON overrides
//! - [`sanitize`] - numeric clamping
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use vocab_engine::{Corpus, DistractorPool, EngineConfig, ItemStates, LearnerState, LearningSession};
//!
//! let corpus = Corpus::default();
//! let pool = DistractorPool::default();
//! let mut session = LearningSession::with_seed(
//!     EngineConfig::default(),
//!     LearnerState::new(0),
//!     ItemStates::new(),
//!     0,
//!     42,
//! );
//!
//! // nothing to learn from an empty corpus
//! assert!(session.next_card(&corpus, &pool, 0).is_none());
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod ability;
pub mod cards;
pub mod config;
pub mod error;
pub mod memory;
pub mod sanitize;
pub mod selector;
pub mod session;
pub mod store;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use config::{AbilityParams, CardParams, EngineConfig, MemoryParams, SelectorParams, SessionParams};
pub use error::{EngineError, EngineResult};
pub use selector::select_next_card;
pub use session::{
    apply_quiz_response, apply_teaching_ack, now_millis, AnswerOutcome, LearningSession, SessionSummary,
};
pub use store::{LearnerStore, MemoryStore, Snapshot};
