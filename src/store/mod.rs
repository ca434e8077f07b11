//! Persistence seam
//!
//! The engine never does I/O itself. A `LearnerStore` hands it a snapshot of
//! the learner and every item state, and takes the updated snapshot back.
//! Learner and item updates from one response are written in a single
//! `save`, so readers never observe one without the other.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::ability::initial_learner;
use crate::config::AbilityParams;
use crate::error::{EngineError, EngineResult};
use crate::types::{ItemMemoryState, ItemStates, LearnerState};

/// Everything that outlives a session; also the export/import backup format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub learner: LearnerState,
    pub items: ItemStates,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(learner: LearnerState, items: ItemStates) -> Self {
        Self {
            learner,
            items,
            exported_at: None,
        }
    }

    /// Serialize for backup, stamping the export time.
    pub fn to_json(&self) -> EngineResult<String> {
        let stamped = Self {
            exported_at: Some(Utc::now()),
            ..self.clone()
        };
        Ok(serde_json::to_string(&stamped)?)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let snapshot: Self = serde_json::from_str(json).map_err(|e| {
            tracing::warn!(error = %e, "rejecting corrupt snapshot");
            EngineError::from(e)
        })?;

        for (key, state) in &snapshot.items {
            if key != &state.item_id {
                return Err(EngineError::Store(format!(
                    "item state keyed as {} belongs to {}",
                    key, state.item_id
                )));
            }
        }
        Ok(snapshot)
    }

    /// Replace one item state together with the learner.
    pub fn apply(&mut self, learner: LearnerState, item_state: ItemMemoryState) {
        self.learner = learner;
        self.items.insert(item_state.item_id.clone(), item_state);
    }
}

pub trait LearnerStore {
    /// Fails with `NotFound` when nothing has been saved yet.
    fn load(&self) -> EngineResult<Snapshot>;

    fn save(&self, snapshot: &Snapshot) -> EngineResult<()>;

    fn clear(&self) -> EngineResult<()>;

    /// Persist the outcome of one response as a single write.
    fn save_response(
        &self,
        learner: &LearnerState,
        item_state: &ItemMemoryState,
        now: i64,
    ) -> EngineResult<()> {
        let mut snapshot = match self.load() {
            Ok(snapshot) => snapshot,
            Err(EngineError::NotFound(_)) => Snapshot::new(learner.clone(), ItemStates::new()),
            Err(e) => return Err(e),
        };
        tracing::debug!(item_id = %item_state.item_id, at = now, "saving response");
        snapshot.apply(learner.clone(), item_state.clone());
        self.save(&snapshot)
    }
}

/// Load the stored snapshot, or start a fresh learner at the configured
/// initial θ if there is none.
pub fn load_or_new<S: LearnerStore + ?Sized>(
    store: &S,
    now: i64,
    params: &AbilityParams,
) -> EngineResult<Snapshot> {
    match store.load() {
        Ok(snapshot) => Ok(snapshot),
        Err(EngineError::NotFound(_)) => {
            tracing::debug!("no stored learner, starting fresh");
            Ok(Snapshot::new(initial_learner(now, params), ItemStates::new()))
        }
        Err(e) => Err(e),
    }
}

/// Process-local store, for tests and for embedding without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Option<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Mutex::new(Some(snapshot)),
        }
    }
}

impl LearnerStore for MemoryStore {
    fn load(&self) -> EngineResult<Snapshot> {
        self.inner
            .lock()
            .clone()
            .ok_or_else(|| EngineError::NotFound("learner snapshot".to_string()))
    }

    fn save(&self, snapshot: &Snapshot) -> EngineResult<()> {
        *self.inner.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> EngineResult<()> {
        *self.inner.lock() = None;
        Ok(())
    }
}
