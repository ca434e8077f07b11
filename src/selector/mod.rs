//! Next-Card Selection
//!
//! A priority auction re-run from scratch on every call. Candidates come
//! from four sources, each scored on its own scale:
//!
//! - reinforcement: a due short-delay re-exposure, fixed top priority
//! - review: known/lapsed items whose retrievability fell below target,
//!   scored by the retention shortfall
//! - probe: an item above θ chosen to calibrate the ability estimate,
//!   scored by information gain
//! - teaching: a new item slightly below θ, scored by level match
//!
//! Recently shown items and over-represented card kinds are penalized, the
//! best remaining candidate wins, and the card factory materializes it. The
//! selector holds no state of its own beyond the snapshot it is given.

use std::cmp::Ordering;

use rand::Rng;

use crate::ability::{information_gain, is_calibrating};
use crate::cards::create_card;
use crate::config::{EngineConfig, SelectorParams};
use crate::memory::retrievability;
use crate::types::{
    Card, CardKind, Corpus, DistractorPool, Item, ItemStates, ItemStatus, LearnerState,
    SessionState,
};

/// A scored action competing for the next slot
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub item: &'a Item,
    pub kind: CardKind,
    pub priority: f64,
}

/// Pick and build the next card, or `None` when nothing is left to show.
#[allow(clippy::too_many_arguments)]
pub fn select_next_card<R: Rng>(
    learner: &LearnerState,
    items: &ItemStates,
    session: &SessionState,
    corpus: &Corpus,
    pool: &DistractorPool,
    now: i64,
    config: &EngineConfig,
    rng: &mut R,
) -> Option<Card> {
    let params = &config.selector;
    let mut candidates = collect_candidates(learner, items, session, corpus, now, params, rng);
    apply_variety_penalties(&mut candidates, session, params);

    let (item, kind) = match pick_best(&candidates) {
        Some(best) => {
            tracing::debug!(
                item_id = %best.item.id,
                kind = best.kind.as_str(),
                priority = best.priority,
                candidates = candidates.len(),
                "selected next card"
            );
            (best.item, best.kind)
        }
        None => {
            let item = select_teaching_item(learner, items, corpus, session, params, rng)?;
            tracing::debug!(item_id = %item.id, "no candidates, falling back to teaching");
            (item, CardKind::Teaching)
        }
    };

    Some(create_card(item, kind, corpus, pool, &config.cards, rng))
}

/// Gather every candidate before variety penalties, in source order:
/// reinforcements, reviews, probe, teaching.
pub fn collect_candidates<'a, R: Rng>(
    learner: &LearnerState,
    items: &ItemStates,
    session: &SessionState,
    corpus: &'a Corpus,
    now: i64,
    params: &SelectorParams,
    rng: &mut R,
) -> Vec<Candidate<'a>> {
    let mut candidates = Vec::new();

    // Item states live in a HashMap; sort by id so ties resolve the same way
    // on every run.
    let mut states: Vec<_> = items.values().collect();
    states.sort_by(|a, b| a.item_id.cmp(&b.item_id));

    for state in &states {
        if state.due_reinforcement(now).is_none() {
            continue;
        }
        if let Some(item) = corpus.get(&state.item_id) {
            candidates.push(Candidate {
                item,
                kind: CardKind::Reinforcement,
                priority: params.reinforcement_priority,
            });
        }
    }

    for state in &states {
        if !matches!(state.status, ItemStatus::Known | ItemStatus::Lapsed) || state.stability <= 0.0
        {
            continue;
        }
        let r = retrievability(state.last_seen, state.stability, now);
        if r >= params.target_retrievability {
            continue;
        }
        if let Some(item) = corpus.get(&state.item_id) {
            let urgency = (params.target_retrievability - r).max(0.0);
            candidates.push(Candidate {
                item,
                kind: CardKind::Review,
                priority: urgency * params.priority_scale * params.urgency_weight,
            });
        }
    }

    if should_probe(learner, session, params) {
        if let Some(item) = select_probe_item(learner, items, corpus, session, params, rng) {
            let gain = information_gain(learner.theta, learner.uncertainty, item.difficulty);
            candidates.push(Candidate {
                item,
                kind: CardKind::Probe,
                priority: gain * params.priority_scale * params.information_weight,
            });
        }
    }

    if should_teach(learner, items, session, params) {
        if let Some(item) = select_teaching_item(learner, items, corpus, session, params, rng) {
            let level_match = 1.0 - (item.difficulty - learner.theta).abs() / 3.0;
            candidates.push(Candidate {
                item,
                kind: CardKind::Teaching,
                priority: level_match * params.priority_scale * params.learning_value_weight,
            });
        }
    }

    candidates
}

/// Probe always while calibrating, otherwise every `probe_interval` cards.
pub fn should_probe(learner: &LearnerState, session: &SessionState, params: &SelectorParams) -> bool {
    if is_calibrating(learner, params.calibration_threshold) {
        return true;
    }
    session.cards_shown % params.probe_interval.max(1) == 0
}

/// Teach only after calibration, under the session cap and with a short
/// learning queue.
pub fn should_teach(
    learner: &LearnerState,
    items: &ItemStates,
    session: &SessionState,
    params: &SelectorParams,
) -> bool {
    if is_calibrating(learner, params.calibration_threshold) {
        return false;
    }
    if session.new_items_taught >= params.max_new_per_session {
        return false;
    }
    let learning = items
        .values()
        .filter(|s| s.status == ItemStatus::Learning)
        .count();
    learning < params.max_learning_queue
}

/// Unseen or barely seen item above θ, farther above while uncertain.
pub fn select_probe_item<'a, R: Rng>(
    learner: &LearnerState,
    items: &ItemStates,
    corpus: &'a Corpus,
    session: &SessionState,
    params: &SelectorParams,
    rng: &mut R,
) -> Option<&'a Item> {
    let target = learner.theta + learner.uncertainty * params.probe_jump;
    let floor = learner.theta - params.probe_floor;

    let mut ranked: Vec<(&Item, f64)> = corpus
        .items()
        .iter()
        .filter(|item| {
            let fresh = items.get(&item.id).map_or(true, |s| {
                s.status == ItemStatus::Unseen || s.exposure_count < params.probe_max_exposures
            });
            fresh && item.difficulty >= floor && !session.is_recent(&item.id)
        })
        .map(|item| (item, (item.difficulty - target).abs()))
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    ranked.truncate(params.probe_pool);

    pick_among_top(&ranked, params.probe_pick, rng)
}

/// Unseen item slightly below θ, skipping ones that are far too easy.
pub fn select_teaching_item<'a, R: Rng>(
    learner: &LearnerState,
    items: &ItemStates,
    corpus: &'a Corpus,
    session: &SessionState,
    params: &SelectorParams,
    rng: &mut R,
) -> Option<&'a Item> {
    let target = learner.theta - params.teach_offset;
    let floor = learner.theta - params.teach_floor;

    let mut ranked: Vec<(&Item, f64)> = corpus
        .items()
        .iter()
        .filter(|item| {
            let unseen = items
                .get(&item.id)
                .map_or(true, |s| s.status == ItemStatus::Unseen);
            unseen && item.difficulty >= floor && !session.is_recent(&item.id)
        })
        .map(|item| (item, 1.0 - (item.difficulty - target).abs() / 3.0))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(params.teach_pool);

    pick_among_top(&ranked, params.teach_pick, rng)
}

/// Multiplicative penalties for repeated items and over-used card kinds.
pub fn apply_variety_penalties(
    candidates: &mut [Candidate<'_>],
    session: &SessionState,
    params: &SelectorParams,
) {
    for candidate in candidates.iter_mut() {
        if session.is_recent(&candidate.item.id) {
            candidate.priority *= params.recent_item_penalty;
        }
        if session.recent_kind_count(candidate.kind, params.kind_window) >= params.kind_limit {
            candidate.priority *= params.kind_penalty;
        }
    }
}

/// Highest priority wins; earlier candidates win ties.
pub fn pick_best<'c, 'a>(candidates: &'c [Candidate<'a>]) -> Option<&'c Candidate<'a>> {
    candidates.iter().reduce(|best, c| {
        if c.priority.partial_cmp(&best.priority) == Some(Ordering::Greater) {
            c
        } else {
            best
        }
    })
}

fn pick_among_top<'a, R: Rng>(ranked: &[(&'a Item, f64)], pick: usize, rng: &mut R) -> Option<&'a Item> {
    if ranked.is_empty() {
        return None;
    }
    let span = pick.clamp(1, ranked.len());
    Some(ranked[rng.gen_range(0..span)].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::initialize_after_teaching;
    use crate::types::ItemMemoryState;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const T0: i64 = 1_700_000_000_000;
    const DAY: i64 = 24 * 60 * 60 * 1000;

    fn item(id: &str, difficulty: f64) -> Item {
        Item {
            id: id.to_string(),
            word: id.to_string(),
            rank: 0,
            difficulty,
            pos: vec![],
            definitions: vec![crate::types::Definition {
                pos: "noun".to_string(),
                def: format!("meaning of {id}"),
                examples: vec![],
            }],
            ipa: None,
            sentences: vec![],
            cefr: None,
        }
    }

    fn corpus() -> Corpus {
        Corpus::new(
            (0..30)
                .map(|i| item(&format!("w{i:02}"), -3.0 + i as f64 * 0.2))
                .collect(),
        )
    }

    fn learner(theta: f64, uncertainty: f64) -> LearnerState {
        LearnerState {
            theta,
            uncertainty,
            ..LearnerState::new(T0)
        }
    }

    fn known(id: &str, stability: f64, last_seen: i64) -> ItemMemoryState {
        ItemMemoryState {
            status: ItemStatus::Known,
            stability,
            last_seen,
            exposure_count: 4,
            correct_count: 3,
            reinforcements_due: Default::default(),
            ..ItemMemoryState::unseen(id, 0.0)
        }
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_empty_inputs_return_none() {
        let config = EngineConfig::default();
        let card = select_next_card(
            &learner(0.5, 1.0),
            &ItemStates::new(),
            &SessionState::new(T0),
            &Corpus::default(),
            &DistractorPool::default(),
            T0,
            &config,
            &mut rng(),
        );
        assert!(card.is_none());
    }

    #[test]
    fn test_due_reinforcement_wins() {
        let config = EngineConfig::default();
        let corpus = corpus();
        let mut items = ItemStates::new();
        items.insert(
            "w10".to_string(),
            initialize_after_teaching("w10", -1.0, T0, &config.memory),
        );
        items.insert("w20".to_string(), known("w20", 1.0, T0 - 5 * DAY));

        let mut session = SessionState::new(T0);
        session.recent_item_ids.push_back("w10".to_string());

        let card = select_next_card(
            &learner(0.0, 0.9),
            &items,
            &session,
            &corpus,
            &DistractorPool::default(),
            T0 + 61_000,
            &config,
            &mut rng(),
        )
        .unwrap();
        assert_eq!(card.kind, CardKind::Reinforcement);
        assert_eq!(card.item_id(), "w10");
        assert_eq!(card.options.len(), 4);
    }

    #[test]
    fn test_reinforcement_not_due_yet() {
        let config = EngineConfig::default();
        let corpus = corpus();
        let mut items = ItemStates::new();
        items.insert(
            "w10".to_string(),
            initialize_after_teaching("w10", -1.0, T0, &config.memory),
        );
        let candidates = collect_candidates(
            &learner(0.0, 0.9),
            &items,
            &SessionState::new(T0),
            &corpus,
            T0 + 30_000,
            &config.selector,
            &mut rng(),
        );
        assert!(candidates.iter().all(|c| c.kind != CardKind::Reinforcement));
    }

    #[test]
    fn test_reinforcement_for_missing_item_is_ignored() {
        let config = EngineConfig::default();
        let mut items = ItemStates::new();
        items.insert(
            "ghost".to_string(),
            initialize_after_teaching("ghost", 0.0, T0, &config.memory),
        );
        let corpus = Corpus::default();
        let candidates = collect_candidates(
            &learner(0.0, 0.2),
            &items,
            &SessionState::new(T0),
            &corpus,
            T0 + DAY,
            &config.selector,
            &mut rng(),
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_review_priority_tracks_shortfall() {
        let config = EngineConfig::default();
        let corpus = corpus();
        let mut items = ItemStates::new();
        items.insert("w05".to_string(), known("w05", 1.0, T0 - DAY));
        items.insert("w06".to_string(), known("w06", 1.0, T0 - 3 * DAY));
        items.insert("w07".to_string(), known("w07", 100.0, T0 - DAY));

        let mut session = SessionState::new(T0);
        session.cards_shown = 1;
        let candidates = collect_candidates(
            &learner(0.0, 0.2),
            &items,
            &session,
            &corpus,
            T0,
            &config.selector,
            &mut rng(),
        );
        let reviews: Vec<_> = candidates
            .iter()
            .filter(|c| c.kind == CardKind::Review)
            .collect();
        assert_eq!(reviews.len(), 2);
        let p5 = reviews.iter().find(|c| c.item.id == "w05").unwrap().priority;
        let p6 = reviews.iter().find(|c| c.item.id == "w06").unwrap().priority;
        let expected = (0.85 - (-1.0f64).exp()) * 100.0 * 0.4;
        assert!((p5 - expected).abs() < 1e-9);
        assert!(p6 > p5);
    }

    #[test]
    fn test_calibration_probes_and_never_teaches() {
        let config = EngineConfig::default();
        let corpus = corpus();
        let session = SessionState::new(T0);
        let candidates = collect_candidates(
            &learner(0.5, 1.0),
            &ItemStates::new(),
            &session,
            &corpus,
            T0,
            &config.selector,
            &mut rng(),
        );
        assert_eq!(candidates.len(), 1);
        let probe = &candidates[0];
        assert_eq!(probe.kind, CardKind::Probe);
        // target = 0.5 + 1.5 = 2.0; nearest three are 1.8, 2.0, 2.2
        assert!((probe.item.difficulty - 2.0).abs() < 0.21);
    }

    #[test]
    fn test_probe_skips_well_exposed_and_recent_items() {
        let config = EngineConfig::default();
        let corpus = Corpus::new(vec![item("a", 1.0), item("b", 1.1), item("c", 1.2), item("d", -2.0)]);
        let mut items = ItemStates::new();
        items.insert("a".to_string(), known("a", 5.0, T0));
        let mut session = SessionState::new(T0);
        session.recent_item_ids.push_back("b".to_string());

        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let picked = select_probe_item(
                &learner(0.0, 1.0),
                &items,
                &corpus,
                &session,
                &config.selector,
                &mut rng,
            );
            // "d" is below the floor θ - 0.5
            assert_eq!(picked.map(|i| i.id.as_str()), Some("c"));
        }
    }

    #[test]
    fn test_teaching_after_calibration() {
        let config = EngineConfig::default();
        let corpus = corpus();
        let mut session = SessionState::new(T0);
        session.cards_shown = 3;
        let candidates = collect_candidates(
            &learner(0.0, 0.2),
            &ItemStates::new(),
            &session,
            &corpus,
            T0,
            &config.selector,
            &mut rng(),
        );
        assert_eq!(candidates.len(), 1);
        let teach = &candidates[0];
        assert_eq!(teach.kind, CardKind::Teaching);
        // target θ - 0.3; top five are within 0.5 of it
        assert!((teach.item.difficulty + 0.3).abs() <= 0.5 + 1e-9);
        let expected = (1.0 - teach.item.difficulty.abs() / 3.0) * 100.0 * 0.25;
        assert!((teach.priority - expected).abs() < 1e-9);
    }

    #[test]
    fn test_teaching_gates() {
        let config = EngineConfig::default();
        let params = &config.selector;
        let calm = learner(0.0, 0.2);
        let session = SessionState::new(T0);
        assert!(should_teach(&calm, &ItemStates::new(), &session, params));
        assert!(!should_teach(&learner(0.0, 0.5), &ItemStates::new(), &session, params));

        let mut capped = session.clone();
        capped.new_items_taught = 10;
        assert!(!should_teach(&calm, &ItemStates::new(), &capped, params));

        let full: ItemStates = (0..10)
            .map(|i| {
                let id = format!("l{i}");
                let state = initialize_after_teaching(&id, 0.0, T0, &config.memory);
                (id, state)
            })
            .collect();
        assert!(!should_teach(&calm, &full, &session, params));
    }

    #[test]
    fn test_periodic_probe_after_calibration() {
        let params = SelectorParams::default();
        let calm = learner(0.0, 0.2);
        let mut session = SessionState::new(T0);
        session.cards_shown = 10;
        assert!(should_probe(&calm, &session, &params));
        session.cards_shown = 11;
        assert!(!should_probe(&calm, &session, &params));
        assert!(should_probe(&learner(0.0, 0.31), &session, &params));
    }

    #[test]
    fn test_variety_penalties() {
        let params = SelectorParams::default();
        let corpus = corpus();
        let a = corpus.get("w01").unwrap();
        let b = corpus.get("w02").unwrap();
        let mut candidates = vec![
            Candidate { item: a, kind: CardKind::Review, priority: 10.0 },
            Candidate { item: b, kind: CardKind::Probe, priority: 10.0 },
        ];
        let mut session = SessionState::new(T0);
        session.recent_item_ids.push_back("w01".to_string());
        session.recent_card_kinds.extend([
            CardKind::Probe,
            CardKind::Probe,
            CardKind::Review,
            CardKind::Probe,
        ]);
        apply_variety_penalties(&mut candidates, &session, &params);
        assert!((candidates[0].priority - 3.0).abs() < 1e-9);
        assert!((candidates[1].priority - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_pick_best_prefers_earlier_on_tie() {
        let corpus = corpus();
        let a = corpus.get("w01").unwrap();
        let b = corpus.get("w02").unwrap();
        let candidates = vec![
            Candidate { item: a, kind: CardKind::Review, priority: 5.0 },
            Candidate { item: b, kind: CardKind::Probe, priority: 5.0 },
            Candidate { item: b, kind: CardKind::Teaching, priority: f64::NAN },
        ];
        assert_eq!(pick_best(&candidates).map(|c| c.kind), Some(CardKind::Review));
        assert!(pick_best(&[]).is_none());
    }

    #[test]
    fn test_fallback_teaching_ignores_gates() {
        let config = EngineConfig::default();
        let corpus = Corpus::new(vec![item("low", -2.0), item("mid", 0.0)]);
        // "low" is already well exposed, so only "mid" can ever be taught
        let mut items = ItemStates::new();
        let mut low = initialize_after_teaching("low", -2.0, T0 - DAY, &config.memory);
        low.exposure_count = 3;
        low.reinforcements_due.clear();
        items.insert("low".to_string(), low);

        // Calibrating, so teaching is gated off and the probe floor
        // excludes "mid"; the fallback still respects the teaching floor.
        let session = SessionState::new(T0);
        let card = select_next_card(
            &learner(2.0, 1.0),
            &items,
            &session,
            &corpus,
            &DistractorPool::default(),
            T0,
            &config,
            &mut rng(),
        );
        assert!(card.is_none(), "mid is below the teaching floor for θ = 2.0");

        let card = select_next_card(
            &learner(1.0, 1.0),
            &items,
            &session,
            &corpus,
            &DistractorPool::default(),
            T0,
            &config,
            &mut rng(),
        )
        .unwrap();
        assert_eq!(card.kind, CardKind::Teaching);
        assert_eq!(card.item_id(), "mid");
    }

    #[test]
    fn test_selection_is_reproducible() {
        let config = EngineConfig::default();
        let corpus = corpus();
        let pick = |seed: u64| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            select_next_card(
                &learner(0.0, 0.2),
                &ItemStates::new(),
                &SessionState::new(T0),
                &corpus,
                &DistractorPool::default(),
                T0,
                &config,
                &mut rng,
            )
            .map(|c| (c.kind, c.item.id, c.options))
        };
        assert_eq!(pick(9), pick(9));
    }
}
