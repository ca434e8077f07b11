//! Card Construction
//!
//! Turns a chosen item and card kind into a presentable card. Quiz cards are
//! built in three pure steps so the "exactly four options, exactly one
//! correct" contract holds whatever the corpus looks like:
//!
//! 1. filter: take the item's difficulty band from the distractor pool and
//!    drop glosses that would give the answer away
//! 2. backfill: if fewer than three survive, borrow first glosses from
//!    nearby-difficulty items
//! 3. assemble: shuffle, take three, pad with placeholders, insert the
//!    correct gloss at a uniformly random slot

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::CardParams;
use crate::types::{Card, CardKind, Corpus, DistractorPool, Item, QuizOption};

/// Options on every quiz card
pub const OPTION_COUNT: usize = 4;

const DISTRACTOR_COUNT: usize = OPTION_COUNT - 1;

pub fn create_teaching_card(item: &Item) -> Card {
    Card {
        kind: CardKind::Teaching,
        item: item.clone(),
        options: Vec::new(),
        correct_index: None,
    }
}

/// Build a card of any kind; teaching cards ignore the pool and RNG.
pub fn create_card<R: Rng>(
    item: &Item,
    kind: CardKind,
    corpus: &Corpus,
    pool: &DistractorPool,
    params: &CardParams,
    rng: &mut R,
) -> Card {
    if !kind.is_quiz() {
        return create_teaching_card(item);
    }

    let correct = item
        .primary_gloss()
        .unwrap_or(params.missing_answer.as_str())
        .to_string();

    let filtered = filter_distractors(item, &correct, pool.for_difficulty(item.difficulty));
    let candidates = backfill_distractors(item, &correct, corpus, filtered, params);
    let (options, correct_index) = assemble_options(&correct, candidates, params, rng);

    Card {
        kind,
        item: item.clone(),
        options,
        correct_index: Some(correct_index),
    }
}

/// Drop glosses equal to the answer, naming the item's own word, or whose
/// first word already appears in the answer.
pub fn filter_distractors(item: &Item, correct: &str, candidates: &[String]) -> Vec<String> {
    let word = item.word.to_lowercase();
    let correct_lower = correct.to_lowercase();

    candidates
        .iter()
        .filter(|gloss| {
            let lower = gloss.to_lowercase();
            let first_word = lower.split(' ').next().unwrap_or("");
            gloss.as_str() != correct
                && (word.is_empty() || !lower.contains(&word))
                && !correct_lower.contains(first_word)
        })
        .cloned()
        .collect()
}

/// Top up a short pool with first glosses of other items near the target
/// difficulty. Pools that already hold three distractors are returned as is.
pub fn backfill_distractors(
    item: &Item,
    correct: &str,
    corpus: &Corpus,
    mut pool: Vec<String>,
    params: &CardParams,
) -> Vec<String> {
    if pool.len() >= DISTRACTOR_COUNT {
        return pool;
    }

    let nearby = corpus
        .items()
        .iter()
        .filter(|other| {
            other.id != item.id
                && (other.difficulty - item.difficulty).abs() < params.backfill_radius
                && !other.definitions.is_empty()
        })
        .take(params.backfill_scan);

    for other in nearby {
        if pool.len() >= params.pool_cap {
            break;
        }
        if let Some(gloss) = other.primary_gloss() {
            if gloss != correct && !pool.iter().any(|p| p == gloss) {
                pool.push(gloss.to_string());
            }
        }
    }

    pool
}

/// Shuffle, keep three distractors, pad and insert the answer.
///
/// Returns the four options and the index of the correct one.
pub fn assemble_options<R: Rng>(
    correct: &str,
    mut pool: Vec<String>,
    params: &CardParams,
    rng: &mut R,
) -> (Vec<QuizOption>, usize) {
    pool.shuffle(rng);
    pool.truncate(DISTRACTOR_COUNT);

    if pool.len() < DISTRACTOR_COUNT {
        tracing::debug!(
            available = pool.len(),
            "padding quiz options with placeholders"
        );
    }

    let mut options: Vec<QuizOption> = pool
        .into_iter()
        .map(|text| QuizOption {
            text,
            is_correct: false,
        })
        .collect();
    while options.len() < DISTRACTOR_COUNT {
        options.push(QuizOption {
            text: params.placeholder.clone(),
            is_correct: false,
        });
    }

    let correct_index = rng.gen_range(0..OPTION_COUNT);
    options.insert(
        correct_index,
        QuizOption {
            text: correct.to_string(),
            is_correct: true,
        },
    );

    (options, correct_index)
}
