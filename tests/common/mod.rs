#![allow(dead_code)]

use std::collections::HashMap;

use vocab_engine::{Corpus, Definition, DistractorPool, Item};

pub const NOW: i64 = 1_700_000_000_000;
pub const MINUTE: i64 = 60_000;
pub const DAY: i64 = 24 * 60 * MINUTE;

pub fn item(id: &str, difficulty: f64, gloss: &str) -> Item {
    Item {
        id: id.to_string(),
        word: id.to_string(),
        rank: 0,
        difficulty,
        pos: vec!["noun".to_string()],
        definitions: if gloss.is_empty() {
            vec![]
        } else {
            vec![Definition {
                pos: "noun".to_string(),
                def: gloss.to_string(),
                examples: vec![],
            }]
        },
        ipa: None,
        sentences: vec![],
        cefr: None,
    }
}

/// `count` items with difficulties evenly spread over [-3, 3].
pub fn ladder_corpus(count: usize) -> Corpus {
    let step = if count > 1 { 6.0 / (count - 1) as f64 } else { 0.0 };
    let items = (0..count)
        .map(|i| {
            let difficulty = -3.0 + step * i as f64;
            item(
                &format!("word{:03}", i),
                difficulty,
                &format!("sense-{:03} of a term", i),
            )
        })
        .collect();
    Corpus::new(items)
}

/// Bucket every item's first gloss into its difficulty band.
pub fn pool_from(corpus: &Corpus) -> DistractorPool {
    let mut bands: HashMap<String, Vec<String>> = HashMap::new();
    for item in corpus.items() {
        if let Some(gloss) = item.primary_gloss() {
            bands
                .entry(DistractorPool::band_key(item.difficulty))
                .or_default()
                .push(gloss.to_string());
        }
    }
    DistractorPool::new(bands)
}
