//! Fakes for integration tests.
//!
//! `src/test_support.rs` is `#[cfg(test)]` and invisible from here, so the
//! keyword embedder is mirrored with the same vocabulary and bias, keeping
//! unit and integration rankings identical. The rest differs on purpose:
//! catalogs are written as on-disk JSON records, and the generator is
//! scripted with a [`Reply`] that only counts calls, since these tests go
//! through the public API and never inspect prompts.

#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use assessrank::{
    Embedder, Generator, Recommender, Refiner, Result, VectorIndex,
    ann::AnnParams,
    error::Error,
};
use serde_json::json;

const VOCABULARY: &[&str] = &[
    "cognitive",
    "personality",
    "numerical",
    "verbal",
    "java",
    "sales",
    "leadership",
    "coding",
];

/// One dimension per vocabulary word plus a constant bias.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl Embedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut v: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect();
                v.push(0.1);
                v
            })
            .collect())
    }
}

pub enum Reply {
    Text(&'static str),
    Down,
}

pub struct ScriptedGenerator {
    pub reply: Reply,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Generator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Down => Err(Error::UpstreamGeneration("connection refused".into())),
        }
    }
}

/// Catalog record in the on-disk format.
pub fn record(url: &str, name: &str, tags: &[&str]) -> serde_json::Value {
    json!({
        "url": url,
        "name": name,
        "description": format!("{name} assessment"),
        "duration": "25 minutes",
        "remote_support": true,
        "adaptive_support": false,
        "test_type": tags,
    })
}

pub fn write_catalog(dir: &Path, records: &[serde_json::Value]) -> PathBuf {
    let path = dir.join("catalog.json");
    std::fs::write(&path, serde_json::to_vec_pretty(records).unwrap()).unwrap();
    path
}

/// Catalog {A: u1 Cognitive, B: u2 Personality}.
pub fn two_item_catalog(dir: &Path) -> PathBuf {
    write_catalog(
        dir,
        &[
            record("u1", "A", &["Cognitive"]),
            record("u2", "B", &["Personality"]),
        ],
    )
}

pub async fn index(dir: &Path, catalog: &Path) -> VectorIndex<KeywordEmbedder> {
    VectorIndex::open_or_seed(
        &dir.join("index.redb"),
        catalog,
        KeywordEmbedder::default(),
        AnnParams::default(),
        Duration::from_secs(5),
    )
    .await
    .unwrap()
}

pub async fn recommender(
    dir: &Path,
    catalog: &Path,
    reply: Reply,
) -> Recommender<KeywordEmbedder, ScriptedGenerator> {
    let refiner = Refiner::new(ScriptedGenerator::new(reply), Duration::from_secs(5));
    Recommender::new(index(dir, catalog).await, refiner, 20)
}
