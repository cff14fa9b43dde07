//! Deterministic stand-ins for the network boundaries, for unit tests.
//!
//! `tests/common/mod.rs` mirrors [`KeywordEmbedder`]; keep the two in step.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    generation::Generator,
    model::{Item, ScoredItem},
};

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

/// Bag-of-keywords embedder: one dimension per vocabulary word plus a
/// constant bias dimension so no text maps to the zero vector.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        v.push(0.1);
        v
    }
}

impl Embedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Embedder that always fails.
pub struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn model_id(&self) -> &str {
        "broken"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::EmbeddingService("connection refused".into()))
    }
}

/// Generator replaying a fixed reply (or failure) and recording prompts.
pub struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply
            .clone()
            .map_err(Error::UpstreamGeneration)
    }
}

pub fn item(url: &str, tags: &[&str]) -> Item {
    Item {
        url: url.into(),
        name: format!("Assessment {url}"),
        description: format!("Description of {url}"),
        duration: "30 minutes".into(),
        remote_support: true,
        adaptive_support: false,
        test_type: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn scored(url: &str, score: f32) -> ScoredItem {
    ScoredItem::new(item(url, &["Cognitive"]), score)
}
