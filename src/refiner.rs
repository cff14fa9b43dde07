use std::{collections::HashMap, time::Duration};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    generation::Generator,
    model::ScoredItem,
    prompt::refinement_prompt,
    response::{ParseOutcome, extract_rescore, parse_reply},
};

/// Re-ranks retrieval candidates with a text-generation model.
///
/// Never fails: any trouble with the model falls back to the top half of
/// the retrieval order.
#[derive(Debug)]
pub struct Refiner<G> {
    generator: G,
    timeout: Duration,
}

impl<G: Generator> Refiner<G> {
    pub fn new(generator: G, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Number of items kept out of `candidates`.
    pub fn keep_count(candidates: usize) -> usize {
        candidates / 2
    }

    /// Select and re-score half of `candidates`.
    ///
    /// The result holds at most `candidates.len() / 2` items, each one of
    /// the inputs with only its score changed, in the order the model
    /// listed them.
    pub async fn refine(&self, query: &str, candidates: Vec<ScoredItem>) -> Vec<ScoredItem> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let keep = Self::keep_count(candidates.len());

        let reply = match self.ask(query, &candidates, keep).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "refinement unavailable, keeping retrieval order");
                return fallback(candidates, keep);
            }
        };

        match parse_reply(&reply) {
            ParseOutcome::Parsed(elements) => select(&elements, &candidates, keep),
            ParseOutcome::Unparsable => {
                warn!(
                    reply_chars = reply.len(),
                    "refinement reply unparsable, keeping retrieval order"
                );
                fallback(candidates, keep)
            }
        }
    }

    async fn ask(&self, query: &str, candidates: &[ScoredItem], keep: usize) -> Result<String> {
        let prompt = refinement_prompt(query, candidates, keep);
        debug!(candidates = candidates.len(), keep, "requesting refinement");
        tokio::time::timeout(self.timeout, self.generator.generate(&prompt))
            .await
            .map_err(|_| {
                Error::UpstreamGeneration(format!(
                    "no reply within {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
    }
}

fn fallback(mut candidates: Vec<ScoredItem>, keep: usize) -> Vec<ScoredItem> {
    candidates.truncate(keep);
    candidates
}

/// Anchor each parsed element to the candidate with the same URL.
fn select(
    elements: &[serde_json::Value],
    candidates: &[ScoredItem],
    keep: usize,
) -> Vec<ScoredItem> {
    // First occurrence wins, so a repeated url maps to the better-ranked copy.
    let mut arena: HashMap<&str, &ScoredItem> = HashMap::with_capacity(candidates.len());
    for candidate in candidates {
        arena.entry(candidate.url()).or_insert(candidate);
    }
    let mut emitted: Vec<&str> = Vec::with_capacity(keep);
    let mut refined = Vec::with_capacity(keep);

    for (position, element) in elements.iter().enumerate() {
        if refined.len() == keep {
            debug!(extra = elements.len() - position, "ignoring surplus elements");
            break;
        }
        let rescore = match extract_rescore(element) {
            Ok(rescore) => rescore,
            Err(e) => {
                warn!(position, error = %e, "skipping reply element");
                continue;
            }
        };
        let Some((&url, candidate)) = arena.get_key_value(rescore.url.as_str()) else {
            warn!(position, url = %rescore.url, "skipping unknown url");
            continue;
        };
        if emitted.contains(&url) {
            debug!(position, url, "skipping duplicate url");
            continue;
        }
        emitted.push(url);
        refined.push(candidate.rescored(rescore.score));
    }

    if refined.is_empty() && keep > 0 {
        warn!(elements = elements.len(), "refinement reply matched no candidates");
    }
    refined
}
