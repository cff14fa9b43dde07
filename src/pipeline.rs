use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
    embedding::Embedder,
    error::{Error, Result, Stage},
    generation::Generator,
    model::{Query, ScoredItem},
    refiner::Refiner,
    vector_index::VectorIndex,
};

/// Retrieval followed by refinement.
#[derive(Debug)]
pub struct Recommender<E, G> {
    index: VectorIndex<E>,
    refiner: Refiner<G>,
    max_candidates: usize,
}

impl<E: Embedder, G: Generator> Recommender<E, G> {
    pub fn new(index: VectorIndex<E>, refiner: Refiner<G>, max_candidates: usize) -> Self {
        Self {
            index,
            refiner,
            max_candidates,
        }
    }

    pub fn index(&self) -> &VectorIndex<E> {
        &self.index
    }

    pub fn refiner(&self) -> &Refiner<G> {
        &self.refiner
    }

    /// How many candidates retrieval fetches for a request of `top_k`.
    ///
    /// Twice `top_k`, so that refinement keeping half lands back on `top_k`.
    pub fn candidate_count(&self, top_k: usize) -> usize {
        self.max_candidates.min(top_k.saturating_mul(2))
    }

    /// Full recommendation: retrieve candidates, refine them, and return
    /// the survivors best first.
    pub async fn recommend(&self, query: &Query) -> Result<Vec<ScoredItem>> {
        let candidates = self.retrieve(query).await?;
        let total = candidates.len();
        let arena: HashSet<String> = candidates.iter().map(|c| c.url().to_string()).collect();

        let mut refined = self.refiner.refine(&query.text, candidates).await;
        check_refined(&refined, &arena, total)
            .map_err(|e| Error::pipeline(Stage::Refinement, e))?;

        sort_by_score(&mut refined);
        info!(candidates = total, returned = refined.len(), "recommendation served");
        Ok(refined)
    }

    /// Retrieval only, best first.
    pub async fn retrieve(&self, query: &Query) -> Result<Vec<ScoredItem>> {
        query.validate()?;
        let k = self.candidate_count(query.top_k);
        let candidates = self
            .index
            .search(&query.text, k)
            .await
            .map_err(|e| Error::pipeline(Stage::Retrieval, e))?;
        debug!(k, found = candidates.len(), "retrieved candidates");
        Ok(candidates)
    }
}

fn check_refined(refined: &[ScoredItem], arena: &HashSet<String>, total: usize) -> Result<()> {
    let limit = total / 2;
    if refined.len() > limit {
        return Err(Error::ResponseParse(format!(
            "refiner returned {} items, limit is {limit}",
            refined.len()
        )));
    }
    for item in refined {
        if !arena.contains(item.url()) {
            return Err(Error::ResponseParse(format!(
                "refiner returned unknown url {}",
                item.url()
            )));
        }
        if !(0.0..=1.0).contains(&item.score) {
            return Err(Error::ResponseParse(format!(
                "refiner returned score {} for {}",
                item.score,
                item.url()
            )));
        }
    }
    Ok(())
}

/// Stable sort, best first.
fn sort_by_score(items: &mut [ScoredItem]) {
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
