use std::{path::Path, time::Duration};

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info, warn};

use crate::{
    ann::{AnnGraph, AnnParams},
    catalog::{self, CatalogEntry},
    embedding::Embedder,
    error::{Error, Result},
    index_db::IndexDb,
    model::{Item, ScoredItem},
};

/// Result of the startup seeding phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The store was empty and now holds this many items.
    Seeded { items: usize },
    /// The store already had data; nothing was written.
    AlreadyPopulated { items: u64 },
}

/// Persistent approximate-nearest-neighbour index over catalog items.
///
/// Items and their embeddings live in an [`IndexDb`]; the HNSW graph is
/// rebuilt in memory whenever the store is (re)loaded. Once built, the index
/// is read-only and can be shared across requests.
pub struct VectorIndex<E> {
    db: IndexDb,
    embedder: E,
    params: AnnParams,
    embed_timeout: Duration,
    /// Graph node `i` is `items[i]`.
    items: Vec<Item>,
    graph: Option<AnnGraph>,
}

impl<E: Embedder> VectorIndex<E> {
    /// Open the store at `path` and build the graph from whatever it holds.
    pub fn open(
        path: &Path,
        embedder: E,
        params: AnnParams,
        embed_timeout: Duration,
    ) -> Result<Self> {
        params.validate()?;
        let db = IndexDb::open(path)?;

        if let Some(stored) = db.embedding_model()?
            && stored != embedder.model_id()
        {
            warn!(
                stored = %stored,
                configured = %embedder.model_id(),
                "index was built with a different embedding model"
            );
        }

        let mut index = Self {
            db,
            embedder,
            params,
            embed_timeout,
            items: Vec::new(),
            graph: None,
        };
        index.reload()?;
        Ok(index)
    }

    /// Open the store and seed it from `catalog` if it is empty.
    ///
    /// This is the single startup phase; run it before the index is shared.
    pub async fn open_or_seed(
        path: &Path,
        catalog: &Path,
        embedder: E,
        params: AnnParams,
        embed_timeout: Duration,
    ) -> Result<Self> {
        let mut index = Self::open(path, embedder, params, embed_timeout)?;
        index.seed(catalog).await?;
        Ok(index)
    }

    /// Load the catalog into an empty store. A populated store is left
    /// untouched.
    pub async fn seed(&mut self, catalog_path: &Path) -> Result<SeedOutcome> {
        let existing = self.db.len()?;
        if existing > 0 {
            debug!(items = existing, "index already populated, skipping seed");
            return Ok(SeedOutcome::AlreadyPopulated { items: existing });
        }

        let entries = catalog::load_catalog(catalog_path)?;
        let embeddings = self.embed_catalog(&entries).await?;

        let rows: Vec<(CatalogEntry, Vec<f32>)> =
            entries.into_iter().zip(embeddings).collect();

        if !self.db.seed_if_empty(self.embedder.model_id(), &rows)? {
            // Another initializer got there between our check and the write.
            let items = self.db.len()?;
            warn!(items, "index was populated concurrently, discarding seed");
            self.reload()?;
            return Ok(SeedOutcome::AlreadyPopulated { items });
        }

        self.reload()?;
        info!(items = rows.len(), model = %self.embedder.model_id(), "seeded index");
        Ok(SeedOutcome::Seeded { items: rows.len() })
    }

    async fn embed_catalog(
        &self,
        entries: &[CatalogEntry],
    ) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> =
            entries.iter().map(CatalogEntry::document_text).collect();

        let batches: Vec<Vec<Vec<f32>>> =
            stream::iter(texts.chunks(self.params.batch_size))
                .map(|chunk| self.embed_checked(chunk))
                .buffered(self.params.num_threads)
                .try_collect()
                .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    /// Embed under the configured timeout and insist on one vector per text.
    async fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors =
            tokio::time::timeout(self.embed_timeout, self.embedder.embed(texts))
                .await
                .map_err(|_| {
                    Error::EmbeddingService(format!(
                        "timed out after {:?}",
                        self.embed_timeout
                    ))
                })??;

        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingService(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    fn reload(&mut self) -> Result<()> {
        let stored = self.db.load_all()?;
        let Some(dimension) = stored.first().map(|e| e.embedding.len()) else {
            self.items.clear();
            self.graph = None;
            return Ok(());
        };

        let mut items = Vec::with_capacity(stored.len());
        let mut vectors = Vec::with_capacity(stored.len());
        for entry in stored {
            items.push(entry.item);
            vectors.push(entry.embedding);
        }

        self.graph = Some(AnnGraph::build(dimension, &self.params, vectors)?);
        self.items = items;
        Ok(())
    }

    /// The `k` catalog items most similar to `query`, best first.
    ///
    /// Scores are `1 - cosine distance`, clamped into `[0, 1]`. Equal scores
    /// keep the order the graph returned them in.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredItem>> {
        let Some(graph) = &self.graph else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embed_checked(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                Error::EmbeddingService("no embedding returned for query".into())
            })?;

        let neighbors = graph.nearest(&query_embedding, k)?;

        let mut results: Vec<ScoredItem> = neighbors
            .into_iter()
            .filter_map(|(node, distance)| {
                let item = self.items.get(node)?;
                Some(ScoredItem::new(item.clone(), (1.0 - distance).clamp(0.0, 1.0)))
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(k, returned = results.len(), "vector search");
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.graph.as_ref().map(AnnGraph::dimension)
    }

    pub fn db(&self) -> &IndexDb {
        &self.db
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }
}

impl<E> std::fmt::Debug for VectorIndex<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("items", &self.items.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
