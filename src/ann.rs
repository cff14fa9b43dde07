//! Approximate nearest-neighbour search over item embeddings.
//!
//! Wraps the `hnsw` crate's hierarchical navigable small-world graph with a
//! cosine metric. The graph lives in memory and is rebuilt from the index
//! database on startup; only the vectors themselves are persisted.

use hnsw::{Hnsw, Params, Searcher};
use rand_pcg::Pcg64;
use serde::Deserialize;
use space::{Metric, Neighbor};

use crate::{
    embedding::cosine_distance,
    error::{Error, Result},
};

/// Tunables for the approximate search.
///
/// Larger `ef_search` explores more of the graph per query, trading latency
/// for recall. `ef_construction` does the same at build time. The per-node
/// fan-out is a type parameter of [`AnnGraph`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnParams {
    pub ef_construction: usize,
    pub ef_search: usize,
    /// Maximum number of embedding batches in flight while seeding.
    pub num_threads: usize,
    /// Texts per embedding request while seeding.
    pub batch_size: usize,
}

impl Default for AnnParams {
    fn default() -> Self {
        Self {
            ef_construction: 100,
            ef_search: 10,
            num_threads: 4,
            batch_size: 100,
        }
    }
}

impl AnnParams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ef_construction", self.ef_construction),
            ("ef_search", self.ef_search),
            ("num_threads", self.num_threads),
            ("batch_size", self.batch_size),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("index.{name} must be positive")));
            }
        }
        Ok(())
    }
}

/// Cosine distance quantized onto `u32`, as the graph needs a totally
/// ordered unit. `[0, 2]` maps onto `[0, u32::MAX]`.
struct CosineDistance;

const DISTANCE_SCALE: f32 = u32::MAX as f32 / 2.0;

impl Metric<Box<[f32]>> for CosineDistance {
    type Unit = u32;

    fn distance(&self, a: &Box<[f32]>, b: &Box<[f32]>) -> u32 {
        (cosine_distance(a, b) * DISTANCE_SCALE) as u32
    }
}

/// HNSW graph with `M` links per node on upper layers and `M0` on layer 0.
pub struct AnnGraph<const M: usize = 16, const M0: usize = 32> {
    graph: Hnsw<CosineDistance, Box<[f32]>, Pcg64, M, M0>,
    dimension: usize,
    ef_search: usize,
}

impl<const M: usize, const M0: usize> AnnGraph<M, M0> {
    pub fn new(dimension: usize, params: &AnnParams) -> Self {
        Self {
            graph: Hnsw::new_params(
                CosineDistance,
                Params::new().ef_construction(params.ef_construction),
            ),
            dimension,
            ef_search: params.ef_search,
        }
    }

    /// Build a graph from vectors; node `i` corresponds to `vectors[i]`.
    pub fn build(
        dimension: usize,
        params: &AnnParams,
        vectors: impl IntoIterator<Item = Vec<f32>>,
    ) -> Result<Self> {
        let mut graph = Self::new(dimension, params);
        let mut searcher = Searcher::default();
        for vector in vectors {
            graph.insert(vector, &mut searcher)?;
        }
        Ok(graph)
    }

    fn insert(
        &mut self,
        vector: Vec<f32>,
        searcher: &mut Searcher<u32>,
    ) -> Result<usize> {
        self.check_dimension(vector.len())?;
        Ok(self.graph.insert(vector.into_boxed_slice(), searcher))
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Up to `k` approximate nearest nodes as `(node, cosine distance)`,
    /// nearest first.
    ///
    /// Exploration is `max(ef_search, k)` so a large `k` is never starved.
    /// Takes `&self`: each call uses its own searcher, so concurrent queries
    /// need no locking.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        self.check_dimension(query.len())?;

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut searcher = Searcher::default();
        let mut neighbors = vec![
            Neighbor {
                index: !0,
                distance: !0,
            };
            k
        ];
        let query: Box<[f32]> = query.into();
        let ef = self.ef_search.max(k);
        let found = self.graph.nearest(&query, ef, &mut searcher, &mut neighbors);

        Ok(found
            .iter()
            .filter(|n| n.index != !0)
            .map(|n| (n.index, cosine_distance(&query, self.graph.feature(n.index))))
            .collect())
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(Error::EmbeddingService(format!(
                "embedding dimension mismatch: index has {}, got {actual}",
                self.dimension
            )));
        }
        Ok(())
    }
}
