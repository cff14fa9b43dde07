//! assessrank - assessment recommendations from a free-text hiring need.
//!
//! A catalog of assessments is embedded once into a persistent
//! [redb](https://github.com/cberner/redb) store and searched through an
//! in-memory HNSW graph. The nearest candidates are then handed to a
//! text-generation model, which picks and re-scores the best half. If the
//! model is unavailable or answers with something unusable, the top half of
//! the retrieval order is returned instead.
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use assessrank::{
//!     DataDir, GeminiClient, HttpEmbedder, Recommender, Refiner, Settings, VectorIndex,
//! };
//! use assessrank::model::Query;
//!
//! # async fn run() -> assessrank::Result<()> {
//! let data_dir = DataDir::resolve(None)?;
//! let settings = Settings::load(&data_dir)?;
//!
//! let index = VectorIndex::open_or_seed(
//!     &data_dir.index_db(),
//!     &settings.catalog_path(&data_dir),
//!     HttpEmbedder::new(&settings.embedding)?,
//!     settings.index.clone(),
//!     Duration::from_secs(settings.embedding.timeout_secs),
//! )
//! .await?;
//! let refiner = Refiner::new(
//!     GeminiClient::new(&settings.generation)?,
//!     Duration::from_secs(settings.generation.timeout_secs),
//! );
//! let recommender = Recommender::new(index, refiner, settings.pipeline.max_candidates);
//!
//! for r in recommender.recommend(&Query::new("graduate java developer")).await? {
//!     println!("{:.2} {}", r.score, r.url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod ann;
pub mod catalog;
pub mod cli;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod index_db;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod refiner;
pub mod response;
pub mod server;
pub mod settings;
pub mod vector_index;

#[cfg(test)]
mod test_support;

pub use data_dir::DataDir;
pub use embedding::{Embedder, HttpEmbedder};
pub use error::{Error, Result};
pub use generation::{GeminiClient, Generator};
pub use index_db::IndexDb;
pub use pipeline::Recommender;
pub use refiner::Refiner;
pub use settings::Settings;
pub use vector_index::VectorIndex;
