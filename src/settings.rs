use std::{net::SocketAddr, path::PathBuf};

use serde::Deserialize;

use crate::{
    ann::AnnParams,
    data_dir::DataDir,
    error::{Error, Result},
};

pub const GENERATION_KEY_ENV: &str = "GEMINI_API_KEY";
pub const EMBEDDING_KEY_ENV: &str = "ASSESSRANK_EMBEDDING_API_KEY";
pub const EMBEDDING_URL_ENV: &str = "ASSESSRANK_EMBEDDING_URL";
pub const GENERATION_URL_ENV: &str = "ASSESSRANK_GENERATION_URL";

/// Hard ceiling on how many candidates are ever sent to the refiner.
pub const MAX_CANDIDATES: usize = 20;

/// Runtime configuration, read from `config.toml` in the data directory.
///
/// Every field has a default, so an absent file is equivalent to an empty
/// one. API keys are usually supplied through the environment instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub index: AnnParams,
    pub pipeline: PipelineSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSettings {
    /// Catalog JSON file; defaults to `catalog.json` in the data directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/embeddings".into(),
            model: "sentence-transformers/all-MiniLM-L6-v2".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSettings {
    /// Base URL of the Gemini API.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-1.5-flash".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub max_candidates: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_candidates: MAX_CANDIDATES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
        }
    }
}

impl Settings {
    /// Load `config.toml` from the data directory (if present) and apply
    /// environment overrides.
    pub fn load(data_dir: &DataDir) -> Result<Self> {
        let path = data_dir.config_file();
        let mut settings = if path.exists() {
            Self::from_toml(&std::fs::read_to_string(&path)?)?
        } else {
            Self::default()
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay values from the environment. `lookup` is injectable so tests
    /// don't have to mutate the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(GENERATION_KEY_ENV) {
            self.generation.api_key = Some(key);
        }
        if let Some(key) = lookup(EMBEDDING_KEY_ENV) {
            self.embedding.api_key = Some(key);
        }
        if let Some(url) = lookup(EMBEDDING_URL_ENV) {
            self.embedding.endpoint = url;
        }
        if let Some(url) = lookup(GENERATION_URL_ENV) {
            self.generation.endpoint = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_candidates == 0 {
            return Err(Error::Config(
                "pipeline.max_candidates must be positive".into(),
            ));
        }
        self.index.validate()
    }

    pub fn catalog_path(&self, data_dir: &DataDir) -> PathBuf {
        self.catalog
            .path
            .clone()
            .unwrap_or_else(|| data_dir.default_catalog())
    }
}
