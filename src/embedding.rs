use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    settings::EmbeddingSettings,
};

/// Turns text into fixed-length vectors.
///
/// Implementations must be deterministic for a given model version: the
/// index embeds the catalog once and compares later queries against it.
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, recorded alongside the index.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input, in order.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint, such
/// as a text-embeddings-inference server.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| {
                Error::Config(format!("cannot build embedding client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::EmbeddingService(format!("HTTP error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingService(format!(
                "service returned {status}: {body}"
            )));
        }

        let mut parsed: EmbedResponse = response.json().await.map_err(|e| {
            Error::EmbeddingService(format!("malformed response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(Error::EmbeddingService(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The protocol allows out-of-order entries tagged with `index`.
        if parsed.data.iter().all(|d| d.index.is_some()) {
            parsed.data.sort_by_key(|d| d.index);
        }

        debug!(count = texts.len(), model = %self.model, "embedded batch");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`.
///
/// A zero vector has no direction; its distance to anything is `1.0`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}
