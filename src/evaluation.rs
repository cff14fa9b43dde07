//! Offline precision/recall evaluation of the recommendation pipeline.

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    generation::Generator,
    model::Query,
    pipeline::Recommender,
};

/// One labelled query.
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub query: String,
    pub relevant_assessments: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub predicted: Vec<String>,
    pub relevant: Vec<String>,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryFailure {
    pub query: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub k: usize,
    pub results: Vec<QueryResult>,
    pub failures: Vec<QueryFailure>,
    /// `None` when no query succeeded.
    pub mean_precision: Option<f64>,
    pub mean_recall: Option<f64>,
}

/// Read a test set: a JSON array of `{query, relevant_assessments}`.
pub fn load_test_set(path: &Path) -> Result<Vec<TestCase>> {
    let data_load = |reason: String| Error::DataLoad {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| data_load(e.to_string()))?;
    let cases: Vec<TestCase> =
        serde_json::from_slice(&bytes).map_err(|e| data_load(e.to_string()))?;
    if cases.is_empty() {
        return Err(data_load("test set is empty".into()));
    }
    Ok(cases)
}

/// Canonical form for comparing catalog URLs.
///
/// ```
/// use assessrank::evaluation::normalize_url;
///
/// assert_eq!(normalize_url(" https://Example.com/a/ "), "https://example.com/a");
/// ```
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase().trim_end_matches('/').to_string()
}

fn hits(predicted: &[String], relevant: &HashSet<String>, k: usize) -> usize {
    predicted
        .iter()
        .take(k)
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|url| relevant.contains(*url))
        .count()
}

/// Share of the `k` slots filled with relevant items. Short result lists
/// are penalized.
pub fn precision_at_k(predicted: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits(predicted, relevant, k) as f64 / k as f64
}

/// Share of the relevant items found in the top `k`.
pub fn recall_at_k(predicted: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    hits(predicted, relevant, k) as f64 / relevant.len() as f64
}

/// Run every test case through `recommender` with `top_k = k`.
///
/// Failed queries are recorded and left out of the means.
pub async fn evaluate<E: Embedder, G: Generator>(
    recommender: &Recommender<E, G>,
    cases: &[TestCase],
    k: usize,
) -> EvaluationReport {
    let mut results = Vec::with_capacity(cases.len());
    let mut failures = Vec::new();

    for case in cases {
        let query = Query::new(case.query.clone()).with_top_k(k);
        let recommendations = match recommender.recommend(&query).await {
            Ok(recommendations) => recommendations,
            Err(e) => {
                warn!(query = %case.query, error = %e, "evaluation query failed");
                failures.push(QueryFailure {
                    query: case.query.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let predicted: Vec<String> = recommendations
            .iter()
            .map(|r| normalize_url(r.url()))
            .collect();
        let relevant: Vec<String> = case
            .relevant_assessments
            .iter()
            .map(|u| normalize_url(u))
            .collect();
        let relevant_set: HashSet<String> = relevant.iter().cloned().collect();

        results.push(QueryResult {
            query: case.query.clone(),
            precision: precision_at_k(&predicted, &relevant_set, k),
            recall: recall_at_k(&predicted, &relevant_set, k),
            predicted,
            relevant,
        });
    }

    let mean = |metric: fn(&QueryResult) -> f64| {
        (!results.is_empty())
            .then(|| results.iter().map(metric).sum::<f64>() / results.len() as f64)
    };
    let mean_precision = mean(|r| r.precision);
    let mean_recall = mean(|r| r.recall);

    info!(
        queries = cases.len(),
        failed = failures.len(),
        mean_precision = mean_precision.unwrap_or(0.0),
        mean_recall = mean_recall.unwrap_or(0.0),
        "evaluation finished"
    );

    EvaluationReport {
        k,
        results,
        failures,
        mean_precision,
        mean_recall,
    }
}

impl std::fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for r in &self.results {
            writeln!(f, "Query: {}", r.query)?;
            writeln!(f, "  Predicted: {}", r.predicted.join(", "))?;
            writeln!(f, "  Relevant:  {}", r.relevant.join(", "))?;
            writeln!(f, "  Precision@{}: {:.2}", self.k, r.precision)?;
            writeln!(f, "  Recall@{}: {:.2}", self.k, r.recall)?;
        }
        for failure in &self.failures {
            writeln!(f, "Failed: {} ({})", failure.query, failure.error)?;
        }
        match (self.mean_precision, self.mean_recall) {
            (Some(p), Some(r)) => {
                writeln!(f, "\nMean Precision@{}: {p:.2}", self.k)?;
                write!(f, "Mean Recall@{}: {r:.2}", self.k)
            }
            _ => write!(f, "\nNo query succeeded."),
        }
    }
}
