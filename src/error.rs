use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Which half of the recommendation pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieval,
    Refinement,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Retrieval => f.write_str("retrieval"),
            Stage::Refinement => f.write_str("refinement"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("failed to load catalog {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },

    #[error("catalog record {index} is invalid: {reason}")]
    RecordValidation { index: usize, reason: String },

    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    #[error("text generation failed: {0}")]
    UpstreamGeneration(String),

    #[error("could not parse generation response: {0}")]
    ResponseParse(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("recommendation failed during {stage}")]
    Pipeline {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn pipeline(stage: Stage, source: Error) -> Self {
        Error::Pipeline {
            stage,
            source: Box::new(source),
        }
    }
}
