use corpus_model::VersionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unknown alias: {0}")]
    UnknownAlias(String),

    #[error("Version {0} is not fully indexed")]
    IncompleteVersion(VersionId),

    #[error("Search store error: {0}")]
    SearchStore(#[from] corpus_search_store::SearchStoreError),

    #[error("Unreadable document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;
