use corpus_model::VersionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    /// The reference names no version. Retrying cannot help.
    #[error("Version not found: {0}")]
    VersionNotFound(String),

    /// Another build of the same version is in flight. Back off.
    #[error("Version {0} is already being built")]
    VersionLocked(VersionId),

    #[error("Version store error: {0}")]
    VersionStore(#[from] corpus_version_store::VersionStoreError),

    #[error("Search store error: {0}")]
    SearchStore(#[from] corpus_search_store::SearchStoreError),

    #[error("Bulk write to {index} failed for {failed} documents")]
    BulkWrite { index: String, failed: usize },

    #[error("Version {version} is missing indices after writing: {missing:?}")]
    IncompleteIndex {
        version: VersionId,
        missing: Vec<String>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl IndexerError {
    /// Whether re-invoking the whole build may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexerError::VersionNotFound(_)
            | IndexerError::VersionLocked(_)
            | IndexerError::Config(_) => false,
            IndexerError::VersionStore(_)
            | IndexerError::SearchStore(_)
            | IndexerError::BulkWrite { .. }
            | IndexerError::IncompleteIndex { .. }
            | IndexerError::Serialization(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
