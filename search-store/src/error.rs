use thiserror::Error;

/// Errors that can occur during search backend operations
#[derive(Debug, Error)]
pub enum SearchStoreError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    /// A query expanded to more leaf clauses than the backend accepts.
    #[error("Query has {count} clauses (maximum {max})")]
    TooManyClauses { count: usize, max: usize },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A bulk write was refused as a whole.
    #[error("Bulk write to {index} rejected: {reason}")]
    BulkRejected { index: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SearchStoreError>;
