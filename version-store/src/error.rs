use thiserror::Error;

#[derive(Error, Debug)]
pub enum VersionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Unknown version: {0}")]
    UnknownVersion(String),

    #[error("Malformed store output: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, VersionStoreError>;
