//! Read access to frozen content snapshots.
//!
//! A [`VersionStore`] resolves a human reference (branch, tag, commit) to an
//! immutable [`VersionId`] and serves the files of that snapshot. Paths are
//! `/`-separated and relative to the snapshot root; every listing is sorted
//! by path so callers see a deterministic order.

mod error;
mod git;
mod memory;

use async_trait::async_trait;
use corpus_model::VersionId;
use wildmatch::WildMatch;

pub use error::Result;
pub use error::VersionStoreError;
pub use git::GitVersionStore;
pub use memory::InMemoryVersionStore;

/// One file of a snapshot with its contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// One file of a snapshot without its contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
}

#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Resolves a reference to a version, or `None` when it names nothing.
    async fn resolve_version(&self, reference: &str) -> Result<Option<VersionId>>;

    /// Files whose path matches `pattern`, sorted by path.
    async fn list_files(&self, version: &VersionId, pattern: &str) -> Result<Vec<VersionedFile>>;

    async fn read_file(&self, version: &VersionId, path: &str) -> Result<Option<Vec<u8>>>;

    /// Paths and sizes of matching files, sorted by path.
    async fn list_entries(&self, version: &VersionId, pattern: &str) -> Result<Vec<FileEntry>> {
        let files = self.list_files(version, pattern).await?;
        Ok(files
            .into_iter()
            .map(|file| FileEntry {
                size: file.bytes.len() as u64,
                path: file.path,
            })
            .collect())
    }
}

/// Glob match over a whole path; `*` also crosses directory boundaries.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    WildMatch::new(pattern).matches(path)
}
