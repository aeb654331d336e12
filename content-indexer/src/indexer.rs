use crate::config::IndexerConfig;
use crate::corpus::CorpusBuilder;
use crate::corpus::FileCallback;
use crate::error::IndexerError;
use crate::error::Result;
use crate::lock::InFlightBuilds;
use crate::validate::Validator;
use crate::writer::IndexWriter;
use crate::writer::WriteStats;
use corpus_model::IndexMetadata;
use corpus_model::VersionId;
use corpus_search_store::IndexCategory;
use corpus_search_store::SearchBackend;
use corpus_search_store::version_index;
use corpus_version_store::VersionStore;
use std::sync::Arc;
use tracing::info;
use tracing::warn;

/// Progress callback for indexing operations
pub type ProgressCallback = Arc<dyn Fn(IndexProgress) + Send + Sync>;

/// Indexing progress information
#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub phase: IndexPhase,
    pub current: usize,
    pub total: usize,
    pub current_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Resolving,
    Parsing,
    Validating,
    Writing,
    Complete,
}

/// Statistics about one completed build
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub files_processed: usize,
    pub nodes_indexed: usize,
    pub tags: usize,
    pub problem_records: usize,
    pub errors: usize,
    pub write: WriteStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The version was already complete; nothing was written.
    AlreadyIndexed(VersionId),
    Built { version: VersionId, stats: IndexStats },
}

impl BuildOutcome {
    pub fn version(&self) -> &VersionId {
        match self {
            BuildOutcome::AlreadyIndexed(version) | BuildOutcome::Built { version, .. } => version,
        }
    }
}

/// Turns a snapshot of content files into a version's search indices.
pub struct ContentIndexer {
    config: IndexerConfig,
    store: Arc<dyn VersionStore>,
    backend: Arc<dyn SearchBackend>,
    builds: Arc<InFlightBuilds>,
}

impl ContentIndexer {
    pub fn new(
        config: IndexerConfig,
        store: Arc<dyn VersionStore>,
        backend: Arc<dyn SearchBackend>,
    ) -> Result<Self> {
        Self::with_registry(config, store, backend, InFlightBuilds::new())
    }

    /// Shares an in-flight registry with other indexers in the process.
    pub fn with_registry(
        config: IndexerConfig,
        store: Arc<dyn VersionStore>,
        backend: Arc<dyn SearchBackend>,
        builds: Arc<InFlightBuilds>,
    ) -> Result<Self> {
        config.validate().map_err(IndexerError::Config)?;
        Ok(Self {
            config,
            store,
            backend,
            builds,
        })
    }

    pub fn builds(&self) -> &Arc<InFlightBuilds> {
        &self.builds
    }

    /// Builds the version `reference` names unless it is already complete.
    pub async fn build(
        &self,
        reference: &str,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<BuildOutcome> {
        let report = |phase, current, total, current_file: Option<&str>| {
            if let Some(cb) = &progress_callback {
                cb(IndexProgress {
                    phase,
                    current,
                    total,
                    current_file: current_file.map(str::to_string),
                });
            }
        };

        report(IndexPhase::Resolving, 0, 0, None);
        let version = self
            .store
            .resolve_version(reference)
            .await?
            .ok_or_else(|| IndexerError::VersionNotFound(reference.to_string()))?;
        info!("Resolved {reference} to {version}");

        if self.is_complete(&version).await? {
            info!("{version} is already indexed");
            return Ok(BuildOutcome::AlreadyIndexed(version));
        }

        let _guard = self.builds.acquire(&version)?;
        if self.is_complete(&version).await? {
            info!("{version} was indexed while waiting for the lock");
            return Ok(BuildOutcome::AlreadyIndexed(version));
        }

        let builder = CorpusBuilder::new(self.config.clone());
        let on_file = |current: usize, total: usize, path: &str| {
            report(IndexPhase::Parsing, current, total, Some(path));
        };
        let build = builder
            .build(self.store.as_ref(), &version, Some(&on_file as FileCallback<'_>))
            .await?;
        let corpus = build.corpus;
        let mut problems = build.problems;

        report(IndexPhase::Validating, 0, corpus.documents.len(), None);
        Validator::new(self.config.max_media_bytes).validate(&corpus, &mut problems);

        report(IndexPhase::Writing, 0, corpus.nodes.len(), None);
        let writer = IndexWriter::new(Arc::clone(&self.backend), self.config.batch_size);
        let write = writer.write(&corpus, &problems).await?;

        let stats = IndexStats {
            files_processed: corpus.documents.len(),
            nodes_indexed: write.content_written,
            tags: corpus.tags.len(),
            problem_records: problems.len(),
            errors: problems.error_count(),
            write,
        };
        report(
            IndexPhase::Complete,
            stats.nodes_indexed,
            stats.nodes_indexed,
            None,
        );
        info!(
            "Indexing of {version} complete: {} files, {} nodes, {} errors",
            stats.files_processed, stats.nodes_indexed, stats.errors
        );
        Ok(BuildOutcome::Built { version, stats })
    }

    /// Whether every category exists and the metadata record is sealed.
    pub async fn is_complete(&self, version: &VersionId) -> Result<bool> {
        if !self.backend.is_fully_indexed(version).await? {
            return Ok(false);
        }
        let metadata = self
            .backend
            .get_by_id(
                &version_index(version, IndexCategory::Metadata),
                IndexMetadata::DOCUMENT_ID,
            )
            .await?;
        let Some(metadata) = metadata else {
            return Ok(false);
        };
        match serde_json::from_value::<IndexMetadata>(metadata) {
            Ok(metadata) => Ok(metadata.complete),
            Err(err) => {
                warn!("Unreadable metadata for {version}: {err}");
                Ok(false)
            }
        }
    }

    /// Removes every index of a version. Refused while it is being built.
    pub async fn expunge(&self, version: &VersionId) -> Result<usize> {
        let _guard = self.builds.acquire(version)?;
        let removed = self.backend.expunge_version(version).await?;
        info!("Expunged {removed} indices for {version}");
        Ok(removed)
    }
}
