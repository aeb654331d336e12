use crate::corpus::Corpus;
use crate::error::IndexerError;
use crate::error::Result;
use corpus_model::ContentNode;
use corpus_model::IndexMetadata;
use corpus_model::ProblemMap;
use corpus_model::TAGS_DOCUMENT_ID;
use corpus_model::VersionId;
use corpus_search_store::BulkOutcome;
use corpus_search_store::IndexCategory;
use corpus_search_store::SearchBackend;
use corpus_search_store::version_index;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Counts from one write of a version.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub content_written: usize,
    pub units_written: usize,
    pub problems_written: usize,
    /// Units and problems dropped because they could not be written.
    pub skipped: usize,
}

/// Writes a validated corpus into the version's indices.
pub struct IndexWriter {
    backend: Arc<dyn SearchBackend>,
    batch_size: usize,
}

impl IndexWriter {
    pub fn new(backend: Arc<dyn SearchBackend>, batch_size: usize) -> Self {
        Self {
            backend,
            batch_size: batch_size.max(1),
        }
    }

    /// Replaces whatever exists for the corpus's version. Any failure that
    /// leaves the version unusable expunges it before returning.
    pub async fn write(&self, corpus: &Corpus, problems: &ProblemMap) -> Result<WriteStats> {
        let version = &corpus.version;
        let removed = self.backend.expunge_version(version).await?;
        if removed > 0 {
            info!("Removed {removed} partial indices for {version}");
        }

        match self.write_and_verify(corpus, problems).await {
            Ok(stats) => {
                info!(
                    "Wrote {version}: {} content, {} units, {} problem records, {} skipped",
                    stats.content_written, stats.units_written, stats.problems_written, stats.skipped
                );
                Ok(stats)
            }
            Err(err) => {
                warn!("Writing {version} failed, expunging: {err}");
                self.backend.expunge_version(version).await?;
                Err(err)
            }
        }
    }

    async fn write_and_verify(&self, corpus: &Corpus, problems: &ProblemMap) -> Result<WriteStats> {
        let stats = self.write_all(corpus, problems).await?;
        self.verify(&corpus.version).await?;
        let metadata = IndexMetadata::new(
            corpus.version.clone(),
            stats.content_written,
            problems.problem_count(),
        )
        .sealed();
        self.write_metadata(&metadata).await?;
        Ok(stats)
    }

    async fn write_all(&self, corpus: &Corpus, problems: &ProblemMap) -> Result<WriteStats> {
        let version = &corpus.version;
        let mut stats = WriteStats::default();

        let metadata = IndexMetadata::new(
            version.clone(),
            corpus.nodes.len(),
            problems.problem_count(),
        );
        self.write_metadata(&metadata).await?;

        self.backend
            .index_document(
                &version_index(version, IndexCategory::Tags),
                Some(TAGS_DOCUMENT_ID),
                json!({ "tags": corpus.tags }),
            )
            .await?;

        for (category, lexicon) in [
            (IndexCategory::Units, &corpus.units),
            (IndexCategory::PublishedUnits, &corpus.published_units),
        ] {
            let documents = lexicon
                .documents()
                .into_iter()
                .filter_map(|doc| {
                    let id = doc.cleaned_unit.clone();
                    to_document(&doc, &id, &mut stats.skipped).map(|value| (id, value))
                })
                .collect();
            let index = version_index(version, category);
            let outcome = self.backend.bulk_index_with_ids(&index, documents).await?;
            stats.units_written += self.tolerate(&index, outcome, &mut stats.skipped);
        }

        let documents = problems
            .documents()
            .iter()
            .filter_map(|doc| to_document(doc, &doc.path, &mut stats.skipped))
            .collect();
        let index = version_index(version, IndexCategory::ContentErrors);
        let outcome = self.backend.bulk_index(&index, documents).await?;
        stats.problems_written = self.tolerate(&index, outcome, &mut stats.skipped);

        let index = version_index(version, IndexCategory::Content);
        let nodes: Vec<(&String, &ContentNode)> = corpus.nodes.iter().collect();
        if nodes.is_empty() {
            self.backend.bulk_index_with_ids(&index, Vec::new()).await?;
        }
        for batch in nodes.chunks(self.batch_size) {
            let mut documents = Vec::with_capacity(batch.len());
            for (id, node) in batch {
                documents.push(((*id).clone(), serde_json::to_value(node)?));
            }
            let outcome = self.backend.bulk_index_with_ids(&index, documents).await?;
            if !outcome.is_complete() {
                for failure in &outcome.failures {
                    warn!("Content {:?} rejected: {}", failure.id, failure.reason);
                }
                return Err(IndexerError::BulkWrite {
                    index,
                    failed: outcome.failures.len(),
                });
            }
            stats.content_written += outcome.indexed;
            debug!("Wrote {}/{} content documents", stats.content_written, nodes.len());
        }
        Ok(stats)
    }

    async fn write_metadata(&self, metadata: &IndexMetadata) -> Result<()> {
        self.backend
            .index_document(
                &version_index(&metadata.version, IndexCategory::Metadata),
                Some(IndexMetadata::DOCUMENT_ID),
                serde_json::to_value(metadata)?,
            )
            .await?;
        Ok(())
    }

    /// Fails when any category is missing after a write.
    async fn verify(&self, version: &VersionId) -> Result<()> {
        let missing = self.backend.missing_categories(version).await?;
        if missing.is_empty() {
            return Ok(());
        }
        Err(IndexerError::IncompleteIndex {
            version: version.clone(),
            missing: missing
                .into_iter()
                .map(|category| category.as_str().to_string())
                .collect(),
        })
    }

    fn tolerate(&self, index: &str, outcome: BulkOutcome, skipped: &mut usize) -> usize {
        for failure in &outcome.failures {
            warn!(
                "Skipping document {:?} in {index}: {}",
                failure.id, failure.reason
            );
        }
        *skipped += outcome.failures.len();
        outcome.indexed
    }
}

fn to_document<T: Serialize>(item: &T, label: &str, skipped: &mut usize) -> Option<Value> {
    match serde_json::to_value(item) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Skipping {label}: {err}");
            *skipped += 1;
            None
        }
    }
}
