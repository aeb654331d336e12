use crate::error::QueryError;
use crate::error::Result;
use corpus_model::IndexMetadata;
use corpus_model::VersionId;
use corpus_search_store::IndexCategory;
use corpus_search_store::SearchBackend;
use corpus_search_store::version_index;
use corpus_utils_cache::CacheStats;
use corpus_utils_cache::WriteExpiringCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::info;

/// Maps alias names to the version their indices point at.
///
/// Resolutions are cached for a fixed time after they are fetched. A repoint
/// made through [`AliasResolver::set_alias`] drops the cached entry at once;
/// repoints made elsewhere are picked up when the entry expires.
pub struct AliasResolver {
    backend: Arc<dyn SearchBackend>,
    versions: WriteExpiringCache<String, VersionId>,
}

impl AliasResolver {
    pub fn new(backend: Arc<dyn SearchBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            versions: WriteExpiringCache::new(ttl),
        }
    }

    pub async fn resolve(&self, alias: &str) -> Result<VersionId> {
        let key = alias.to_string();
        if let Some(version) = self.versions.get(&key) {
            return Ok(version);
        }
        let version = self
            .backend
            .resolve_alias(alias, IndexCategory::Content)
            .await?
            .ok_or_else(|| QueryError::UnknownAlias(alias.to_string()))?;
        debug!("Alias {alias} resolves to {version}");
        self.versions.insert(key, version.clone());
        Ok(version)
    }

    /// Points every category of `alias` at `version`. The version must be
    /// completely built.
    pub async fn set_alias(&self, alias: &str, version: &VersionId) -> Result<()> {
        if !self.is_complete(version).await? {
            return Err(QueryError::IncompleteVersion(version.clone()));
        }
        self.backend
            .set_alias(alias, version, &IndexCategory::ALL)
            .await?;
        self.versions.invalidate(&alias.to_string());
        info!("Alias {alias} now points at {version}");
        Ok(())
    }

    /// Forgets the cached resolution of `alias`.
    pub fn invalidate(&self, alias: &str) {
        self.versions.invalidate(&alias.to_string());
    }

    pub fn clear(&self) {
        self.versions.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.versions.stats()
    }

    async fn is_complete(&self, version: &VersionId) -> Result<bool> {
        if !self.backend.is_fully_indexed(version).await? {
            return Ok(false);
        }
        let Some(metadata) = self
            .backend
            .get_by_id(
                &version_index(version, IndexCategory::Metadata),
                IndexMetadata::DOCUMENT_ID,
            )
            .await?
        else {
            return Ok(false);
        };
        let metadata: IndexMetadata = serde_json::from_value(metadata)?;
        Ok(metadata.complete)
    }
}
