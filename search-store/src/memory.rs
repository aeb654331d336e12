use crate::BulkFailure;
use crate::BulkOutcome;
use crate::IndexCategory;
use crate::Result;
use crate::SearchBackend;
use crate::SearchStoreError;
use crate::alias_index;
use crate::eval::Evaluator;
use crate::eval::compare_values;
use crate::eval::values_at;
use crate::query::SearchHit;
use crate::query::SearchRequest;
use crate::query::SearchResults;
use crate::query::SortOrder;
use crate::version_index;
use async_trait::async_trait;
use corpus_model::VersionId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering as AtomicOrdering;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;

pub const DEFAULT_MAX_CLAUSE_COUNT: usize = 1024;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    indices: BTreeMap<String, BTreeMap<String, Value>>,
    /// Alias index name to the concrete index it points at.
    aliases: BTreeMap<String, String>,
    next_auto_id: u64,
}

impl StoreState {
    fn resolve<'a>(&'a self, index: &'a str) -> &'a str {
        self.aliases.get(index).map(String::as_str).unwrap_or(index)
    }

    fn index(&self, index: &str) -> Option<&BTreeMap<String, Value>> {
        self.indices.get(self.resolve(index))
    }

    fn index_mut(&mut self, index: &str) -> &mut BTreeMap<String, Value> {
        let name = self.resolve(index).to_string();
        self.indices.entry(name).or_default()
    }
}

/// Operation counters, for observing backend traffic.
#[derive(Debug, Default)]
pub struct BackendStats {
    writes: AtomicU64,
    reads: AtomicU64,
}

impl BackendStats {
    /// Mutating calls: document writes, expunges and alias updates.
    pub fn writes(&self) -> u64 {
        self.writes.load(AtomicOrdering::Relaxed)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(AtomicOrdering::Relaxed)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

/// Search backend held in memory, optionally persisted as one JSON file
/// rewritten after every mutation.
#[derive(Clone)]
pub struct InMemoryBackend {
    state: Arc<RwLock<StoreState>>,
    path: Option<PathBuf>,
    max_clause_count: usize,
    stats: Arc<BackendStats>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            path: None,
            max_clause_count: DEFAULT_MAX_CLAUSE_COUNT,
            stats: Arc::new(BackendStats::default()),
        }
    }

    /// Opens a persisted backend, starting empty when the file does not exist.
    pub async fn open(path: &Path) -> Result<Self> {
        info!("Opening search store at {}", path.display());
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let state = if tokio::fs::try_exists(path).await? {
            let content = tokio::fs::read(path).await?;
            serde_json::from_slice(&content)?
        } else {
            debug!("No store file at {}, starting fresh", path.display());
            StoreState::default()
        };
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            path: Some(path.to_path_buf()),
            max_clause_count: DEFAULT_MAX_CLAUSE_COUNT,
            stats: Arc::new(BackendStats::default()),
        })
    }

    pub fn with_max_clause_count(mut self, max_clause_count: usize) -> Self {
        self.max_clause_count = max_clause_count.max(1);
        self
    }

    pub fn stats(&self) -> &BackendStats {
        &self.stats
    }

    /// Names of all concrete indices.
    pub async fn index_names(&self) -> Vec<String> {
        self.state.read().await.indices.keys().cloned().collect()
    }

    pub async fn document_count(&self, index: &str) -> usize {
        self.state
            .read()
            .await
            .index(index)
            .map_or(0, BTreeMap::len)
    }

    async fn save_to_disk(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = {
            let state = self.state.read().await;
            serde_json::to_vec(&*state)?
        };
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    fn insert_all(
        state: &mut StoreState,
        index: &str,
        documents: Vec<(Option<String>, Value)>,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        let mut accepted = Vec::with_capacity(documents.len());
        for (id, document) in documents {
            if !document.is_object() {
                outcome.failures.push(BulkFailure {
                    id,
                    reason: "document is not a JSON object".to_string(),
                });
                continue;
            }
            let id = match id {
                Some(id) => id,
                None => {
                    state.next_auto_id += 1;
                    format!("auto-{}", state.next_auto_id)
                }
            };
            accepted.push((id, document));
        }
        let target = state.index_mut(index);
        outcome.indexed = accepted.len();
        target.extend(accepted);
        outcome
    }

    async fn bulk_insert(
        &self,
        index: &str,
        documents: Vec<(Option<String>, Value)>,
    ) -> Result<BulkOutcome> {
        self.stats.record_write();
        let count = documents.len();
        let outcome = {
            let mut state = self.state.write().await;
            Self::insert_all(&mut state, index, documents)
        };
        debug!("Bulk indexed {}/{count} documents into {index}", outcome.indexed);
        self.save_to_disk().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn index_document(&self, index: &str, id: Option<&str>, document: Value) -> Result<()> {
        let outcome = self
            .bulk_insert(index, vec![(id.map(str::to_string), document)])
            .await?;
        match outcome.failures.into_iter().next() {
            Some(failure) => Err(SearchStoreError::BulkRejected {
                index: index.to_string(),
                reason: failure.reason,
            }),
            None => Ok(()),
        }
    }

    async fn bulk_index(&self, index: &str, documents: Vec<Value>) -> Result<BulkOutcome> {
        let documents = documents.into_iter().map(|doc| (None, doc)).collect();
        self.bulk_insert(index, documents).await
    }

    async fn bulk_index_with_ids(
        &self,
        index: &str,
        documents: Vec<(String, Value)>,
    ) -> Result<BulkOutcome> {
        let documents = documents
            .into_iter()
            .map(|(id, doc)| (Some(id), doc))
            .collect();
        self.bulk_insert(index, documents).await
    }

    async fn has_index(&self, index: &str) -> Result<bool> {
        Ok(self.state.read().await.index(index).is_some())
    }

    async fn expunge_index(&self, index: &str) -> Result<bool> {
        self.stats.record_write();
        let existed = {
            let mut state = self.state.write().await;
            let existed = state.indices.remove(index).is_some();
            state.aliases.retain(|_, target| target.as_str() != index);
            existed
        };
        if existed {
            info!("Expunged index {index}");
            self.save_to_disk().await?;
        }
        Ok(existed)
    }

    async fn set_alias(
        &self,
        alias: &str,
        version: &VersionId,
        categories: &[IndexCategory],
    ) -> Result<()> {
        self.stats.record_write();
        {
            let mut state = self.state.write().await;
            for category in categories {
                let target = version_index(version, *category);
                if !state.indices.contains_key(&target) {
                    return Err(SearchStoreError::IndexNotFound(target));
                }
            }
            for category in categories {
                state
                    .aliases
                    .insert(alias_index(alias, *category), version_index(version, *category));
            }
        }
        info!("Alias {alias} now points at {version}");
        self.save_to_disk().await
    }

    async fn resolve_alias(
        &self,
        alias: &str,
        category: IndexCategory,
    ) -> Result<Option<VersionId>> {
        let state = self.state.read().await;
        let suffix = format!("_{}", category.as_str());
        Ok(state
            .aliases
            .get(&alias_index(alias, category))
            .and_then(|target| target.strip_suffix(suffix.as_str()))
            .map(VersionId::from))
    }

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Value>> {
        self.stats.record_read();
        let state = self.state.read().await;
        let documents = state
            .index(index)
            .ok_or_else(|| SearchStoreError::IndexNotFound(index.to_string()))?;
        Ok(documents.get(id).cloned())
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResults> {
        self.stats.record_read();
        let count = request.query.clause_count();
        if count > self.max_clause_count {
            return Err(SearchStoreError::TooManyClauses {
                count,
                max: self.max_clause_count,
            });
        }
        let state = self.state.read().await;
        let documents = state
            .index(index)
            .ok_or_else(|| SearchStoreError::IndexNotFound(index.to_string()))?;

        let mut evaluator = Evaluator::new();
        let mut hits: Vec<SearchHit> = documents
            .iter()
            .filter_map(|(id, source)| {
                evaluator
                    .score(&request.query, id, source)
                    .map(|score| SearchHit {
                        id: id.clone(),
                        score,
                        source: source.clone(),
                    })
            })
            .collect();

        if let Some(seed) = request.random_seed {
            hits.sort_by_cached_key(|hit| seeded_rank(seed, &hit.id));
        } else if !request.sort.is_empty() {
            hits.sort_by(|a, b| {
                for field in &request.sort {
                    let ordering = compare_field(&a.source, &b.source, &field.field);
                    let ordering = match field.order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.id.cmp(&b.id)
            });
        } else {
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        let total = hits.len() as u64;
        let hits = hits
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .collect();
        Ok(SearchResults { hits, total })
    }

    fn max_clause_count(&self) -> usize {
        self.max_clause_count
    }
}

fn seeded_rank(seed: u64, id: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(id.as_bytes());
    hasher.finalize().into()
}

/// Missing values sort after present ones in ascending order.
fn compare_field(a: &Value, b: &Value, field: &str) -> Ordering {
    let a = values_at(a, field).into_iter().next();
    let b = values_at(b, field).into_iter().next();
    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
