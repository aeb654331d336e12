use crate::alias::AliasResolver;
use crate::config::QueryConfig;
use crate::error::QueryError;
use crate::error::Result;
use crate::request::FieldMatchRequest;
use crate::site_search::SiteSearchRequest;
use crate::site_search::event_cutoff;
use crate::site_search::site_search_query;
use chrono::DateTime;
use chrono::Utc;
use corpus_model::ContentNode;
use corpus_model::ContentSummary;
use corpus_model::IndexMetadata;
use corpus_model::ProblemDocument;
use corpus_model::ResultsPage;
use corpus_model::TAGS_DOCUMENT_ID;
use corpus_model::UnitDocument;
use corpus_model::VersionId;
use corpus_search_store::BoolQuery;
use corpus_search_store::IndexCategory;
use corpus_search_store::Operator;
use corpus_search_store::Query;
use corpus_search_store::SearchBackend;
use corpus_search_store::SearchRequest;
use corpus_search_store::SearchResults;
use corpus_search_store::SortField;
use corpus_search_store::version_index;
use corpus_utils_cache::AccessExpiringLru;
use corpus_utils_cache::CacheStats;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use std::collections::HashMap;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Identifies one cached read: the operation, the version it ran against and
/// its arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    operation: &'static str,
    version: VersionId,
    arguments: String,
}

impl CacheKey {
    fn new(operation: &'static str, version: &VersionId, arguments: Value) -> Self {
        Self {
            operation,
            version: version.clone(),
            arguments: arguments.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
enum CachedRead {
    Hits(SearchResults),
    Document(Option<Value>),
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCacheStats {
    pub results: CacheStats,
    pub versions: CacheStats,
}

#[derive(Deserialize)]
struct TagsDocument {
    #[serde(default)]
    tags: Vec<String>,
}

/// Read side of the corpus: every lookup is scoped to the version the
/// configured alias points at, restricted by the base filters and cached.
pub struct ContentQueryService {
    config: QueryConfig,
    backend: Arc<dyn SearchBackend>,
    aliases: AliasResolver,
    results: AccessExpiringLru<CacheKey, CachedRead>,
}

impl ContentQueryService {
    pub fn new(config: QueryConfig, backend: Arc<dyn SearchBackend>) -> Result<Self> {
        config.validate().map_err(QueryError::Config)?;

        info!(
            "Initializing query service for alias {} (published only: {})",
            config.alias, config.published_only
        );

        let aliases = AliasResolver::new(Arc::clone(&backend), config.version_cache_ttl());
        let results = AccessExpiringLru::new(config.cache_capacity, config.cache_idle());
        Ok(Self {
            config,
            backend,
            aliases,
            results,
        })
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    /// The version the configured alias currently points at.
    pub async fn current_version(&self) -> Result<VersionId> {
        self.aliases.resolve(&self.config.alias).await
    }

    /// Repoints the configured alias at a completely built version.
    pub async fn publish(&self, version: &VersionId) -> Result<()> {
        self.aliases.set_alias(&self.config.alias, version).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<ContentNode>> {
        let version = self.current_version().await?;
        self.lookup(&version, id).await
    }

    /// Like [`get_by_id`](Self::get_by_id), with related content summaries
    /// filled in from the same version.
    pub async fn get_with_related(&self, id: &str) -> Result<Option<ContentNode>> {
        let version = self.current_version().await?;
        let Some(mut node) = self.lookup(&version, id).await? else {
            return Ok(None);
        };
        self.populate_at(&version, &mut node).await?;
        Ok(Some(node))
    }

    /// Content whose id starts with `prefix`, in id order.
    pub async fn get_by_id_prefix(
        &self,
        prefix: &str,
        from: usize,
        size: usize,
    ) -> Result<ResultsPage<ContentNode>> {
        let version = self.current_version().await?;
        let size = self.page_size(size);
        let index = version_index(&version, IndexCategory::Content);
        let key = CacheKey::new("get_by_id_prefix", &version, json!([prefix, from, size]));
        let results = self
            .cached_search(
                key,
                self.backend
                    .find_by_prefix(&index, "id", prefix, self.base_filters(), from, size),
            )
            .await?;
        decode_page(results)
    }

    /// Content for every id found, in the order the ids were given. Missing
    /// ids are omitted and repeated ids returned once.
    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ContentNode>> {
        let version = self.current_version().await?;
        self.fetch_ids(&version, ids).await
    }

    pub async fn find_by_field_match(
        &self,
        request: &FieldMatchRequest,
    ) -> Result<ResultsPage<ContentNode>> {
        let version = self.current_version().await?;
        let size = self.page_size(request.size);
        let index = version_index(&version, IndexCategory::Content);
        let mut arguments = serde_json::to_value(request)?;
        arguments["size"] = json!(size);
        let key = CacheKey::new("find_by_field_match", &version, arguments);

        let mut filters = self.base_filters();
        filters.extend(request.filters.iter().cloned());
        let results = self
            .cached_search(
                key,
                self.backend.match_search(
                    &index,
                    &request.clauses,
                    request.operator,
                    filters,
                    request.sort.clone(),
                    request.from,
                    size,
                ),
            )
            .await?;
        decode_page(results)
    }

    /// Field/text clauses matched inside each element of the array at
    /// `path`, for example the choices of a question.
    pub async fn find_by_nested_match(
        &self,
        path: &str,
        clauses: &[(String, String)],
        operator: Operator,
        from: usize,
        size: usize,
    ) -> Result<ResultsPage<ContentNode>> {
        let version = self.current_version().await?;
        let size = self.page_size(size);
        let index = version_index(&version, IndexCategory::Content);
        let key = CacheKey::new(
            "find_by_nested_match",
            &version,
            json!([path, clauses, operator, from, size]),
        );
        let results = self
            .cached_search(
                key,
                self.backend.nested_match_search(
                    &index,
                    path,
                    clauses,
                    operator,
                    self.base_filters(),
                    from,
                    size,
                ),
            )
            .await?;
        decode_page(results)
    }

    /// Typo-tolerant search over the configured weighted fields, optionally
    /// restricted to some document types.
    pub async fn fuzzy_search(
        &self,
        text: &str,
        types: &[String],
        from: usize,
        size: usize,
    ) -> Result<ResultsPage<ContentNode>> {
        let version = self.current_version().await?;
        let size = self.page_size(size);
        let index = version_index(&version, IndexCategory::Content);
        let key = CacheKey::new("fuzzy_search", &version, json!([text, types, from, size]));

        let mut filters = self.base_filters();
        if !types.is_empty() {
            filters.push(Query::terms("type", types.iter().map(String::as_str)));
        }
        let results = self
            .cached_search(
                key,
                self.backend.fuzzy_search(
                    &index,
                    text,
                    &self.config.fuzzy_fields,
                    filters,
                    from,
                    size,
                ),
            )
            .await?;
        decode_page(results)
    }

    pub async fn site_wide_search(
        &self,
        request: &SiteSearchRequest,
    ) -> Result<ResultsPage<ContentNode>> {
        self.site_wide_search_at(request, Utc::now()).await
    }

    /// Site-wide search with past events judged against `now`. Cached
    /// results are keyed by the event cutoff derived from `now`, so an
    /// event drops out of cached searches once it has finished.
    pub async fn site_wide_search_at(
        &self,
        request: &SiteSearchRequest,
        now: DateTime<Utc>,
    ) -> Result<ResultsPage<ContentNode>> {
        let version = self.current_version().await?;
        let size = self.page_size(request.size);
        let index = version_index(&version, IndexCategory::Content);
        let cutoff = event_cutoff(now);
        let mut arguments = serde_json::to_value(request)?;
        arguments["size"] = json!(size);
        if !request.include_past_events {
            arguments["eventCutoff"] = json!(cutoff.timestamp());
        }
        let key = CacheKey::new("site_wide_search", &version, arguments);

        let query = site_search_query(request, &self.config.site_search_boosts, cutoff);
        let search = SearchRequest::new(self.scoped(query)).page(request.from, size);
        let results = self
            .cached_search(key, self.backend.search(&index, &search))
            .await?;
        decode_page(results)
    }

    /// Matching content in an order that is stable for `seed`. No clauses
    /// matches everything.
    pub async fn randomised_search(
        &self,
        clauses: &[(String, String)],
        seed: u64,
        from: usize,
        size: usize,
    ) -> Result<ResultsPage<ContentNode>> {
        let version = self.current_version().await?;
        let size = self.page_size(size);
        let index = version_index(&version, IndexCategory::Content);
        let key = CacheKey::new("randomised_search", &version, json!([clauses, seed, from, size]));
        let results = self
            .cached_search(
                key,
                self.backend.randomised_match_search(
                    &index,
                    clauses,
                    seed,
                    self.base_filters(),
                    from,
                    size,
                ),
            )
            .await?;
        decode_page(results)
    }

    /// Fills in `related_summaries` on the node and everything it contains.
    pub async fn populate_related_content(&self, node: &mut ContentNode) -> Result<()> {
        let version = self.current_version().await?;
        self.populate_at(&version, node).await
    }

    /// Every tag used by the current version, sorted.
    pub async fn get_tags(&self) -> Result<Vec<String>> {
        let version = self.current_version().await?;
        let document = self
            .cached_document(&version, IndexCategory::Tags, TAGS_DOCUMENT_ID)
            .await?;
        let Some(document) = document else {
            return Ok(Vec::new());
        };
        let document: TagsDocument = serde_json::from_value(document)?;
        Ok(document.tags)
    }

    /// Units used by numeric questions, by cleaned form.
    pub async fn get_units(&self, published_only: bool) -> Result<Vec<UnitDocument>> {
        let version = self.current_version().await?;
        let category = if published_only {
            IndexCategory::PublishedUnits
        } else {
            IndexCategory::Units
        };
        let index = version_index(&version, category);
        let size = self.config.max_page_size;
        let mut units = Vec::new();
        loop {
            let from = units.len();
            let key = CacheKey::new("get_units", &version, json!([category.as_str(), from, size]));
            let request = SearchRequest::new(Query::MatchAll)
                .page(from, size)
                .sort_by(SortField::asc("cleanedUnit"));
            let results = self
                .cached_search(key, self.backend.search(&index, &request))
                .await?;
            let total = results.total;
            let page: ResultsPage<UnitDocument> = decode_page(results)?;
            if page.is_empty() {
                break;
            }
            units.extend(page.results);
            if units.len() as u64 >= total {
                break;
            }
        }
        Ok(units)
    }

    /// Problem records of the current version, by source path.
    pub async fn get_problems(
        &self,
        from: usize,
        size: usize,
    ) -> Result<ResultsPage<ProblemDocument>> {
        let version = self.current_version().await?;
        let size = self.page_size(size);
        let index = version_index(&version, IndexCategory::ContentErrors);
        let key = CacheKey::new("get_problems", &version, json!([from, size]));
        let request = SearchRequest::new(Query::MatchAll)
            .page(from, size)
            .sort_by(SortField::asc("path"))
            .sort_by(SortField::asc("nodeId"))
            .sort_by(SortField::asc("position"));
        let results = self
            .cached_search(key, self.backend.search(&index, &request))
            .await?;
        decode_page(results)
    }

    pub async fn get_metadata(&self) -> Result<Option<IndexMetadata>> {
        let version = self.current_version().await?;
        self.cached_document(&version, IndexCategory::Metadata, IndexMetadata::DOCUMENT_ID)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(QueryError::from)
    }

    /// Drops every cached result and alias resolution.
    pub fn clear_cache(&self) {
        self.results.clear();
        self.aliases.clear();
        info!("Query caches cleared");
    }

    pub fn cache_stats(&self) -> QueryCacheStats {
        QueryCacheStats {
            results: self.results.stats(),
            versions: self.aliases.stats(),
        }
    }

    async fn lookup(&self, version: &VersionId, id: &str) -> Result<Option<ContentNode>> {
        let index = version_index(version, IndexCategory::Content);
        let key = CacheKey::new("get_by_id", version, json!(id));
        let results = self
            .cached_search(
                key,
                self.backend
                    .term_search(&index, "id", json!(id), self.base_filters(), 0, 1),
            )
            .await?;
        let page: ResultsPage<ContentNode> = decode_page(results)?;
        Ok(page.results.into_iter().next())
    }

    /// Looks ids up in chunks small enough for the backend's clause limit.
    async fn fetch_ids(&self, version: &VersionId, ids: &[String]) -> Result<Vec<ContentNode>> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let filters = self.base_filters();
        let filter_clauses: usize = filters.iter().map(Query::clause_count).sum();
        let chunk_size = self
            .backend
            .max_clause_count()
            .saturating_sub(filter_clauses)
            .max(1);
        let index = version_index(version, IndexCategory::Content);

        let mut found: HashMap<String, ContentNode> = HashMap::with_capacity(unique.len());
        for chunk in unique.chunks(chunk_size) {
            let key = CacheKey::new("get_by_ids", version, json!(chunk));
            let mut query = BoolQuery::new().must(Query::ids(chunk.iter().copied()));
            query.filter.extend(filters.iter().cloned());
            let request = SearchRequest::new(query.into()).page(0, chunk.len());
            let results = self
                .cached_search(key, self.backend.search(&index, &request))
                .await?;
            for hit in results.hits {
                found.insert(hit.id, serde_json::from_value(hit.source)?);
            }
        }
        debug!(
            "Resolved {}/{} ids in {} chunks",
            found.len(),
            unique.len(),
            unique.len().div_ceil(chunk_size)
        );
        Ok(unique.iter().filter_map(|id| found.remove(*id)).collect())
    }

    async fn populate_at(&self, version: &VersionId, node: &mut ContentNode) -> Result<()> {
        let mut wanted: Vec<String> = Vec::new();
        node.for_each_node(&mut |inner| wanted.extend(inner.related_content.iter().cloned()));
        if wanted.is_empty() {
            return Ok(());
        }

        let summaries: HashMap<String, ContentSummary> = self
            .fetch_ids(version, &wanted)
            .await?
            .iter()
            .filter_map(ContentNode::to_summary)
            .map(|summary| (summary.id.clone(), summary))
            .collect();
        attach_summaries(node, &summaries, version);
        Ok(())
    }

    fn base_filters(&self) -> Vec<Query> {
        let mut filters = Vec::new();
        if self.config.published_only {
            filters.push(Query::term("published", true));
        }
        if self.config.exclude_regression_content {
            filters.push(
                BoolQuery::new()
                    .must_not(Query::term("tags", self.config.regression_tag.as_str()))
                    .into(),
            );
        }
        filters
    }

    fn scoped(&self, query: Query) -> Query {
        let mut scoped = BoolQuery::new().must(query);
        scoped.filter = self.base_filters();
        scoped.into()
    }

    fn page_size(&self, size: usize) -> usize {
        if size > self.config.max_page_size {
            debug!(
                "Page size {size} capped at {}",
                self.config.max_page_size
            );
            return self.config.max_page_size;
        }
        size
    }

    async fn cached_search<F>(&self, key: CacheKey, fetch: F) -> Result<SearchResults>
    where
        F: Future<Output = corpus_search_store::Result<SearchResults>>,
    {
        if let Some(CachedRead::Hits(results)) = self.results.get(&key) {
            debug!("Cache hit for {} on {}", key.operation, key.version);
            return Ok(results);
        }
        let results = fetch.await?;
        self.results.insert(key, CachedRead::Hits(results.clone()));
        Ok(results)
    }

    async fn cached_document(
        &self,
        version: &VersionId,
        category: IndexCategory,
        id: &str,
    ) -> Result<Option<Value>> {
        let key = CacheKey::new("get_document", version, json!([category.as_str(), id]));
        if let Some(CachedRead::Document(document)) = self.results.get(&key) {
            return Ok(document);
        }
        let document = self
            .backend
            .get_by_id(&version_index(version, category), id)
            .await?;
        self.results.insert(key, CachedRead::Document(document.clone()));
        Ok(document)
    }
}

fn attach_summaries(
    node: &mut ContentNode,
    summaries: &HashMap<String, ContentSummary>,
    version: &VersionId,
) {
    node.related_summaries = node
        .related_content
        .iter()
        .filter_map(|id| {
            let summary = summaries.get(id).cloned();
            if summary.is_none() {
                warn!(
                    "Related content {id} of {} not found in {version}",
                    node.id.as_deref().unwrap_or("<anonymous>")
                );
            }
            summary
        })
        .collect();
    for inner in node.sub_nodes_mut() {
        attach_summaries(inner, summaries, version);
    }
}

fn decode_page<T: DeserializeOwned>(results: SearchResults) -> Result<ResultsPage<T>> {
    let items = results
        .hits
        .into_iter()
        .map(|hit| serde_json::from_value(hit.source))
        .collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(ResultsPage::new(items, results.total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_search_store::InMemoryBackend;
    use pretty_assertions::assert_eq;

    async fn service_with(docs: Vec<Value>, config: QueryConfig) -> (ContentQueryService, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let version = VersionId::from("v1");
        for category in IndexCategory::ALL {
            backend
                .bulk_index_with_ids(&version_index(&version, category), Vec::new())
                .await
                .unwrap();
        }
        let docs = docs
            .into_iter()
            .map(|doc| (doc["id"].as_str().unwrap_or_default().to_string(), doc))
            .collect();
        backend
            .bulk_index_with_ids(&version_index(&version, IndexCategory::Content), docs)
            .await
            .unwrap();
        backend
            .index_document(
                &version_index(&version, IndexCategory::Metadata),
                Some(IndexMetadata::DOCUMENT_ID),
                serde_json::to_value(IndexMetadata::new(version.clone(), 0, 0).sealed()).unwrap(),
            )
            .await
            .unwrap();
        let service = ContentQueryService::new(config, Arc::new(backend.clone())).unwrap();
        service.publish(&version).await.unwrap();
        (service, backend)
    }

    fn page(id: &str, published: bool, tags: &[&str]) -> Value {
        json!({"type": "page", "id": id, "title": id, "published": published, "tags": tags})
    }

    #[tokio::test]
    async fn base_filters_hide_unpublished_and_regression_content() {
        let (service, _) = service_with(
            vec![
                page("visible", true, &[]),
                page("draft", false, &[]),
                page("regression", true, &["regression_test"]),
            ],
            QueryConfig::default(),
        )
        .await;

        assert!(service.get_by_id("visible").await.unwrap().is_some());
        assert_eq!(service.get_by_id("draft").await.unwrap(), None);
        assert_eq!(service.get_by_id("regression").await.unwrap(), None);

        let (preview, _) = service_with(
            vec![page("draft", false, &[]), page("regression", true, &["regression_test"])],
            QueryConfig::preview(),
        )
        .await;
        assert!(preview.get_by_id("draft").await.unwrap().is_some());
        assert!(preview.get_by_id("regression").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cache_hits_bypass_the_backend() {
        let (service, backend) = service_with(vec![page("a", true, &[])], QueryConfig::default()).await;

        let first = service.get_by_id("a").await.unwrap();
        let reads = backend.stats().reads();
        let second = service.get_by_id("a").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.stats().reads(), reads);
        assert_eq!(service.cache_stats().results.hits, 1);

        service.clear_cache();
        service.get_by_id("a").await.unwrap();
        assert!(backend.stats().reads() > reads);
    }

    #[tokio::test]
    async fn page_sizes_are_capped() {
        let docs = (0..5).map(|i| page(&format!("p{i}"), true, &[])).collect();
        let config = QueryConfig {
            max_page_size: 2,
            ..Default::default()
        };
        let (service, _) = service_with(docs, config).await;

        let first = service.get_by_id_prefix("p", 0, 100).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(
            first.results.iter().map(|n| n.id.as_deref()).collect::<Vec<_>>(),
            vec![Some("p0"), Some("p1")]
        );
    }

    #[tokio::test]
    async fn get_by_ids_keeps_requested_order() {
        let docs = ["a", "b", "c"].iter().map(|id| page(id, true, &[])).collect();
        let (service, _) = service_with(docs, QueryConfig::default()).await;

        let ids: Vec<String> = ["c", "missing", "a", "c"].iter().map(|s| s.to_string()).collect();
        let found = service.get_by_ids(&ids).await.unwrap();
        assert_eq!(
            found.iter().map(|n| n.id.as_deref()).collect::<Vec<_>>(),
            vec![Some("c"), Some("a")]
        );
    }

    #[tokio::test]
    async fn unknown_alias_surfaces() {
        let service =
            ContentQueryService::new(QueryConfig::default(), Arc::new(InMemoryBackend::new())).unwrap();
        assert!(matches!(
            service.get_by_id("a").await,
            Err(QueryError::UnknownAlias(_))
        ));
    }
}
