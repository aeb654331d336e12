use crate::IndexCategory;
use crate::Result;
use crate::query::BoolQuery;
use crate::query::Operator;
use crate::query::Query;
use crate::query::SearchRequest;
use crate::query::SearchResults;
use crate::query::SortField;
use async_trait::async_trait;
use corpus_model::VersionId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Per-item outcome of a bulk write.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub indexed: usize,
    pub failures: Vec<BulkFailure>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: Option<String>,
    pub reason: String,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A field searched by free-text queries and its weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedField {
    pub field: String,
    pub weight: f32,
}

impl WeightedField {
    pub fn new(field: impl Into<String>, weight: f32) -> Self {
        Self {
            field: field.into(),
            weight,
        }
    }
}

/// Abstract document index and query capability.
///
/// Index names are plain strings; callers derive them with
/// [`crate::version_index`] or [`crate::alias_index`]. Reads through an alias
/// name are served from the index the alias currently points at.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Writes one document; a missing id is generated by the backend.
    async fn index_document(&self, index: &str, id: Option<&str>, document: Value) -> Result<()>;

    async fn bulk_index(&self, index: &str, documents: Vec<Value>) -> Result<BulkOutcome>;

    async fn bulk_index_with_ids(
        &self,
        index: &str,
        documents: Vec<(String, Value)>,
    ) -> Result<BulkOutcome>;

    async fn has_index(&self, index: &str) -> Result<bool>;

    /// Deletes an index. Returns whether it existed.
    async fn expunge_index(&self, index: &str) -> Result<bool>;

    /// Points every listed category of `alias` at `version` in one step.
    /// Fails when any of the version's indices is missing.
    async fn set_alias(
        &self,
        alias: &str,
        version: &VersionId,
        categories: &[IndexCategory],
    ) -> Result<()>;

    async fn resolve_alias(&self, alias: &str, category: IndexCategory)
    -> Result<Option<VersionId>>;

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Value>>;

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchResults>;

    /// Largest number of leaf clauses a single query may expand to.
    fn max_clause_count(&self) -> usize;

    async fn term_search(
        &self,
        index: &str,
        field: &str,
        value: Value,
        filters: Vec<Query>,
        from: usize,
        size: usize,
    ) -> Result<SearchResults> {
        let query = with_filters(BoolQuery::new().must(Query::term(field, value)), filters);
        self.search(index, &SearchRequest::new(query).page(from, size))
            .await
    }

    /// Typo-tolerant text search across weighted fields; a document matches
    /// when any field does.
    async fn fuzzy_search(
        &self,
        index: &str,
        text: &str,
        fields: &[WeightedField],
        filters: Vec<Query>,
        from: usize,
        size: usize,
    ) -> Result<SearchResults> {
        let mut query = BoolQuery::new().minimum_should_match(1);
        for field in fields {
            query = query.should(Query::fuzzy(&field.field, text, field.weight));
        }
        let query = with_filters(query, filters);
        self.search(index, &SearchRequest::new(query).page(from, size))
            .await
    }

    /// Field/text clauses combined with `operator`.
    #[allow(clippy::too_many_arguments)]
    async fn match_search(
        &self,
        index: &str,
        clauses: &[(String, String)],
        operator: Operator,
        filters: Vec<Query>,
        sort: Vec<SortField>,
        from: usize,
        size: usize,
    ) -> Result<SearchResults> {
        let query = with_filters(combine_matches(clauses, operator), filters);
        let mut request = SearchRequest::new(query).page(from, size);
        request.sort = sort;
        self.search(index, &request).await
    }

    /// Like [`match_search`](Self::match_search), evaluated inside each
    /// element of the array at `path`.
    #[allow(clippy::too_many_arguments)]
    async fn nested_match_search(
        &self,
        index: &str,
        path: &str,
        clauses: &[(String, String)],
        operator: Operator,
        filters: Vec<Query>,
        from: usize,
        size: usize,
    ) -> Result<SearchResults> {
        let nested = Query::nested(path, combine_matches(clauses, operator).into());
        let query = with_filters(BoolQuery::new().must(nested), filters);
        self.search(index, &SearchRequest::new(query).page(from, size))
            .await
    }

    /// Matching documents in an order that is stable for a given seed.
    async fn randomised_match_search(
        &self,
        index: &str,
        clauses: &[(String, String)],
        seed: u64,
        filters: Vec<Query>,
        from: usize,
        size: usize,
    ) -> Result<SearchResults> {
        let query = if clauses.is_empty() {
            BoolQuery::new().must(Query::MatchAll)
        } else {
            combine_matches(clauses, Operator::And)
        };
        let query = with_filters(query, filters);
        let request = SearchRequest::new(query).page(from, size).seeded(seed);
        self.search(index, &request).await
    }

    async fn find_by_prefix(
        &self,
        index: &str,
        field: &str,
        prefix: &str,
        filters: Vec<Query>,
        from: usize,
        size: usize,
    ) -> Result<SearchResults> {
        let query = with_filters(BoolQuery::new().must(Query::prefix(field, prefix)), filters);
        let request = SearchRequest::new(query)
            .page(from, size)
            .sort_by(SortField::asc(field));
        self.search(index, &request).await
    }

    /// Removes every category of a version. Returns how many existed.
    async fn expunge_version(&self, version: &VersionId) -> Result<usize> {
        let mut removed = 0;
        for category in IndexCategory::ALL {
            if self
                .expunge_index(&crate::version_index(version, category))
                .await?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Categories of a version that have no index yet.
    async fn missing_categories(&self, version: &VersionId) -> Result<Vec<IndexCategory>> {
        let mut missing = Vec::new();
        for category in IndexCategory::ALL {
            if !self
                .has_index(&crate::version_index(version, category))
                .await?
            {
                missing.push(category);
            }
        }
        Ok(missing)
    }

    async fn is_fully_indexed(&self, version: &VersionId) -> Result<bool> {
        Ok(self.missing_categories(version).await?.is_empty())
    }
}

fn combine_matches(clauses: &[(String, String)], operator: Operator) -> BoolQuery {
    let mut query = BoolQuery::new();
    for (field, text) in clauses {
        let clause = Query::matching(field, text, Operator::And);
        query = match operator {
            Operator::And => query.must(clause),
            Operator::Or => query.should(clause),
        };
    }
    if operator == Operator::Or && !clauses.is_empty() {
        query = query.minimum_should_match(1);
    }
    query
}

fn with_filters(mut query: BoolQuery, filters: Vec<Query>) -> Query {
    query.filter.extend(filters);
    query.into()
}
