use corpus_search_store::Operator;
use corpus_search_store::Query;
use corpus_search_store::SortField;
use serde::Deserialize;
use serde::Serialize;

/// Field/text clauses combined with one operator, plus extra filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatchRequest {
    pub clauses: Vec<(String, String)>,
    #[serde(default)]
    pub operator: Operator,
    /// Extra term, range or exclusion filters ANDed with the clauses.
    #[serde(default)]
    pub filters: Vec<Query>,
    #[serde(default)]
    pub sort: Vec<SortField>,
    #[serde(default)]
    pub from: usize,
    pub size: usize,
}

impl FieldMatchRequest {
    pub fn new(operator: Operator, size: usize) -> Self {
        Self {
            clauses: Vec::new(),
            operator,
            filters: Vec::new(),
            sort: Vec::new(),
            from: 0,
            size,
        }
    }

    pub fn clause(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.clauses.push((field.into(), text.into()));
        self
    }

    pub fn filter(mut self, filter: Query) -> Self {
        self.filters.push(filter);
        self
    }

    /// Excludes documents matching `query`.
    pub fn exclude(self, query: Query) -> Self {
        self.filter(corpus_search_store::BoolQuery::new().must_not(query).into())
    }

    pub fn sort_by(mut self, field: SortField) -> Self {
        self.sort.push(field);
        self
    }

    pub fn page(mut self, from: usize) -> Self {
        self.from = from;
        self
    }
}
