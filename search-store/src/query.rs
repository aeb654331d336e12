//! Backend-neutral query AST.
//!
//! Fields are dot paths into the stored JSON document (`location.address.town`).
//! Arrays along a path are searched element-wise.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    #[default]
    Or,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    MatchAll,
    Bool(BoolQuery),
    /// Exact value equality.
    Term { field: String, value: Value },
    /// Exact equality against any of the values.
    Terms { field: String, values: Vec<Value> },
    /// Analysed full-text match.
    Match {
        field: String,
        text: String,
        operator: Operator,
        boost: f32,
    },
    /// Full-text match tolerant of typos and missing letters.
    Fuzzy {
        field: String,
        text: String,
        boost: f32,
    },
    Prefix { field: String, prefix: String },
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    Exists { field: String },
    Ids { ids: Vec<String> },
    /// Evaluates `query` against each element of the array at `path`,
    /// matching when any single element matches.
    Nested { path: String, query: Box<Query> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    #[serde(default)]
    pub must: Vec<Query>,
    #[serde(default)]
    pub should: Vec<Query>,
    #[serde(default)]
    pub must_not: Vec<Query>,
    /// Like `must`, but never contributes to the score.
    #[serde(default)]
    pub filter: Vec<Query>,
    #[serde(default)]
    pub minimum_should_match: Option<usize>,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            filter: Vec::new(),
            minimum_should_match: None,
            boost: default_boost(),
        }
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn minimum_should_match(mut self, count: usize) -> Self {
        self.minimum_should_match = Some(count);
        self
    }

    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
            && self.filter.is_empty()
    }
}

impl From<BoolQuery> for Query {
    fn from(query: BoolQuery) -> Self {
        Query::Bool(query)
    }
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Query::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matching(field: impl Into<String>, text: impl Into<String>, operator: Operator) -> Self {
        Query::Match {
            field: field.into(),
            text: text.into(),
            operator,
            boost: 1.0,
        }
    }

    pub fn fuzzy(field: impl Into<String>, text: impl Into<String>, boost: f32) -> Self {
        Query::Fuzzy {
            field: field.into(),
            text: text.into(),
            boost,
        }
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Query::Prefix {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    pub fn range(field: impl Into<String>, gte: Option<Value>, lte: Option<Value>) -> Self {
        Query::Range {
            field: field.into(),
            gte,
            lte,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists {
            field: field.into(),
        }
    }

    pub fn ids<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Query::Ids {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn nested(path: impl Into<String>, query: Query) -> Self {
        Query::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    /// Sets the boost of a match, fuzzy or bool query; others are unchanged.
    pub fn with_boost(mut self, value: f32) -> Self {
        match &mut self {
            Query::Match { boost, .. } | Query::Fuzzy { boost, .. } => *boost = value,
            Query::Bool(query) => query.boost = value,
            _ => {}
        }
        self
    }

    /// Number of leaf clauses the query expands to; an id or terms list
    /// counts once per value.
    pub fn clause_count(&self) -> usize {
        match self {
            Query::MatchAll => 0,
            Query::Bool(query) => query
                .must
                .iter()
                .chain(&query.should)
                .chain(&query.must_not)
                .chain(&query.filter)
                .map(Query::clause_count)
                .sum(),
            Query::Terms { values, .. } => values.len(),
            Query::Ids { ids } => ids.len(),
            Query::Nested { query, .. } => query.clause_count(),
            Query::Term { .. }
            | Query::Match { .. }
            | Query::Fuzzy { .. }
            | Query::Prefix { .. }
            | Query::Range { .. }
            | Query::Exists { .. } => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// One search call: query plus paging, sort and optional seeded shuffle.
///
/// With no sort fields hits are ordered by score, then id. A `random_seed`
/// replaces score ordering with a pseudo-random order that is stable for the
/// same seed and document set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: Query,
    pub from: usize,
    pub size: usize,
    #[serde(default)]
    pub sort: Vec<SortField>,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

pub const DEFAULT_PAGE_SIZE: usize = 10;

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            from: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: Vec::new(),
            random_seed: None,
        }
    }

    pub fn page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    pub fn sort_by(mut self, field: SortField) -> Self {
        self.sort.push(field);
        self
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub source: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Matches before paging.
    pub total: u64,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.id.as_str()).collect()
    }
}
