//! # Corpus Search Store
//!
//! The document index the content indexer writes into and the query layer
//! reads from, behind the [`SearchBackend`] trait.
//!
//! Every built version owns one backend index per [`IndexCategory`], named
//! `{version}_{category}`. Aliases map `{alias}_{category}` names onto a
//! version's indices and are repointed atomically.
//!
//! [`InMemoryBackend`] evaluates the [`Query`] AST in process and can persist
//! itself to a JSON file.

mod backend;
mod error;
mod eval;
mod index;
mod memory;
mod query;

pub use backend::BulkFailure;
pub use backend::BulkOutcome;
pub use backend::SearchBackend;
pub use backend::WeightedField;
pub use error::Result;
pub use error::SearchStoreError;
pub use index::IndexCategory;
pub use index::alias_index;
pub use index::version_index;
pub use memory::BackendStats;
pub use memory::DEFAULT_MAX_CLAUSE_COUNT;
pub use memory::InMemoryBackend;
pub use query::BoolQuery;
pub use query::DEFAULT_PAGE_SIZE;
pub use query::Operator;
pub use query::Query;
pub use query::SearchHit;
pub use query::SearchRequest;
pub use query::SearchResults;
pub use query::SortField;
pub use query::SortOrder;
