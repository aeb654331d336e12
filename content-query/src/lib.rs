/*!
# Corpus Query

Cached, version-scoped reads over indices built by `corpus-indexer`.

## Features

- **Alias scoping**: every call resolves the configured alias (default
  `live`) once and runs all of its backend requests against that version
- **Base filters**: published-only and regression-tag exclusion applied to
  every content read
- **Two caches**: results in an access-expiring LRU keyed by operation,
  version and arguments; alias resolutions in a short write-expiring cache
- **Batched id lookups**: id sets larger than the backend's clause limit are
  split transparently and returned in the requested order

## Example

```rust,no_run
use corpus_query::{ContentQueryService, QueryConfig, SiteSearchRequest};
use corpus_search_store::InMemoryBackend;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let backend = InMemoryBackend::open(Path::new("corpus-store.json")).await?;
    let service = ContentQueryService::new(QueryConfig::default(), Arc::new(backend))?;

    let results = service
        .site_wide_search(&SiteSearchRequest::new("momentum", 10))
        .await?;
    for node in results.results {
        println!("{:?}: {:?}", node.id, node.title);
    }
    Ok(())
}
```
*/

mod alias;
mod config;
mod error;
mod request;
mod service;
mod site_search;

pub use alias::AliasResolver;
pub use config::QueryConfig;
pub use error::QueryError;
pub use error::Result;
pub use request::FieldMatchRequest;
pub use service::ContentQueryService;
pub use service::QueryCacheStats;
pub use site_search::ADDRESS_FIELDS;
pub use site_search::EVENT_CUTOFF_SECS;
pub use site_search::SiteSearchRequest;
pub use site_search::event_cutoff;
pub use site_search::site_search_query;
