/*!
# Corpus Indexer

Builds version-scoped search indices from snapshots of structured content.

## Pipeline

1. **Resolve** a reference to an immutable version and skip it when it is
   already complete.
2. **Lock** the version so racing triggers cannot build it twice.
3. **Parse and augment** every content file: hierarchical ids, media
   paths, publication flags.
4. **Flatten** into an id map (first writer wins), tag set and unit
   lexicons.
5. **Validate** references and content shape. Problems become indexed
   records instead of failing the build.
6. **Write** every index category, verify, then seal the metadata record.

## Example

```rust,no_run
use corpus_indexer::{ContentIndexer, IndexerConfig};
use corpus_search_store::InMemoryBackend;
use corpus_version_store::GitVersionStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let indexer = ContentIndexer::new(
        IndexerConfig::default(),
        Arc::new(GitVersionStore::new("./content-repo")),
        Arc::new(InMemoryBackend::new()),
    )?;
    let outcome = indexer.build("main", None).await?;
    println!("Indexed {}", outcome.version());
    Ok(())
}
```
*/

mod augment;
mod config;
mod corpus;
mod error;
mod indexer;
mod lock;
mod parse;
mod validate;
mod writer;

pub use augment::Augmenter;
pub use augment::resolve_media_path;
pub use config::IndexerConfig;
pub use corpus::Corpus;
pub use corpus::CorpusBuild;
pub use corpus::CorpusBuilder;
pub use corpus::FileCallback;
pub use corpus::SourceDocument;
pub use corpus::searchable_text;
pub use error::IndexerError;
pub use error::Result;
pub use indexer::BuildOutcome;
pub use indexer::ContentIndexer;
pub use indexer::IndexPhase;
pub use indexer::IndexProgress;
pub use indexer::IndexStats;
pub use indexer::ProgressCallback;
pub use lock::BuildGuard;
pub use lock::InFlightBuilds;
pub use parse::parse_content;
pub use validate::Validator;
pub use writer::IndexWriter;
pub use writer::WriteStats;
