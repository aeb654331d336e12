use assert_matches::assert_matches;
use async_trait::async_trait;
use corpus_indexer::BuildOutcome;
use corpus_indexer::ContentIndexer;
use corpus_indexer::IndexPhase;
use corpus_indexer::IndexerConfig;
use corpus_indexer::IndexerError;
use corpus_indexer::ProgressCallback;
use corpus_model::NO_CONTENT_ERRORS_TITLE;
use corpus_model::VersionId;
use corpus_search_store::BulkFailure;
use corpus_search_store::BulkOutcome;
use corpus_search_store::IndexCategory;
use corpus_search_store::InMemoryBackend;
use corpus_search_store::Query;
use corpus_search_store::SearchBackend;
use corpus_search_store::SearchRequest;
use corpus_search_store::SearchResults;
use corpus_search_store::version_index;
use corpus_version_store::FileEntry;
use corpus_version_store::InMemoryVersionStore;
use corpus_version_store::VersionStore;
use corpus_version_store::VersionedFile;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::Notify;

fn snapshot(version: &str, files: Vec<(&str, Value)>) -> InMemoryVersionStore {
    snapshot_with_media(version, files, Vec::new())
}

fn snapshot_with_media(
    version: &str,
    files: Vec<(&str, Value)>,
    media: Vec<(&str, &[u8])>,
) -> InMemoryVersionStore {
    let store = InMemoryVersionStore::new();
    let files = files
        .into_iter()
        .map(|(path, value)| (path.to_string(), value.to_string().into_bytes()))
        .chain(
            media
                .into_iter()
                .map(|(path, bytes)| (path.to_string(), bytes.to_vec())),
        );
    store.add_snapshot(version, files);
    store
}

fn indexer(store: Arc<dyn VersionStore>, backend: Arc<dyn SearchBackend>) -> ContentIndexer {
    ContentIndexer::new(IndexerConfig::default(), store, backend).unwrap()
}

async fn problems_of(backend: &InMemoryBackend, version: &VersionId) -> Vec<Value> {
    let results = backend
        .search(
            &version_index(version, IndexCategory::ContentErrors),
            &SearchRequest::new(Query::MatchAll).page(0, 100),
        )
        .await
        .unwrap();
    results.hits.into_iter().map(|hit| hit.source).collect()
}

#[tokio::test]
async fn builds_every_category() {
    let store = snapshot_with_media(
        "v1",
        vec![
            (
                "content/physics/forces.json",
                json!({"type": "conceptPage", "id": "forces", "title": "Forces",
                       "published": true, "tags": ["physics"],
                       "children": [{"type": "figure", "id": "fig", "src": "f.svg", "altText": "arrows"}]}),
            ),
            (
                "content/physics/q.json",
                json!({"type": "questionPage", "id": "q", "published": true, "tags": ["maths"],
                       "children": [{"type": "numericQuestion", "id": "speed", "choices": [
                           {"type": "quantity", "value": "3", "units": "m s^{-1}", "correct": true}
                       ]}]}),
            ),
        ],
        vec![("content/physics/f.svg", &b"<svg/>"[..])],
    );
    let store = Arc::new(store);

    let backend = Arc::new(InMemoryBackend::new());
    let outcome = indexer(store, backend.clone()).build("v1", None).await.unwrap();
    let version = VersionId::from("v1");
    let BuildOutcome::Built { stats, .. } = outcome else {
        panic!("expected a fresh build");
    };
    assert_eq!(stats.files_processed, 2);
    assert!(backend.is_fully_indexed(&version).await.unwrap());

    let content = version_index(&version, IndexCategory::Content);
    let forces = backend.get_by_id(&content, "forces").await.unwrap().unwrap();
    assert_eq!(forces["searchableContent"], json!("Forces"));
    assert!(backend.get_by_id(&content, "q|speed").await.unwrap().is_some());

    let tags = backend
        .get_by_id(&version_index(&version, IndexCategory::Tags), "tags")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tags["tags"], json!(["maths", "physics"]));

    let units = backend
        .get_by_id(&version_index(&version, IndexCategory::PublishedUnits), "ms^{-1}")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(units["unit"], json!("m s^{-1}"));
}

#[tokio::test]
async fn duplicate_ids_keep_the_first_writer() {
    let store = Arc::new(snapshot(
        "v1",
        vec![
            ("content/a.json", json!({"type": "page", "id": "dup", "title": "First"})),
            ("content/b.json", json!({"type": "page", "id": "dup", "title": "Second"})),
        ],
    ));
    let backend = Arc::new(InMemoryBackend::new());
    indexer(store, backend.clone()).build("v1", None).await.unwrap();

    let version = VersionId::from("v1");
    let stored = backend
        .get_by_id(&version_index(&version, IndexCategory::Content), "dup")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["title"], json!("First"));

    let problems = problems_of(&backend, &version).await;
    let mut paths: Vec<&str> = problems
        .iter()
        .filter(|doc| doc["nodeId"] == json!("dup"))
        .map(|doc| doc["path"].as_str().unwrap())
        .collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["content/a.json", "content/b.json"]);
}

#[tokio::test]
async fn identical_duplicates_are_legitimate_reuse() {
    let page = json!({"type": "page", "id": "shared", "title": "Same", "published": true,
                      "children": [{"type": "content", "id": "para", "value": "hello"}]});
    let store = Arc::new(snapshot(
        "v1",
        vec![("content/a.json", page.clone()), ("content/b.json", page)],
    ));
    let backend = Arc::new(InMemoryBackend::new());
    indexer(store, backend.clone()).build("v1", None).await.unwrap();

    let version = VersionId::from("v1");
    let problems = problems_of(&backend, &version).await;
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0]["title"], json!(NO_CONTENT_ERRORS_TITLE));
    assert_eq!(
        backend
            .document_count(&version_index(&version, IndexCategory::Content))
            .await,
        2
    );
    let para = backend
        .get_by_id(&version_index(&version, IndexCategory::Content), "shared|para")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(para["canonicalSourceFile"], json!("content/a.json"));
}

#[tokio::test]
async fn value_with_children_is_reported_but_stored() {
    let store = Arc::new(snapshot(
        "v1",
        vec![(
            "content/a.json",
            json!({"type": "content", "id": "both", "value": "text",
                   "children": [{"type": "content", "value": "child"}]}),
        )],
    ));
    let backend = Arc::new(InMemoryBackend::new());
    indexer(store, backend.clone()).build("v1", None).await.unwrap();

    let version = VersionId::from("v1");
    assert!(
        backend
            .get_by_id(&version_index(&version, IndexCategory::Content), "both")
            .await
            .unwrap()
            .is_some()
    );
    let problems = problems_of(&backend, &version).await;
    let record = problems
        .iter()
        .find(|doc| doc["nodeId"] == json!("both"))
        .unwrap();
    assert_eq!(
        record["problems"][0]["message"],
        json!("Content has both a value and children")
    );
}

#[tokio::test]
async fn malformed_files_become_problem_records() {
    let store = InMemoryVersionStore::new();
    store.add_snapshot(
        "v1",
        vec![
            ("content/x/broken.json", b"{ not json".to_vec()),
            ("content/y/broken.json", br#"{"type": "hologram"}"#.to_vec()),
            (
                "content/ok.json",
                br#"{"type": "page", "id": "ok", "published": true}"#.to_vec(),
            ),
        ],
    );
    let backend = Arc::new(InMemoryBackend::new());
    indexer(Arc::new(store), backend.clone())
        .build("v1", None)
        .await
        .unwrap();

    let version = VersionId::from("v1");
    let problems = problems_of(&backend, &version).await;
    let mut broken: Vec<(&str, &str)> = problems
        .iter()
        .map(|doc| (doc["path"].as_str().unwrap(), doc["title"].as_str().unwrap()))
        .collect();
    broken.sort_unstable();
    assert_eq!(
        broken,
        vec![
            ("content/x/broken.json", "broken.json"),
            ("content/y/broken.json", "broken.json"),
        ]
    );
    assert!(
        backend
            .get_by_id(&version_index(&version, IndexCategory::Content), "ok")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn unknown_reference_is_fatal() {
    let store = Arc::new(snapshot("v1", Vec::new()));
    let backend = Arc::new(InMemoryBackend::new());
    let err = indexer(store, backend.clone())
        .build("nope", None)
        .await
        .unwrap_err();
    assert_matches!(err, IndexerError::VersionNotFound(ref reference) if reference == "nope");
    assert!(!err.is_retryable());
    assert_eq!(backend.stats().writes(), 0);
}

#[tokio::test]
async fn rebuilding_a_complete_version_writes_nothing() {
    let store = Arc::new(snapshot(
        "v1",
        vec![("content/a.json", json!({"type": "page", "id": "a"}))],
    ));
    let backend = Arc::new(InMemoryBackend::new());
    let indexer = indexer(store, backend.clone());
    assert_matches!(
        indexer.build("v1", None).await.unwrap(),
        BuildOutcome::Built { .. }
    );

    let writes = backend.stats().writes();
    assert_matches!(
        indexer.build("v1", None).await.unwrap(),
        BuildOutcome::AlreadyIndexed(_)
    );
    assert_eq!(backend.stats().writes(), writes);
}

#[tokio::test]
async fn partial_versions_are_rebuilt_from_scratch() {
    let store = Arc::new(snapshot(
        "v1",
        vec![("content/a.json", json!({"type": "page", "id": "a"}))],
    ));
    let backend = Arc::new(InMemoryBackend::new());
    let version = VersionId::from("v1");
    backend
        .index_document(
            &version_index(&version, IndexCategory::Content),
            Some("stale"),
            json!({"id": "stale"}),
        )
        .await
        .unwrap();

    let outcome = indexer(store, backend.clone()).build("v1", None).await.unwrap();
    assert_matches!(outcome, BuildOutcome::Built { .. });
    let content = version_index(&version, IndexCategory::Content);
    assert_eq!(backend.get_by_id(&content, "stale").await.unwrap(), None);
    assert!(backend.get_by_id(&content, "a").await.unwrap().is_some());
}

#[tokio::test]
async fn reports_progress_through_every_phase() {
    let store = Arc::new(snapshot(
        "v1",
        vec![
            ("content/a.json", json!({"type": "page", "id": "a"})),
            ("content/b.json", json!({"type": "page", "id": "b"})),
        ],
    ));
    let phases = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&phases);
    let callback: ProgressCallback = Arc::new(move |progress| {
        seen.lock().unwrap().push(progress.phase);
    });

    indexer(store, Arc::new(InMemoryBackend::new()))
        .build("v1", Some(callback))
        .await
        .unwrap();

    let mut phases = phases.lock().unwrap().clone();
    phases.dedup();
    assert_eq!(
        phases,
        vec![
            IndexPhase::Resolving,
            IndexPhase::Parsing,
            IndexPhase::Validating,
            IndexPhase::Writing,
            IndexPhase::Complete,
        ]
    );
}

/// Blocks `list_files` until released, so a build can be held mid-flight.
struct GatedStore {
    inner: InMemoryVersionStore,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl VersionStore for GatedStore {
    async fn resolve_version(
        &self,
        reference: &str,
    ) -> corpus_version_store::Result<Option<VersionId>> {
        self.inner.resolve_version(reference).await
    }

    async fn list_files(
        &self,
        version: &VersionId,
        pattern: &str,
    ) -> corpus_version_store::Result<Vec<VersionedFile>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.list_files(version, pattern).await
    }

    async fn read_file(
        &self,
        version: &VersionId,
        path: &str,
    ) -> corpus_version_store::Result<Option<Vec<u8>>> {
        self.inner.read_file(version, path).await
    }

    async fn list_entries(
        &self,
        version: &VersionId,
        pattern: &str,
    ) -> corpus_version_store::Result<Vec<FileEntry>> {
        self.inner.list_entries(version, pattern).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_builds_of_one_version_contend() {
    let store = Arc::new(GatedStore {
        inner: snapshot(
            "v1",
            vec![("content/a.json", json!({"type": "page", "id": "a"}))],
        ),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let backend = Arc::new(InMemoryBackend::new());
    let indexer = Arc::new(indexer(store.clone(), backend.clone()));
    let version = VersionId::from("v1");

    let first = tokio::spawn({
        let indexer = Arc::clone(&indexer);
        async move { indexer.build("v1", None).await }
    });
    store.entered.notified().await;

    let second = indexer.build("v1", None).await;
    assert_matches!(second, Err(IndexerError::VersionLocked(ref locked)) if *locked == version);
    assert!(!second.unwrap_err().is_retryable());
    assert!(!backend.is_fully_indexed(&version).await.unwrap());

    store.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_matches!(first, BuildOutcome::Built { .. });
    assert!(indexer.is_complete(&version).await.unwrap());
    assert!(indexer.builds().is_empty());
}

/// Rejects every non-empty bulk write to content indices.
struct RejectingBackend {
    inner: InMemoryBackend,
}

#[async_trait]
impl SearchBackend for RejectingBackend {
    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: Value,
    ) -> corpus_search_store::Result<()> {
        self.inner.index_document(index, id, document).await
    }

    async fn bulk_index(
        &self,
        index: &str,
        documents: Vec<Value>,
    ) -> corpus_search_store::Result<BulkOutcome> {
        self.inner.bulk_index(index, documents).await
    }

    async fn bulk_index_with_ids(
        &self,
        index: &str,
        documents: Vec<(String, Value)>,
    ) -> corpus_search_store::Result<BulkOutcome> {
        if index.ends_with("_content") && !documents.is_empty() {
            return Ok(BulkOutcome {
                indexed: 0,
                failures: documents
                    .into_iter()
                    .map(|(id, _)| BulkFailure {
                        id: Some(id),
                        reason: "mapping conflict".to_string(),
                    })
                    .collect(),
            });
        }
        self.inner.bulk_index_with_ids(index, documents).await
    }

    async fn has_index(&self, index: &str) -> corpus_search_store::Result<bool> {
        self.inner.has_index(index).await
    }

    async fn expunge_index(&self, index: &str) -> corpus_search_store::Result<bool> {
        self.inner.expunge_index(index).await
    }

    async fn set_alias(
        &self,
        alias: &str,
        version: &VersionId,
        categories: &[IndexCategory],
    ) -> corpus_search_store::Result<()> {
        self.inner.set_alias(alias, version, categories).await
    }

    async fn resolve_alias(
        &self,
        alias: &str,
        category: IndexCategory,
    ) -> corpus_search_store::Result<Option<VersionId>> {
        self.inner.resolve_alias(alias, category).await
    }

    async fn get_by_id(&self, index: &str, id: &str) -> corpus_search_store::Result<Option<Value>> {
        self.inner.get_by_id(index, id).await
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> corpus_search_store::Result<SearchResults> {
        self.inner.search(index, request).await
    }

    fn max_clause_count(&self) -> usize {
        self.inner.max_clause_count()
    }
}

#[tokio::test]
async fn rejected_content_writes_fail_the_build_and_clean_up() {
    let store = Arc::new(snapshot(
        "v1",
        vec![("content/a.json", json!({"type": "page", "id": "a"}))],
    ));
    let inner = InMemoryBackend::new();
    let backend = Arc::new(RejectingBackend {
        inner: inner.clone(),
    });
    let err = indexer(store, backend).build("v1", None).await.unwrap_err();

    assert_matches!(err, IndexerError::BulkWrite { failed: 1, .. });
    assert!(err.is_retryable());
    assert!(inner.index_names().await.is_empty());
}
