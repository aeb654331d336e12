use crate::augment::Augmenter;
use crate::config::IndexerConfig;
use crate::error::Result;
use crate::parse::parse_content;
use corpus_model::ContentKind;
use corpus_model::ContentNode;
use corpus_model::IdScheme;
use corpus_model::ProblemMap;
use corpus_model::Severity;
use corpus_model::UnitLexicon;
use corpus_model::VersionId;
use corpus_version_store::VersionStore;
use corpus_version_store::path_matches;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// One parsed and augmented content file.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    pub path: String,
    pub root: ContentNode,
}

/// Everything one snapshot contributes to the index.
#[derive(Clone, Debug)]
pub struct Corpus {
    pub version: VersionId,
    /// Every id-bearing node by effective id; first writer wins.
    pub nodes: BTreeMap<String, ContentNode>,
    /// Source path of each stored node.
    pub sources: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
    pub units: UnitLexicon,
    pub published_units: UnitLexicon,
    /// Non-content files under the content root, with their sizes.
    pub media: BTreeMap<String, u64>,
    /// Every file that parsed, in path order, including ones whose nodes
    /// could not be stored.
    pub documents: Vec<SourceDocument>,
}

impl Corpus {
    pub fn new(version: VersionId) -> Self {
        Self {
            version,
            nodes: BTreeMap::new(),
            sources: BTreeMap::new(),
            tags: BTreeSet::new(),
            units: UnitLexicon::new(),
            published_units: UnitLexicon::new(),
            media: BTreeMap::new(),
            documents: Vec::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ContentNode> {
        self.nodes.get(id)
    }

    pub fn media_size(&self, path: &str) -> Option<u64> {
        self.media.get(path.trim_start_matches('/')).copied()
    }
}

/// A built corpus and the problems found while building it.
#[derive(Debug)]
pub struct CorpusBuild {
    pub corpus: Corpus,
    pub problems: ProblemMap,
}

/// Notified once per file while building.
pub type FileCallback<'a> = &'a (dyn Fn(usize, usize, &str) + Send + Sync);

/// Loads a snapshot into a [`Corpus`].
pub struct CorpusBuilder {
    config: IndexerConfig,
    scheme: IdScheme,
}

impl CorpusBuilder {
    pub fn new(config: IndexerConfig) -> Self {
        let scheme = IdScheme::new(config.max_id_length);
        Self { config, scheme }
    }

    pub async fn build(
        &self,
        store: &dyn VersionStore,
        version: &VersionId,
        on_file: Option<FileCallback<'_>>,
    ) -> Result<CorpusBuild> {
        let content_pattern = self.config.content_pattern();
        let files = store.list_files(version, &content_pattern).await?;
        info!("Building corpus for {version} from {} files", files.len());

        let mut corpus = Corpus::new(version.clone());
        let mut problems = ProblemMap::new();

        for entry in store
            .list_entries(version, &self.config.root_pattern())
            .await?
        {
            if !path_matches(&content_pattern, &entry.path) {
                corpus.media.insert(entry.path, entry.size);
            }
        }

        let augmenter = Augmenter::new(self.scheme);
        let total = files.len();
        for (index, file) in files.into_iter().enumerate() {
            if let Some(on_file) = on_file {
                on_file(index + 1, total, &file.path);
            }
            debug!("Loading {}", file.path);
            let mut root = match parse_content(&file.path, &file.bytes) {
                Ok(root) => root,
                Err(message) => {
                    warn!("{message}");
                    problems.record_for_file(&file.path, Severity::Error, message);
                    continue;
                }
            };
            augmenter.augment(&file.path, &mut root, &mut problems);
            if root.id.is_none() {
                problems.record(
                    &file.path,
                    &root,
                    Severity::Warning,
                    "Top-level content has no id and cannot be indexed",
                );
            } else {
                root.searchable_content = Some(searchable_text(&root));
            }
            self.collect_units(&root, &mut corpus);
            self.flatten(&file.path, &root, &mut corpus, &mut problems);
            corpus.documents.push(SourceDocument {
                path: file.path,
                root,
            });
        }

        info!(
            "Corpus for {version}: {} nodes, {} tags, {} problem records",
            corpus.nodes.len(),
            corpus.tags.len(),
            problems.len()
        );
        Ok(CorpusBuild { corpus, problems })
    }

    fn flatten(
        &self,
        path: &str,
        root: &ContentNode,
        corpus: &mut Corpus,
        problems: &mut ProblemMap,
    ) {
        root.for_each_node(&mut |node| {
            let Some(id) = node.id.as_deref() else {
                return;
            };
            if let Err(err) = self.scheme.check_effective(id) {
                problems.record(path, node, Severity::Error, format!("Invalid id: {err}"));
                return;
            }
            match corpus.nodes.get(id) {
                None => {
                    corpus.tags.extend(node.tags.iter().cloned());
                    corpus.nodes.insert(id.to_string(), node.clone());
                    corpus.sources.insert(id.to_string(), path.to_string());
                }
                Some(existing) if existing.same_content_as(node) => {
                    debug!("Identical content for {id} reused in {path}");
                }
                Some(existing) => {
                    let existing = existing.clone();
                    let first_path = corpus.sources.get(id).cloned().unwrap_or_default();
                    warn!("Duplicate id {id} in {first_path} and {path}");
                    problems.record(
                        path,
                        node,
                        Severity::Error,
                        format!("Duplicate id {id}: already defined in {first_path}"),
                    );
                    problems.record(
                        &first_path,
                        &existing,
                        Severity::Error,
                        format!("Duplicate id {id}: also defined in {path}"),
                    );
                }
            }
        });
    }

    fn collect_units(&self, root: &ContentNode, corpus: &mut Corpus) {
        let published = root.published;
        root.for_each_node(&mut |node| {
            let ContentKind::NumericQuestion(fields) = &node.kind else {
                return;
            };
            for choice in &fields.question.choices {
                if let ContentKind::Quantity(quantity) = &choice.kind
                    && let Some(units) = quantity.units.as_deref()
                {
                    corpus.units.insert(units);
                    if published {
                        corpus.published_units.insert(units);
                    }
                }
            }
        });
    }
}

/// Depth-first concatenation of every title and value in a tree.
pub fn searchable_text(root: &ContentNode) -> String {
    let mut parts: Vec<&str> = Vec::new();
    root.for_each_node(&mut |node| {
        parts.extend(node.title.as_deref());
        parts.extend(node.value.as_deref());
    });
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_version_store::InMemoryVersionStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn build(files: Vec<(&str, serde_json::Value)>) -> CorpusBuild {
        let store = InMemoryVersionStore::new();
        store.add_snapshot(
            "v1",
            files
                .into_iter()
                .map(|(path, value)| (path.to_string(), value.to_string().into_bytes())),
        );
        CorpusBuilder::new(IndexerConfig::default())
            .build(&store, &VersionId::from("v1"), None)
            .await
            .unwrap()
    }

    #[test]
    fn searchable_text_is_depth_first() {
        let root: ContentNode = serde_json::from_value(json!({
            "type": "page", "title": " Top ",
            "children": [
                {"type": "content", "value": "first", "children": [{"type": "content", "value": "inner"}]},
                {"type": "content", "value": "  "},
                {"type": "content", "title": "last"}
            ]
        }))
        .unwrap();
        assert_eq!(searchable_text(&root), "Top first inner last");
    }

    #[tokio::test]
    async fn flattens_nested_ids_and_collects_tags() {
        let build = build(vec![(
            "content/p.json",
            json!({"type": "questionPage", "id": "p", "tags": ["b", "a"],
                   "children": [{"type": "choiceQuestion", "id": "q", "tags": ["c"]}]}),
        )])
        .await;
        let corpus = build.corpus;
        assert_eq!(corpus.nodes.keys().collect::<Vec<_>>(), vec!["p", "p|q"]);
        assert_eq!(corpus.sources["p|q"], "content/p.json");
        assert_eq!(
            corpus.tags.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(corpus.documents.len(), 1);
    }

    #[tokio::test]
    async fn only_published_roots_feed_the_published_lexicon() {
        let question = |units: &str| {
            json!({"type": "numericQuestion", "id": "q", "choices": [
                {"type": "quantity", "value": "1", "units": units}
            ]})
        };
        let build = build(vec![
            (
                "content/a.json",
                json!({"type": "page", "id": "a", "published": true, "children": [question("kg")]}),
            ),
            (
                "content/b.json",
                json!({"type": "page", "id": "b", "children": [question("m s^{-1}")]}),
            ),
        ])
        .await;
        let corpus = build.corpus;
        assert_eq!(corpus.units.len(), 2);
        assert_eq!(
            corpus
                .published_units
                .documents()
                .into_iter()
                .map(|doc| doc.unit)
                .collect::<Vec<_>>(),
            vec!["kg".to_string()]
        );
    }

    #[tokio::test]
    async fn differing_duplicates_are_reported_on_both_files() {
        let build = build(vec![
            ("content/a.json", json!({"type": "page", "id": "x", "title": "A"})),
            ("content/b.json", json!({"type": "page", "id": "x", "title": "B"})),
        ])
        .await;
        assert_eq!(build.corpus.nodes["x"].title.as_deref(), Some("A"));

        let first = build.problems.get("content/a.json", Some("x")).unwrap();
        assert_eq!(
            first.problems()[0].message,
            "Duplicate id x: also defined in content/b.json"
        );
        let second = build.problems.get("content/b.json", Some("x")).unwrap();
        assert_eq!(
            second.problems()[0].message,
            "Duplicate id x: already defined in content/a.json"
        );
    }

    #[tokio::test]
    async fn media_catalog_excludes_content_files() {
        let store = InMemoryVersionStore::new();
        store.add_snapshot(
            "v1",
            vec![
                ("content/a.json", br#"{"type": "page", "id": "a"}"#.to_vec()),
                ("content/img/a.png", vec![0; 12]),
                ("other/b.png", vec![0; 3]),
            ],
        );
        let build = CorpusBuilder::new(IndexerConfig::default())
            .build(&store, &VersionId::from("v1"), None)
            .await
            .unwrap();
        assert_eq!(build.corpus.media_size("/content/img/a.png"), Some(12));
        assert_eq!(build.corpus.media_size("content/a.json"), None);
        assert_eq!(build.corpus.media_size("other/b.png"), None);
    }

    #[tokio::test]
    async fn roots_without_ids_are_warned_about() {
        let build = build(vec![("content/anon.json", json!({"type": "page", "title": "Anon"}))]).await;
        assert!(build.corpus.nodes.is_empty());
        let record = build.problems.get("content/anon.json", None).unwrap();
        assert_eq!(record.problems()[0].severity, Severity::Warning);
    }
}
