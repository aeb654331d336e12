//! Per-file fix-ups applied after parsing and before flattening.

use corpus_model::ContentNode;
use corpus_model::IdScheme;
use corpus_model::ProblemMap;
use corpus_model::Severity;

/// Assigns hierarchical ids, rewrites relative media paths and propagates
/// the file's publish flag through one parsed tree.
#[derive(Clone, Copy, Debug)]
pub struct Augmenter {
    scheme: IdScheme,
}

impl Augmenter {
    pub fn new(scheme: IdScheme) -> Self {
        Self { scheme }
    }

    /// Augments the tree rooted at `root`, loaded from `path`. Ids that
    /// cannot be composed are reported and cleared.
    pub fn augment(&self, path: &str, root: &mut ContentNode, problems: &mut ProblemMap) {
        let directory = path.rsplit_once('/').map_or("", |(dir, _)| dir);
        let published = root.published;
        self.visit(path, directory, root, None, published, problems);
    }

    fn visit(
        &self,
        path: &str,
        directory: &str,
        node: &mut ContentNode,
        parent_id: Option<&str>,
        published: bool,
        problems: &mut ProblemMap,
    ) {
        node.canonical_source_file = Some(path.to_string());

        if let Some(segment) = node.id.take() {
            match self.scheme.compose(parent_id, &segment) {
                Ok(id) => node.id = Some(id),
                Err(err) => {
                    node.id = Some(segment);
                    problems.record(path, node, Severity::Error, format!("Invalid id: {err}"));
                    node.id = None;
                }
            }
        }
        if node.id.is_some() {
            node.published = published;
        }

        node.kind
            .rewrite_media_paths(|media| resolve_media_path(directory, media));

        let next_parent = node.id.clone().or_else(|| parent_id.map(str::to_string));
        for child in node.sub_nodes_mut() {
            self.visit(
                path,
                directory,
                child,
                next_parent.as_deref(),
                published,
                problems,
            );
        }
    }
}

/// Whether a media path points outside the snapshot.
pub fn is_external(media: &str) -> bool {
    media.contains("://") || media.starts_with("data:")
}

/// Resolves `media` against the directory of the file that references it.
/// Absolute and external paths are left alone.
pub fn resolve_media_path(directory: &str, media: &str) -> String {
    if media.starts_with('/') || is_external(media) {
        return media.to_string();
    }
    let mut segments: Vec<&str> = directory.split('/').filter(|s| !s.is_empty()).collect();
    for segment in media.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
