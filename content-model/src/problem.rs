use crate::content::ContentKind;
use crate::content::ContentNode;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const NO_CONTENT_ERRORS_TITLE: &str = "No content errors";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub severity: Severity,
    pub message: String,
}

/// Problems are keyed by source path first, so two files that share a file
/// name in different directories never share a record.
///
/// Nodes with an id are keyed by it. Nodes without one are keyed by their
/// position in the file (see [`format_position`]), so two id-less nodes of
/// one file never share a record. The root and parse-failure placeholders
/// have an empty position.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemKey {
    pub path: String,
    pub node_id: Option<String>,
    pub position: String,
}

impl ProblemKey {
    fn new(path: &str, node_id: Option<&str>, position: &[usize]) -> Self {
        let position = match node_id {
            Some(_) => String::new(),
            None => format_position(position),
        };
        Self {
            path: path.to_string(),
            node_id: node_id.map(str::to_string),
            position,
        }
    }
}

/// Child indexes from the root joined by `/`, e.g. `0/2`.
pub fn format_position(position: &[usize]) -> String {
    position
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// A node paired with the diagnostics raised against it. Append-only.
#[derive(Clone, Debug, PartialEq)]
pub struct ProblemRecord {
    node: ContentNode,
    problems: Vec<Problem>,
}

impl ProblemRecord {
    fn new(node: ContentNode) -> Self {
        Self {
            node,
            problems: Vec::new(),
        }
    }

    pub fn node(&self) -> &ContentNode {
        &self.node
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.problems.push(Problem {
            severity,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.problems
            .iter()
            .any(|problem| problem.severity == Severity::Error)
    }
}

/// Indexed form of a problem record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDocument {
    pub path: String,
    #[serde(default)]
    pub node_id: Option<String>,
    /// Position of an id-less node within its file; empty otherwise.
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub published: bool,
    pub problems: Vec<Problem>,
}

#[derive(Clone, Debug, Default)]
pub struct ProblemMap {
    records: BTreeMap<ProblemKey, ProblemRecord>,
}

impl ProblemMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a problem against `node`, loaded from `path`. For a node
    /// without an id this is the file's root.
    pub fn record(
        &mut self,
        path: &str,
        node: &ContentNode,
        severity: Severity,
        message: impl Into<String>,
    ) {
        self.record_at(path, &[], node, severity, message);
    }

    /// Appends a problem against `node` found at `position` in `path`.
    pub fn record_at(
        &mut self,
        path: &str,
        position: &[usize],
        node: &ContentNode,
        severity: Severity,
        message: impl Into<String>,
    ) {
        let key = ProblemKey::new(path, node.id.as_deref(), position);
        self.records
            .entry(key)
            .or_insert_with(|| ProblemRecord::new(node.shallow_copy()))
            .push(severity, message);
    }

    /// Appends a problem for a file that has no usable node.
    pub fn record_for_file(&mut self, path: &str, severity: Severity, message: impl Into<String>) {
        let key = ProblemKey::new(path, None, &[]);
        self.records
            .entry(key)
            .or_insert_with(|| ProblemRecord::new(placeholder_for_path(path)))
            .push(severity, message);
    }

    /// The record for the node with `node_id`, or for the root when `None`.
    pub fn get(&self, path: &str, node_id: Option<&str>) -> Option<&ProblemRecord> {
        self.records.get(&ProblemKey::new(path, node_id, &[]))
    }

    /// The record for the id-less node at `position`.
    pub fn get_at(&self, path: &str, position: &[usize]) -> Option<&ProblemRecord> {
        self.records.get(&ProblemKey::new(path, None, position))
    }

    pub fn for_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ProblemRecord> + 'a {
        self.records
            .iter()
            .filter(move |(key, _)| key.path == path)
            .map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProblemKey, &ProblemRecord)> {
        self.records.iter()
    }

    /// Number of records (distinct path/node pairs).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of individual problems across all records.
    pub fn problem_count(&self) -> usize {
        self.records
            .values()
            .map(|record| record.problems.len())
            .sum()
    }

    pub fn error_count(&self) -> usize {
        self.records
            .values()
            .flat_map(|record| record.problems.iter())
            .filter(|problem| problem.severity == Severity::Error)
            .count()
    }

    /// Adds the "no content errors" placeholder if nothing was recorded.
    /// Returns whether the placeholder was added.
    pub fn ensure_not_empty(&mut self) -> bool {
        if !self.records.is_empty() {
            return false;
        }
        let node = ContentNode::new(ContentKind::Content)
            .with_title(NO_CONTENT_ERRORS_TITLE)
            .published(true);
        self.records.insert(
            ProblemKey::new("", None, &[]),
            ProblemRecord::new(node),
        );
        true
    }

    pub fn documents(&self) -> Vec<ProblemDocument> {
        self.records
            .iter()
            .map(|(key, record)| ProblemDocument {
                path: key.path.clone(),
                node_id: key.node_id.clone(),
                position: key.position.clone(),
                title: record.node.title.clone(),
                type_tag: record.node.type_tag().to_string(),
                published: record.node.published,
                problems: record.problems.clone(),
            })
            .collect()
    }
}

/// Stand-in node for a file that could not be deserialized.
pub fn placeholder_for_path(path: &str) -> ContentNode {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let mut node = ContentNode::new(ContentKind::Content).with_title(file_name);
    node.canonical_source_file = Some(path.to_string());
    node
}
