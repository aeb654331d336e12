use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Opaque name of one frozen content snapshot.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VersionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VersionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for VersionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Id of the one document in a version's tags index.
pub const TAGS_DOCUMENT_ID: &str = "tags";

/// The single metadata record written for every indexed version.
///
/// Written unsealed when a build starts writing and rewritten with
/// `complete` set once every category has been verified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub version: VersionId,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub content_count: usize,
    #[serde(default)]
    pub problem_count: usize,
    #[serde(default)]
    pub complete: bool,
}

impl IndexMetadata {
    pub const DOCUMENT_ID: &'static str = "metadata";

    pub fn new(version: VersionId, content_count: usize, problem_count: usize) -> Self {
        Self {
            version,
            created: Utc::now(),
            content_count,
            problem_count,
            complete: false,
        }
    }

    pub fn sealed(mut self) -> Self {
        self.complete = true;
        self
    }
}
