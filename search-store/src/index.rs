use corpus_model::VersionId;
use std::fmt;

/// The fixed set of indices every built version owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexCategory {
    Content,
    Metadata,
    Tags,
    Units,
    PublishedUnits,
    ContentErrors,
}

impl IndexCategory {
    pub const ALL: [IndexCategory; 6] = [
        IndexCategory::Content,
        IndexCategory::Metadata,
        IndexCategory::Tags,
        IndexCategory::Units,
        IndexCategory::PublishedUnits,
        IndexCategory::ContentErrors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexCategory::Content => "content",
            IndexCategory::Metadata => "metadata",
            IndexCategory::Tags => "tags",
            IndexCategory::Units => "units",
            IndexCategory::PublishedUnits => "published_units",
            IndexCategory::ContentErrors => "content_errors",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
    }
}

impl fmt::Display for IndexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend index name for one category of a version: `{version}_{category}`.
pub fn version_index(version: &VersionId, category: IndexCategory) -> String {
    format!("{}_{}", version.as_str(), category.as_str())
}

/// Backend index name an alias exposes for one category.
pub fn alias_index(alias: &str, category: IndexCategory) -> String {
    format!("{alias}_{}", category.as_str())
}
