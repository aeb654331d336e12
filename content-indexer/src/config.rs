use corpus_model::DEFAULT_MAX_ID_LENGTH;
use serde::Deserialize;
use serde::Serialize;

/// Configuration for content indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Directory inside each snapshot holding content and media
    #[serde(default = "default_content_root")]
    pub content_root: String,

    /// Glob, relative to the content root, selecting content files
    #[serde(default = "default_file_glob")]
    pub file_glob: String,

    #[serde(default = "default_max_id_length")]
    pub max_id_length: usize,

    /// Media files larger than this get a warning
    #[serde(default = "default_max_media_bytes")]
    pub max_media_bytes: u64,

    /// Content documents per bulk write
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_content_root() -> String {
    "content".to_string()
}

fn default_file_glob() -> String {
    "*.json".to_string()
}

fn default_max_id_length() -> usize {
    DEFAULT_MAX_ID_LENGTH
}

fn default_max_media_bytes() -> u64 {
    2 * 1024 * 1024
}

fn default_batch_size() -> usize {
    1000
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            file_glob: default_file_glob(),
            max_id_length: default_max_id_length(),
            max_media_bytes: default_max_media_bytes(),
            batch_size: default_batch_size(),
        }
    }
}

impl IndexerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.file_glob.trim().is_empty() {
            return Err("File glob must not be empty".to_string());
        }

        if self.max_id_length == 0 {
            return Err("Max id length must be > 0".to_string());
        }

        if self.batch_size == 0 {
            return Err("Batch size must be > 0".to_string());
        }

        Ok(())
    }

    /// Glob over snapshot paths selecting content files.
    pub fn content_pattern(&self) -> String {
        self.under_root(&self.file_glob)
    }

    /// Glob over snapshot paths selecting everything under the content root.
    pub fn root_pattern(&self) -> String {
        self.under_root("*")
    }

    fn under_root(&self, glob: &str) -> String {
        let root = self.content_root.trim_matches('/');
        if root.is_empty() {
            glob.to_string()
        } else {
            format!("{root}/{glob}")
        }
    }
}
