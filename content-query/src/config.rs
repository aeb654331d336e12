use corpus_search_store::WeightedField;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the query layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Alias every runtime query is scoped to
    #[serde(default = "default_alias")]
    pub alias: String,

    /// Only return content marked as published
    #[serde(default = "default_true")]
    pub published_only: bool,

    /// Hide content carrying the regression tag
    #[serde(default = "default_true")]
    pub exclude_regression_content: bool,

    #[serde(default = "default_regression_tag")]
    pub regression_tag: String,

    /// Maximum number of cached query results
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Seconds a cached result survives without being read
    #[serde(default = "default_cache_idle_secs")]
    pub cache_idle_secs: u64,

    /// Seconds an alias resolution is trusted before asking the backend again
    #[serde(default = "default_version_cache_ttl_secs")]
    pub version_cache_ttl_secs: u64,

    /// Largest page a single call may request
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Boost per document type in site-wide search
    #[serde(default = "default_site_search_boosts")]
    pub site_search_boosts: BTreeMap<String, f32>,

    /// Fields searched by fuzzy text search, with weights
    #[serde(default = "default_fuzzy_fields")]
    pub fuzzy_fields: Vec<WeightedField>,
}

fn default_alias() -> String {
    "live".to_string()
}

fn default_true() -> bool {
    true
}

fn default_regression_tag() -> String {
    "regression_test".to_string()
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_cache_idle_secs() -> u64 {
    24 * 60 * 60
}

fn default_version_cache_ttl_secs() -> u64 {
    60
}

fn default_max_page_size() -> usize {
    1_000
}

fn default_site_search_boosts() -> BTreeMap<String, f32> {
    [
        ("questionPage", 1.0),
        ("conceptPage", 1.5),
        ("page", 1.0),
        ("event", 1.0),
    ]
    .into_iter()
    .map(|(tag, boost)| (tag.to_string(), boost))
    .collect()
}

fn default_fuzzy_fields() -> Vec<WeightedField> {
    vec![
        WeightedField::new("title", 2.0),
        WeightedField::new("summary", 1.5),
        WeightedField::new("tags", 1.0),
        WeightedField::new("searchableContent", 1.0),
    ]
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            published_only: true,
            exclude_regression_content: true,
            regression_tag: default_regression_tag(),
            cache_capacity: default_cache_capacity(),
            cache_idle_secs: default_cache_idle_secs(),
            version_cache_ttl_secs: default_version_cache_ttl_secs(),
            max_page_size: default_max_page_size(),
            site_search_boosts: default_site_search_boosts(),
            fuzzy_fields: default_fuzzy_fields(),
        }
    }
}

impl QueryConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.alias.trim().is_empty() {
            return Err("alias must not be empty".to_string());
        }

        if self.exclude_regression_content && self.regression_tag.trim().is_empty() {
            return Err("regression_tag must be set when excluding regression content".to_string());
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }

        if self.max_page_size == 0 {
            return Err("max_page_size must be > 0".to_string());
        }

        if self.site_search_boosts.is_empty() {
            return Err("site_search_boosts must name at least one document type".to_string());
        }

        if let Some((tag, boost)) = self
            .site_search_boosts
            .iter()
            .find(|(_, boost)| !boost.is_finite() || **boost <= 0.0)
        {
            return Err(format!("boost for {tag} must be > 0, got {boost}"));
        }

        if self.fuzzy_fields.is_empty() {
            return Err("fuzzy_fields must not be empty".to_string());
        }

        if let Some(field) = self
            .fuzzy_fields
            .iter()
            .find(|field| !field.weight.is_finite() || field.weight <= 0.0)
        {
            return Err(format!(
                "weight for {} must be > 0, got {}",
                field.field, field.weight
            ));
        }

        Ok(())
    }

    pub fn cache_idle(&self) -> Duration {
        Duration::from_secs(self.cache_idle_secs)
    }

    pub fn version_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.version_cache_ttl_secs)
    }

    /// Config that shows unpublished and regression content, as an editor
    /// previewing a version would want.
    pub fn preview() -> Self {
        Self {
            published_only: false,
            exclude_regression_content: false,
            ..Default::default()
        }
    }
}
