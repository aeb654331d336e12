use anyhow::Context;
use anyhow::Result;
use corpus_indexer::IndexerConfig;
use corpus_query::QueryConfig;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

/// Contents of the `--config` TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl CliConfig {
    /// Reads and validates a config file; no path gives the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::parse(&text)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.indexer.validate().map_err(anyhow::Error::msg)?;
        config.query.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }
}
