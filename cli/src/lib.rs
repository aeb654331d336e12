pub mod config;
pub mod corpus_cmd;

pub use config::CliConfig;
pub use corpus_cmd::CorpusCli;
