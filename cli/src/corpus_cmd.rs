use crate::config::CliConfig;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use corpus_indexer::BuildOutcome;
use corpus_indexer::ContentIndexer;
use corpus_indexer::IndexPhase;
use corpus_indexer::IndexProgress;
use corpus_indexer::ProgressCallback;
use corpus_model::VersionId;
use corpus_query::ContentQueryService;
use corpus_query::SiteSearchRequest;
use corpus_search_store::IndexCategory;
use corpus_search_store::InMemoryBackend;
use corpus_search_store::SearchBackend;
use corpus_version_store::GitVersionStore;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "corpus", about = "Build and query versioned content indices")]
pub struct CorpusCli {
    /// TOML config file with [indexer] and [query] sections
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON file holding the search store
    #[arg(long, global = true, value_name = "FILE", default_value = "corpus-store.json")]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: CorpusCommand,
}

#[derive(Debug, Subcommand)]
pub enum CorpusCommand {
    /// Index the content of a git reference
    Rebuild(RebuildArgs),

    /// Show or repoint an alias
    Alias(AliasArgs),

    /// Print one content node as JSON
    Get(GetArgs),

    /// Search the aliased version
    Search(SearchArgs),

    /// List indexing problems of the aliased version
    Problems(ProblemsArgs),

    /// Delete every index of a version
    Expunge(ExpungeArgs),
}

#[derive(Debug, Parser)]
pub struct RebuildArgs {
    /// Git repository holding the content
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub repo: PathBuf,

    /// Branch, tag or commit to index
    #[arg(value_name = "REF")]
    pub reference: String,

    /// Point the configured alias at the version once it is built
    #[arg(long)]
    pub publish: bool,

    /// Show progress during indexing
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Parser)]
pub struct AliasArgs {
    #[command(subcommand)]
    pub command: AliasCommand,
}

#[derive(Debug, Subcommand)]
pub enum AliasCommand {
    /// Point an alias at a fully indexed version
    Set {
        name: String,
        version: String,
    },

    /// Print the version an alias points at
    Show { name: String },
}

#[derive(Debug, Parser)]
pub struct GetArgs {
    pub id: String,

    /// Fill in summaries of related content
    #[arg(long)]
    pub related: bool,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    /// Typo-tolerant search over weighted fields instead of site search
    #[arg(long)]
    pub fuzzy: bool,

    /// Restrict to a document type; repeatable
    #[arg(long = "type", value_name = "TYPE")]
    pub types: Vec<String>,

    /// Include events that have already finished
    #[arg(long)]
    pub past_events: bool,
}

#[derive(Debug, Parser)]
pub struct ProblemsArgs {
    #[arg(long, default_value_t = 0)]
    pub from: usize,

    #[arg(short = 'n', long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Debug, Parser)]
pub struct ExpungeArgs {
    pub version: String,

    /// Expunge even when the configured alias points at the version
    #[arg(short, long)]
    pub force: bool,
}

impl CorpusCli {
    pub async fn run(self) -> Result<()> {
        let config = CliConfig::load(self.config.as_deref())?;
        let backend = InMemoryBackend::open(&self.store)
            .await
            .with_context(|| format!("Failed to open store {}", self.store.display()))?;
        let backend: Arc<dyn SearchBackend> = Arc::new(backend);
        match self.command {
            CorpusCommand::Rebuild(args) => run_rebuild(args, config, backend).await,
            CorpusCommand::Alias(args) => run_alias(args, config, backend).await,
            CorpusCommand::Get(args) => run_get(args, config, backend).await,
            CorpusCommand::Search(args) => run_search(args, config, backend).await,
            CorpusCommand::Problems(args) => run_problems(args, config, backend).await,
            CorpusCommand::Expunge(args) => run_expunge(args, config, backend).await,
        }
    }
}

async fn run_rebuild(
    args: RebuildArgs,
    config: CliConfig,
    backend: Arc<dyn SearchBackend>,
) -> Result<()> {
    let store = Arc::new(GitVersionStore::new(&args.repo));
    let indexer = ContentIndexer::new(config.indexer, store, Arc::clone(&backend))
        .context("Failed to initialize indexer")?;

    let progress: Option<ProgressCallback> = args.verbose.then(|| {
        let callback: ProgressCallback = Arc::new(|progress: IndexProgress| match progress.phase {
            IndexPhase::Parsing => {
                if let Some(file) = progress.current_file {
                    eprintln!("  [{}/{}] {file}", progress.current, progress.total);
                }
            }
            phase => eprintln!("{} {phase:?}", "▶".bright_blue()),
        });
        callback
    });

    let outcome = indexer
        .build(&args.reference, progress)
        .await
        .with_context(|| format!("Failed to index {}", args.reference))?;

    match &outcome {
        BuildOutcome::AlreadyIndexed(version) => {
            println!("{} {version} is already indexed", "✓".bright_green());
        }
        BuildOutcome::Built { version, stats } => {
            println!("{} Indexed {version}", "✓".bright_green());
            println!("  Files processed: {}", stats.files_processed.bright_cyan());
            println!("  Nodes indexed: {}", stats.nodes_indexed.bright_cyan());
            println!("  Tags: {}", stats.tags.bright_cyan());
            println!("  Problem records: {}", stats.problem_records.bright_cyan());
            println!("  Errors: {}", stats.errors.bright_cyan());
            if stats.write.skipped > 0 {
                println!("  Skipped writes: {}", stats.write.skipped.yellow());
            }
        }
    }

    if args.publish {
        let service = ContentQueryService::new(config.query, backend)?;
        service.publish(outcome.version()).await?;
        info!(version = %outcome.version(), alias = %service.config().alias, "published version");
        println!(
            "{} {} now points at {}",
            "✓".bright_green(),
            service.config().alias,
            outcome.version()
        );
    }
    Ok(())
}

async fn run_alias(
    args: AliasArgs,
    config: CliConfig,
    backend: Arc<dyn SearchBackend>,
) -> Result<()> {
    let service = ContentQueryService::new(config.query, backend)?;
    match args.command {
        AliasCommand::Set { name, version } => {
            let version = VersionId::from(version);
            service.aliases().set_alias(&name, &version).await?;
            println!("{} {name} now points at {version}", "✓".bright_green());
        }
        AliasCommand::Show { name } => {
            let version = service.aliases().resolve(&name).await?;
            println!("{version}");
        }
    }
    Ok(())
}

async fn run_get(args: GetArgs, config: CliConfig, backend: Arc<dyn SearchBackend>) -> Result<()> {
    let service = ContentQueryService::new(config.query, backend)?;
    let node = if args.related {
        service.get_with_related(&args.id).await?
    } else {
        service.get_by_id(&args.id).await?
    };
    let Some(node) = node else {
        bail!("No content with id {}", args.id);
    };
    println!("{}", serde_json::to_string_pretty(&node)?);
    Ok(())
}

async fn run_search(
    args: SearchArgs,
    config: CliConfig,
    backend: Arc<dyn SearchBackend>,
) -> Result<()> {
    let service = ContentQueryService::new(config.query, backend)?;
    let results = if args.fuzzy {
        service
            .fuzzy_search(&args.text, &args.types, 0, args.limit)
            .await?
    } else {
        let mut request = SiteSearchRequest::new(&args.text, args.limit).with_types(args.types);
        request.include_past_events = args.past_events;
        service.site_wide_search(&request).await?
    };

    if results.is_empty() {
        println!("No results for '{}'", args.text);
        return Ok(());
    }
    println!(
        "{} {} of {} results",
        "▶".bright_blue(),
        results.len(),
        results.total
    );
    for (i, node) in results.results.iter().enumerate() {
        println!(
            "{}. {} {} {}",
            i + 1,
            node.id.as_deref().unwrap_or_default().bright_cyan(),
            node.type_tag().dimmed(),
            node.title.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

async fn run_problems(
    args: ProblemsArgs,
    config: CliConfig,
    backend: Arc<dyn SearchBackend>,
) -> Result<()> {
    let service = ContentQueryService::new(config.query, backend)?;
    let page = service.get_problems(args.from, args.limit).await?;
    for document in &page.results {
        let node = match (&document.node_id, document.position.as_str()) {
            (Some(id), _) => id.clone(),
            (None, "") => "-".to_string(),
            (None, position) => format!("at {position}"),
        };
        println!("{} ({node})", document.path.bright_cyan());
        for problem in &document.problems {
            println!("  {}: {}", problem.severity.yellow(), problem.message);
        }
    }
    println!("{} of {} problem records", page.len(), page.total);
    Ok(())
}

async fn run_expunge(
    args: ExpungeArgs,
    config: CliConfig,
    backend: Arc<dyn SearchBackend>,
) -> Result<()> {
    let version = VersionId::from(args.version);
    let live = backend
        .resolve_alias(&config.query.alias, IndexCategory::Content)
        .await?;
    if live.as_ref() == Some(&version) {
        if !args.force {
            bail!(
                "{version} is served by alias {}; pass --force to expunge it anyway",
                config.query.alias
            );
        }
        warn!(%version, alias = %config.query.alias, "expunging a version that is still aliased");
    }
    let removed = backend.expunge_version(&version).await?;
    info!(%version, removed, "expunged version");
    println!("{} Removed {removed} indices for {version}", "✓".bright_green());
    Ok(())
}
