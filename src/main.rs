//! # Loredex CLI (`lore`)
//!
//! The `lore` binary maintains and queries the lore index.
//!
//! ## Usage
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore build` | Build or update the index from the source tree |
//! | `lore status` | Show checkpoint and staleness |
//! | `lore search "<query>"` | Similarity search across lore chunks |
//! | `lore tags` | List tags available in a scope |
//! | `lore campaigns` | List campaigns with lore content |
//! | `lore summary <tag>` | Bounded summary of one tag's content |
//! | `lore context <tag>...` | Assemble persona context from tags |
//! | `lore report <tag>` | Metadata and aggregate stats for a tag |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use loredex::config::{self, Config};
use loredex::manager::IndexManager;
use loredex::retriever::LoreRetriever;

/// Loredex — a file-backed lore index and tag-scoped context retriever
/// for AI game characters.
#[derive(Parser)]
#[command(
    name = "lore",
    about = "Loredex — index lore files and retrieve tag-scoped context for AI characters",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or update the index from the source tree.
    ///
    /// Loads every `*.txt` file under the source root, splits it into
    /// chunks, embeds them, and appends them to the index. With `--clean`
    /// the index and checkpoint are removed first.
    Build {
        /// Remove the existing index and checkpoint before building.
        #[arg(long)]
        clean: bool,
    },

    /// Show checkpoint state and whether the index is stale.
    Status,

    /// Similarity search across indexed lore chunks.
    Search {
        /// The search query string.
        query: String,

        /// Confine results to one campaign's lore.
        #[arg(long)]
        campaign: Option<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List tags available in a scope (global by default).
    Tags {
        /// List a campaign's tags instead of global ones.
        #[arg(long)]
        campaign: Option<String>,
    },

    /// List campaigns that have lore content.
    Campaigns,

    /// Print a bounded summary of one tag's content.
    Summary {
        /// Tag name.
        tag: String,

        /// Confine to one campaign's lore.
        #[arg(long)]
        campaign: Option<String>,

        /// Character budget for the summary.
        #[arg(long)]
        max_length: Option<usize>,
    },

    /// Assemble persona context from declared tags and an optional query.
    Context {
        /// Tag names in priority order.
        #[arg(required = true)]
        tags: Vec<String>,

        /// Free-text query used to top up remaining slots.
        #[arg(long, default_value = "")]
        query: String,

        /// Campaign the persona belongs to.
        #[arg(long)]
        campaign: Option<String>,

        /// Hard cap on context entries.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print metadata and aggregate statistics for a tag.
    Report {
        /// Tag name.
        tag: String,

        /// Confine to one campaign's lore.
        #[arg(long)]
        campaign: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build { clean } => run_build(&cfg, clean).await?,
        Commands::Status => run_status(&cfg)?,
        Commands::Search {
            query,
            campaign,
            limit,
        } => run_search(&cfg, &query, campaign.as_deref(), limit).await?,
        Commands::Tags { campaign } => run_tags(&cfg, campaign.as_deref()).await?,
        Commands::Campaigns => run_campaigns(&cfg).await?,
        Commands::Summary {
            tag,
            campaign,
            max_length,
        } => run_summary(&cfg, &tag, campaign.as_deref(), max_length).await?,
        Commands::Context {
            tags,
            query,
            campaign,
            limit,
        } => run_context(&cfg, &tags, &query, campaign.as_deref(), limit).await?,
        Commands::Report { tag, campaign } => run_report(&cfg, &tag, campaign.as_deref()).await?,
    }

    Ok(())
}

async fn run_build(cfg: &Config, clean: bool) -> Result<()> {
    let manager = IndexManager::new(cfg);
    match manager.rebuild(clean).await? {
        Some(index) => {
            use loredex::index::ChunkIndex;
            println!("build complete");
            println!("  chunks indexed: {}", index.count().await?);
            index.close().await;
        }
        None => {
            println!("no lore files found under {}", cfg.paths.source_root.display());
        }
    }
    Ok(())
}

fn run_status(cfg: &Config) -> Result<()> {
    let manager = IndexManager::new(cfg);
    match manager.read_checkpoint() {
        Some(cp) => {
            println!("checkpoint: {} (version {})", cp.last_updated.to_rfc3339(), cp.version);
        }
        None => println!("checkpoint: none"),
    }
    println!("stale: {}", manager.is_stale()?);
    Ok(())
}

async fn run_search(
    cfg: &Config,
    query: &str,
    campaign: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let retriever = LoreRetriever::open(cfg).await?;
    let k = limit.unwrap_or(cfg.retrieval.search_k);
    let results = retriever.similarity_search(query, k, campaign).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, sc) in results.iter().enumerate() {
        let campaign = sc.chunk.meta.campaign.as_deref().unwrap_or("global");
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            sc.score,
            campaign,
            sc.chunk.meta.tag_name
        );
        println!("    excerpt: \"{}\"", excerpt(&sc.chunk.text));
    }
    Ok(())
}

async fn run_tags(cfg: &Config, campaign: Option<&str>) -> Result<()> {
    let retriever = LoreRetriever::open(cfg).await?;
    let tags = retriever.available_tags(campaign);
    if tags.is_empty() {
        println!("No tags.");
    }
    for tag in tags {
        println!("{tag}");
    }
    Ok(())
}

async fn run_campaigns(cfg: &Config) -> Result<()> {
    let retriever = LoreRetriever::open(cfg).await?;
    let campaigns = retriever.available_campaigns();
    if campaigns.is_empty() {
        println!("No campaigns.");
    }
    for campaign in campaigns {
        println!("{campaign}");
    }
    Ok(())
}

async fn run_summary(
    cfg: &Config,
    tag: &str,
    campaign: Option<&str>,
    max_length: Option<usize>,
) -> Result<()> {
    let retriever = LoreRetriever::open(cfg).await?;
    let max_length = max_length.unwrap_or(cfg.retrieval.summary_max_length);
    println!("{}", retriever.tag_summary(tag, campaign, max_length).await?);
    Ok(())
}

async fn run_context(
    cfg: &Config,
    tags: &[String],
    query: &str,
    campaign: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let retriever = LoreRetriever::open(cfg).await?;
    let k = limit.unwrap_or(cfg.retrieval.persona_k);
    let entries = retriever
        .assemble_persona_context(tags, query, campaign, k)
        .await?;

    if entries.is_empty() {
        println!("No context.");
        return Ok(());
    }
    for (tag, content) in &entries {
        println!("[{tag}]");
        println!("{content}");
        println!();
    }
    Ok(())
}

async fn run_report(cfg: &Config, tag: &str, campaign: Option<&str>) -> Result<()> {
    let retriever = LoreRetriever::open(cfg).await?;
    match retriever.metadata_report(tag, campaign).await? {
        Some(report) => {
            println!("tag: {}", report.meta.tag_name);
            println!("scope: {}", report.meta.scope.as_str());
            if let Some(campaign) = &report.meta.campaign {
                println!("campaign: {campaign}");
            }
            println!("path: {}", report.meta.path.display());
            println!("total documents: {}", report.total_documents);
            println!("total content length: {}", report.total_content_length);
            println!("average chunk size: {}", report.average_chunk_size);
        }
        None => println!("No content found for tag '{tag}'"),
    }
    Ok(())
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() > 120 {
        let cut: String = trimmed.chars().take(120).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
