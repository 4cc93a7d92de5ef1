//! # polyvis CLI
//!
//! Commands for boxing Markdown into locus units, auditing boxed files,
//! running the two-phase ingestion pipeline, querying the graph, and
//! managing the embedding daemon.
//!
//! ## Usage
//!
//! ```bash
//! polyvis --config ./polyvis.settings.json <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `polyvis init` | Create the store and run schema migrations |
//! | `polyvis box --file <in>` | Segment a Markdown file into bento boxes |
//! | `polyvis audit --file <src> --output <boxed>` | Verify a boxed file lost nothing |
//! | `polyvis ingest` | Run the full pipeline (persona, then experience) |
//! | `polyvis search "<query>"` | Hybrid semantic + keyword search |
//! | `polyvis get <id>` | Print a node and its edges |
//! | `polyvis stats` | Store statistics |
//! | `polyvis harvest [<dir>]` | Report unknown `tag-<slug>` stubs |
//! | `polyvis daemon start\|stop\|status` | Embedding service lifecycle |
//!
//! Exit codes: 0 success, 1 operational failure, 2 validation failure.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use polyvis::{audit, box_cmd, config, daemon, get, harvest, ingest, search, stats, store};

#[derive(Parser)]
#[command(
    name = "polyvis",
    about = "Markdown knowledge graph with hybrid semantic + keyword retrieval",
    version
)]
struct Cli {
    /// Path to the settings file (JSON).
    #[arg(long, global = true, default_value = "./polyvis.settings.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the resonance store and run schema migrations.
    Init,

    /// Segment a Markdown file into bento boxes with locus markers.
    ///
    /// Writes back in place unless `--output` is given. With `--tag`, the
    /// configured LLM proposes relationship tags per box.
    Box {
        /// Input Markdown file.
        #[arg(long)]
        file: PathBuf,

        /// Destination path (defaults to rewriting the input).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Invoke the LLM oracle per box.
        #[arg(long)]
        tag: bool,
    },

    /// Verify that a boxed file preserves its source content.
    ///
    /// Strips locus/tags markers, whitespace-normalizes both sides, and
    /// compares. Exits 1 on divergence.
    Audit {
        /// Original source file.
        #[arg(long)]
        file: PathBuf,

        /// Boxed counterpart to verify.
        #[arg(long)]
        output: PathBuf,
    },

    /// Run the full ingestion pipeline.
    Ingest {
        /// Restrict Phase 2 to a single file.
        #[arg(long, conflicts_with = "dir")]
        file: Option<PathBuf>,

        /// Restrict Phase 2 to a single directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Hybrid search over the graph.
    Search {
        /// The query string.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print a node's content and incident edges.
    Get {
        /// Node id (locus UUID or lexicon slug).
        id: String,
    },

    /// Store statistics.
    Stats,

    /// Report unknown `tag-<slug>` stubs as a Markdown document.
    Harvest {
        /// Directory to scan (defaults to all experience sources).
        dir: Option<PathBuf>,
    },

    /// Embedding daemon lifecycle.
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Serve the embedding API in the foreground.
    Start,
    /// Ask a running daemon to shut down.
    Stop,
    /// Probe daemon health.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let cfg = config::load_config(&cli.config)?;

    let code: i32 = match cli.command {
        Commands::Init => {
            let store = store::GraphStore::open(&cfg.paths.database.resonance).await?;
            store.close().await;
            println!("✅ store initialized at {}", cfg.paths.database.resonance.display());
            0
        }
        Commands::Box { file, output, tag } => {
            box_cmd::run_box(&cfg, &file, output.as_deref(), tag).await?;
            0
        }
        Commands::Audit { file, output } => {
            if audit::run_audit(&file, &output)? {
                0
            } else {
                1
            }
        }
        Commands::Ingest { file, dir } => {
            ingest::run_ingest(&cfg, ingest::IngestScope { file, dir }).await?
        }
        Commands::Search { query, limit } => search::run_search(&cfg, &query, limit).await?,
        Commands::Get { id } => get::run_get(&cfg, &id).await?,
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
            0
        }
        Commands::Harvest { dir } => harvest::run_harvest(&cfg, dir.as_deref())?,
        Commands::Daemon { action } => match action {
            DaemonAction::Start => daemon::start(&cfg).await?,
            DaemonAction::Stop => daemon::stop(&cfg).await?,
            DaemonAction::Status => daemon::status(&cfg).await?,
        },
    };

    Ok(code.clamp(0, u8::MAX as i32) as u8)
}
