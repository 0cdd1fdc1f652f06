use clap::{Parser, Subcommand};
use code_anchor::config::Config;
use code_anchor::error::AnchorError;
use code_anchor::git::diff::file_diff;
use code_anchor::git::diff_chunker::{DiffChunker, extract_chunks_for_new_file, extract_excerpt_for_resolution};
use code_anchor::git::force_push::{ForcePushDetector, RewriteAction};
use code_anchor::git::history::HistoryTracker;
use code_anchor::git::language::detect_language;
use code_anchor::git::topology::TopologicalSorter;
use code_anchor::graph::HttpGraphClient;
use code_anchor::store::StagingStore;
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "code-anchor")]
#[command(about = "resolves working-tree changes onto persistent code-graph identities", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to the git working copy
    #[arg(long, default_value = ".", global = true)]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve current paths to historical graph paths with confidence scores
    Resolve {
        paths: Vec<String>,
        /// Print only the single best match per path
        #[arg(long)]
        single: bool,
        /// Per-path deadline in seconds for batch resolution
        #[arg(long)]
        deadline: Option<u64>,
    },
    /// Show every historical path a file has had across renames
    History { path: String },
    /// Split a diff (stdin, or a file's staged/working diff) into bounded chunks
    Chunk {
        /// Read this file's diff from git instead of stdin
        #[arg(long)]
        path: Option<String>,
        /// Chunk a whole new file by top-level function boundaries
        #[arg(long)]
        new_file: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        max_chunk_size: usize,
        #[arg(long, default_value_t = 0)]
        max_chunks: usize,
    },
    /// Print the bounded excerpt used for entity resolution
    Excerpt {
        #[arg(long, default_value_t = 1500)]
        token_budget: usize,
    },
    /// Print commit SHAs with their topological indices
    TopoOrder,
    /// Check for a history rewrite; optionally invalidate derived data
    CheckRewrite {
        #[arg(long)]
        db: Option<PathBuf>,
        /// On detection, run the all-or-nothing re-atomization transaction
        #[arg(long)]
        re_atomize: bool,
    },
}

fn main() {
    Config::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AnchorError> {
    match cli.command {
        Commands::Resolve { paths, single, deadline } => {
            let graph = HttpGraphClient::from_config().ok_or_else(|| {
                AnchorError::Generic("no graph endpoint configured (set CODE_ANCHOR_GRAPH_URL)".to_string())
            })?;
            let resolver = code_anchor::resolution::FileResolver::new(&cli.repo, Arc::new(graph));

            if single {
                for path in &paths {
                    let (resolved, confidence) = resolver.resolve_to_single_path(path)?;
                    println!("{}", json!({"path": path, "resolved": resolved, "confidence": confidence}));
                }
                return Ok(());
            }

            let results = resolver.batch_resolve(&paths, deadline.map(Duration::from_secs));
            for path in &paths {
                let matches: Vec<_> = results
                    .get(path)
                    .map(|ms| {
                        ms.iter()
                            .map(|m| {
                                json!({
                                    "historical_path": m.historical_path,
                                    "confidence": m.confidence,
                                    "method": m.method.to_string(),
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                println!("{}", json!({"path": path, "matches": matches}));
            }
        }

        Commands::History { path } => {
            let tracker = HistoryTracker::new(&cli.repo);
            for historical in tracker.file_history(&path)? {
                println!("{}", historical);
            }
        }

        Commands::Chunk { path, new_file, max_chunk_size, max_chunks } => {
            if let Some(new_file) = new_file {
                let content = std::fs::read_to_string(&new_file)?;
                let language = detect_language(&new_file.to_string_lossy());
                let chunks = extract_chunks_for_new_file(&content, &language, max_chunks);
                for (i, chunk) in chunks.iter().enumerate() {
                    println!(
                        "{}",
                        json!({
                            "chunk": i,
                            "start_line": chunk.start_line,
                            "end_line": chunk.end_line,
                            "lines": chunk.lines.len(),
                            "size_bytes": chunk.size_bytes,
                            "header": chunk.file_header,
                        })
                    );
                }
                return Ok(());
            }

            let diff = match path {
                Some(path) => file_diff(&cli.repo, &path)?,
                None => read_stdin()?,
            };

            let chunker = DiffChunker::new(max_chunk_size);
            for (i, chunk) in chunker.extract_chunks(&diff).iter().enumerate() {
                println!(
                    "{}",
                    json!({
                        "chunk": i,
                        "file_path": chunk.file_path,
                        "start_line": chunk.start_line,
                        "end_line": chunk.end_line,
                        "size_bytes": chunk.size_bytes,
                    })
                );
            }
        }

        Commands::Excerpt { token_budget } => {
            let diff = read_stdin()?;
            print!("{}", extract_excerpt_for_resolution(&diff, token_budget).format());
        }

        Commands::TopoOrder => {
            let sorter = TopologicalSorter::new(&cli.repo);
            let order = sorter.topological_order()?;
            let mut entries: Vec<_> = order.into_iter().collect();
            entries.sort_by_key(|(_, index)| *index);
            for (sha, index) in entries {
                println!("{} {}", index, sha);
            }
        }

        Commands::CheckRewrite { db, re_atomize } => {
            let db_path = db.unwrap_or_else(default_db_path);
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut store = StagingStore::open(&db_path)?;
            let repo_id = store.ensure_repository(&cli.repo.to_string_lossy())?;

            let mut detector = ForcePushDetector::new(&mut store);
            let result = detector.check(repo_id, &cli.repo)?;

            println!(
                "{}",
                json!({
                    "force_push_detected": result.force_push_detected,
                    "stored_digest": result.stored_digest,
                    "current_digest": result.current_digest,
                    "action": match result.action {
                        RewriteAction::None => "none",
                        RewriteAction::ReAtomize => "re_atomize",
                    },
                })
            );

            if result.action == RewriteAction::ReAtomize && re_atomize {
                detector.trigger_re_atomization(repo_id, &result.current_digest)?;
                eprintln!("derived data invalidated; repository marked for re-processing");
            }
        }
    }

    Ok(())
}

fn read_stdin() -> Result<String, AnchorError> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("code-anchor")
        .join("staging.db")
}
