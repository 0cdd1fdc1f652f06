use crate::error::AnchorError;
use crate::git::history::HistoryTracker;
use crate::graph::GraphQueryer;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Confidence when a current path has a graph node recorded verbatim.
const EXACT_CONFIDENCE: f64 = 1.0;
/// Confidence for paths recovered through rename-following; git's rename
/// detection is accurate but not ground truth.
const GIT_FOLLOW_CONFIDENCE: f64 = 0.95;
/// Placeholder confidence for a brand-new file with no graph node at all.
const NO_MATCH_CONFIDENCE: f64 = 0.3;

const BATCH_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Exact,
    GitFollow,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMethod::Exact => write!(f, "exact"),
            MatchMethod::GitFollow => write!(f, "git-follow"),
        }
    }
}

/// A resolved historical path with its confidence score.
#[derive(Debug, Clone)]
pub struct FileMatch {
    /// Path as stored in the graph.
    pub historical_path: String,
    pub confidence: f64,
    pub method: MatchMethod,
}

/// Bridges current file paths to historical graph nodes with a two-level
/// strategy: exact path match, then rename-aware match via git history.
///
/// Both levels always run. A file can be renamed *after* being recorded under
/// its old path, and equally its newest path may already be indexed; checking
/// only one side would silently drop legitimate matches across a rename.
#[derive(Clone)]
pub struct FileResolver {
    repo_path: PathBuf,
    graph: Arc<dyn GraphQueryer + Send + Sync>,
    history: HistoryTracker,
}

impl FileResolver {
    pub fn new(repo_path: impl Into<PathBuf>, graph: Arc<dyn GraphQueryer + Send + Sync>) -> Self {
        let repo_path = repo_path.into();
        FileResolver {
            history: HistoryTracker::new(&repo_path),
            repo_path,
            graph,
        }
    }

    /// Finds historical graph paths for a current file path, deduplicated by
    /// path with the exact match (if any) first. A store error is propagated
    /// only when both strategies failed; a surviving strategy's matches are
    /// still returned.
    pub fn resolve(&self, current_path: &str) -> Result<Vec<FileMatch>, AnchorError> {
        let mut matches: Vec<FileMatch> = Vec::new();

        let exact = self.exact_match(current_path);
        if let Ok(Some(m)) = &exact {
            matches.push(m.clone());
        }

        let follow = self.git_follow_match(current_path);
        match &follow {
            Ok(follow_matches) => {
                for m in follow_matches {
                    if !matches.iter().any(|existing| existing.historical_path == m.historical_path) {
                        matches.push(m.clone());
                    }
                }
            }
            Err(_) => {}
        }

        if matches.is_empty() {
            if let Err(e) = exact {
                if follow.is_err() {
                    return Err(e);
                }
            }
        }

        Ok(matches)
    }

    /// Returns the best historical path, or `(current_path, 0.3)` when no
    /// graph node matches at all: a brand-new file is a low-confidence
    /// placeholder, not an error.
    pub fn resolve_to_single_path(&self, current_path: &str) -> Result<(String, f64), AnchorError> {
        let matches = self.resolve(current_path)?;

        match matches.into_iter().next() {
            Some(best) => Ok((best.historical_path, best.confidence)),
            None => Ok((current_path.to_string(), NO_MATCH_CONFIDENCE)),
        }
    }

    /// Returns every matched path (for queries that should search across the
    /// whole rename history), or just the current path if none matched.
    pub fn resolve_to_all_paths(&self, current_path: &str) -> Result<Vec<String>, AnchorError> {
        let matches = self.resolve(current_path)?;

        if matches.is_empty() {
            return Ok(vec![current_path.to_string()]);
        }

        Ok(matches.into_iter().map(|m| m.historical_path).collect())
    }

    /// Resolves many paths concurrently and merges the results into one map.
    /// Each path fans out as its own task; a per-path failure omits that
    /// entry without cancelling siblings. `deadline` bounds each task,
    /// treating a timed-out path like a failed one.
    pub fn batch_resolve(
        &self,
        current_paths: &[String],
        deadline: Option<Duration>,
    ) -> HashMap<String, Vec<FileMatch>> {
        let results = Arc::new(Mutex::new(HashMap::new()));

        smol::block_on(async {
            let semaphore = Arc::new(smol::lock::Semaphore::new(BATCH_CONCURRENCY));
            let mut tasks = Vec::new();

            for path in current_paths {
                let resolver = self.clone();
                let path = path.clone();
                let results = results.clone();
                let semaphore = semaphore.clone();

                tasks.push(smol::spawn(async move {
                    let _permit = semaphore.acquire().await;

                    let work = async {
                        smol::unblock(move || resolver.resolve(&path).map(|m| (path, m))).await
                    };

                    let outcome = match deadline {
                        Some(limit) => {
                            smol::future::or(async { Some(work.await) }, async {
                                smol::Timer::after(limit).await;
                                None
                            })
                            .await
                        }
                        None => Some(work.await),
                    };

                    if let Some(Ok((path, matches))) = outcome {
                        results.lock().unwrap().insert(path, matches);
                    }
                }));
            }

            for task in tasks {
                task.await;
            }
        });

        Arc::try_unwrap(results)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_default()
    }

    /// Level 1: is the current path itself recorded in the graph?
    fn exact_match(&self, current_path: &str) -> Result<Option<FileMatch>, AnchorError> {
        let query = "MATCH (f:File) WHERE f.path = $path RETURN f.path AS path LIMIT 1";
        let params = HashMap::from([("path".to_string(), json!(current_path))]);

        let rows = self.graph.execute_query(query, &params)?;

        let Some(path) = rows.first().and_then(|row| row.path()) else {
            return Ok(None);
        };

        Ok(Some(FileMatch {
            historical_path: path.to_string(),
            confidence: EXACT_CONFIDENCE,
            method: MatchMethod::Exact,
        }))
    }

    /// Level 2: which of the file's historical paths are recorded in the
    /// graph? A path with no usable history yields no matches here.
    fn git_follow_match(&self, current_path: &str) -> Result<Vec<FileMatch>, AnchorError> {
        let historical_paths = match self.history.file_history(current_path) {
            Ok(paths) => paths,
            Err(AnchorError::HistoryUnavailable(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let query = "MATCH (f:File) WHERE f.path IN $paths RETURN f.path AS path";
        let params = HashMap::from([("paths".to_string(), Value::from(historical_paths))]);

        let rows = self.graph.execute_query(query, &params)?;

        Ok(rows
            .iter()
            .filter_map(|row| row.path())
            .map(|path| FileMatch {
                historical_path: path.to_string(),
                confidence: GIT_FOLLOW_CONFIDENCE,
                method: MatchMethod::GitFollow,
            })
            .collect())
    }

    pub fn repo_path(&self) -> &std::path::Path {
        &self.repo_path
    }
}
