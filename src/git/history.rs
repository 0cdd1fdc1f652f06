use crate::error::AnchorError;
use crate::git::run_git;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Tracks file history across renames using `git log --follow`.
///
/// This is what lets a *current* working-tree path be resolved against graph
/// nodes that were recorded under an older path. For example, if a file was
/// reorganized from `shared/config/settings.py` to
/// `src/shared/config/settings.py`, both paths are returned.
#[derive(Clone)]
pub struct HistoryTracker {
    repo_path: PathBuf,
}

impl HistoryTracker {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        HistoryTracker {
            repo_path: repo_path.into(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Returns all historical paths for a file, deduplicated, in the order
    /// they appear in history (current path first, older paths after).
    ///
    /// Fails with `HistoryUnavailable` when the path has no commits or does
    /// not exist.
    pub fn file_history(&self, file_path: &str) -> Result<Vec<String>, AnchorError> {
        // --name-only shows only file paths, --pretty=format: suppresses the
        // commit metadata between them.
        let output = run_git(
            &self.repo_path,
            &[
                "log",
                "--follow",
                "--name-only",
                "--pretty=format:",
                "--",
                file_path,
            ],
        )
        .map_err(|_| AnchorError::HistoryUnavailable(file_path.to_string()))?;

        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for line in output.lines() {
            let line = line.trim();
            if !line.is_empty() && seen.insert(line.to_string()) {
                paths.push(line.to_string());
            }
        }

        if paths.is_empty() {
            return Err(AnchorError::HistoryUnavailable(file_path.to_string()));
        }

        Ok(paths)
    }

    /// Returns historical paths for multiple files. Each path is processed
    /// independently: a path that errors is silently omitted from the result,
    /// and the batch only fails if every path failed.
    pub fn file_history_batch(
        &self,
        file_paths: &[String],
    ) -> Result<HashMap<String, Vec<String>>, AnchorError> {
        let mut result = HashMap::new();

        for file_path in file_paths {
            match self.file_history(file_path) {
                Ok(paths) => {
                    result.insert(file_path.clone(), paths);
                }
                Err(_) => continue,
            }
        }

        if result.is_empty() {
            return Err(AnchorError::NoHistoryFound(file_paths.len()));
        }

        Ok(result)
    }
}
