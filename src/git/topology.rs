use crate::error::AnchorError;
use crate::git::run_git;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;

/// Computes topological orderings and the parent-relationship digest for a
/// repository's commit graph.
pub struct TopologicalSorter {
    repo_path: PathBuf,
}

impl TopologicalSorter {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        TopologicalSorter {
            repo_path: repo_path.into(),
        }
    }

    /// Returns a map of commit SHA to 0-based topological index.
    /// Parents always have a lower index than their children.
    pub fn topological_order(&self) -> Result<HashMap<String, usize>, AnchorError> {
        let output = run_git(&self.repo_path, &["rev-list", "--topo-order", "--reverse", "HEAD"])?;

        let mut result = HashMap::new();
        for (index, line) in output.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            result.insert(line.trim().to_string(), index);
        }

        Ok(result)
    }

    /// Computes a SHA-256 digest over the complete `(commit, parents)`
    /// relation reachable from HEAD. Rewriting any existing parent link (the
    /// signature of a force-push) changes the digest. Appending commits also
    /// changes it, which is why checks run at ingestion boundaries where the
    /// stored digest is refreshed afterwards.
    pub fn parent_digest(&self) -> Result<String, AnchorError> {
        let output = run_git(&self.repo_path, &["log", "--format=%H:%P", "HEAD"])?;

        let hash = Sha256::digest(output.as_bytes());
        Ok(format!("{:x}", hash))
    }

    /// Retrieves parent SHAs for a single commit. A root commit yields an
    /// empty list.
    pub fn commit_parents(&self, commit_sha: &str) -> Result<Vec<String>, AnchorError> {
        let output = run_git(&self.repo_path, &["log", "-1", "--format=%P", commit_sha])?;

        let parents = output.trim();
        if parents.is_empty() {
            return Ok(Vec::new());
        }

        Ok(parents.split_whitespace().map(|s| s.to_string()).collect())
    }

    /// Retrieves parents for multiple commits. A commit whose lookup fails
    /// degrades to an empty parent list rather than failing the batch.
    pub fn batch_commit_parents(&self, commit_shas: &[String]) -> HashMap<String, Vec<String>> {
        let mut result = HashMap::new();

        for sha in commit_shas {
            let parents = self.commit_parents(sha).unwrap_or_default();
            result.insert(sha.clone(), parents);
        }

        result
    }
}
