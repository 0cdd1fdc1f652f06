//! Scratch git repositories for integration tests. Compiled only with the
//! `test-support` feature, which tests enable through the path
//! dev-dependency on this crate.

use crate::error::AnchorError;
use git2::{IndexAddOption, Repository};
use std::fs;
use std::path::{Path, PathBuf};

// Simple LCG for temp directory names; dev-dependencies are not visible to
// feature-gated modules of the main crate, so no rand here.
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    fn gen_random_string(&mut self, len: usize) -> String {
        const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        (0..len)
            .map(|_| CHARS[(self.next() % CHARS.len() as u64) as usize] as char)
            .collect()
    }
}

/// A temporary git repository, deleted on drop.
pub struct TmpRepo {
    path: PathBuf,
    repo: Repository,
}

impl TmpRepo {
    pub fn new() -> Result<Self, AnchorError> {
        let mut rng = SimpleRng::new();
        let path = std::env::temp_dir().join(format!("code-anchor-test-{}", rng.gen_random_string(10)));
        fs::create_dir_all(&path)?;

        let repo = Repository::init(&path)?;
        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        Ok(TmpRepo { path, repo })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a file relative to the repository root, creating parent
    /// directories as needed.
    pub fn write_file(&self, name: &str, contents: &str) -> Result<(), AnchorError> {
        let full = self.path.join(name);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, contents)?;
        Ok(())
    }

    /// Renames a file on disk; pair with `commit_all` so git records the
    /// rename.
    pub fn rename_file(&self, old: &str, new: &str) -> Result<(), AnchorError> {
        let to = self.path.join(new);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.path.join(old), to)?;
        Ok(())
    }

    /// Stages everything (including deletions) and commits. Returns the new
    /// commit SHA.
    pub fn commit_all(&self, message: &str) -> Result<String, AnchorError> {
        let tree_id = {
            let mut index = self.repo.index()?;
            index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
            index.update_all(["*"].iter(), None)?;
            index.write()?;
            index.write_tree()?
        };
        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.repo.signature()?;

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(oid.to_string())
    }

    /// Amends HEAD in place. This rewrites an existing commit, which changes
    /// the parent-relationship digest the way a force-push does.
    pub fn amend_head(&self, message: &str) -> Result<String, AnchorError> {
        let head = self.repo.head()?.peel_to_commit()?;

        let tree_id = {
            let mut index = self.repo.index()?;
            index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
            index.update_all(["*"].iter(), None)?;
            index.write()?;
            index.write_tree()?
        };
        let tree = self.repo.find_tree(tree_id)?;

        let oid = head.amend(Some("HEAD"), None, None, None, Some(message), Some(&tree))?;
        Ok(oid.to_string())
    }
}

impl Drop for TmpRepo {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
