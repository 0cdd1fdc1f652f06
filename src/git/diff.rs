use crate::error::AnchorError;
use crate::git::run_git;
use std::path::Path;

/// Returns the diff for a specific file: staged changes if any, otherwise the
/// working-tree diff.
pub fn file_diff(repo_path: &Path, file_path: &str) -> Result<String, AnchorError> {
    let staged = run_git(repo_path, &["diff", "--cached", "--", file_path])?;
    if !staged.is_empty() {
        return Ok(staged);
    }

    run_git(repo_path, &["diff", "--", file_path])
}

/// Counts added and deleted lines in a diff, excluding the `+++`/`---` file
/// header lines. Returns `(added, deleted)`.
pub fn count_diff_lines(diff: &str) -> (usize, usize) {
    let mut added = 0;
    let mut deleted = 0;

    for line in diff.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            added += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            deleted += 1;
        }
    }

    (added, deleted)
}
