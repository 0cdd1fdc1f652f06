use crate::config::Config;
use crate::error::AnchorError;
use std::path::Path;
use std::process::Command;

pub mod diff;
pub mod diff_chunker;
pub mod force_push;
pub mod history;
pub mod language;
#[cfg(feature = "test-support")]
pub mod test_utils;
pub mod topology;

/// Run a git subcommand against a specific working copy and return stdout.
///
/// Every component takes the repository path explicitly so that resolution of
/// multiple repositories can run in parallel without touching the process
/// working directory.
pub(crate) fn run_git(repo_path: &Path, args: &[&str]) -> Result<String, AnchorError> {
    let output = Command::new(Config::get().git_cmd())
        .args(args)
        .current_dir(repo_path)
        .output()
        .map_err(|e| AnchorError::GitCommand(format!("git {}: {}", args.join(" "), e)))?;

    if !output.status.success() {
        return Err(AnchorError::GitCommand(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8(output.stdout)?)
}
