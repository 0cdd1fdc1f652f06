use crate::error::AnchorError;
use crate::git::topology::TopologicalSorter;
use crate::store::StagingStore;
use std::path::Path;

/// What a detection run decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteAction {
    None,
    ReAtomize,
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub force_push_detected: bool,
    pub stored_digest: Option<String>,
    pub current_digest: String,
    pub action: RewriteAction,
}

/// Detects repository history rewrites (force-pushes) by comparing the stored
/// parent-relationship digest against a freshly computed one.
pub struct ForcePushDetector<'a> {
    store: &'a mut StagingStore,
}

impl<'a> ForcePushDetector<'a> {
    pub fn new(store: &'a mut StagingStore) -> Self {
        ForcePushDetector { store }
    }

    /// Compares digests for one repository.
    ///
    /// First run (no stored digest): persists the fresh digest, action `None`.
    /// Matching digests: action `None`. Mismatch: history was rewritten,
    /// action `ReAtomize`.
    pub fn check(&mut self, repo_id: i64, repo_path: &Path) -> Result<DetectionResult, AnchorError> {
        let stored = self.store.parent_digest(repo_id)?;

        let sorter = TopologicalSorter::new(repo_path);
        let current = sorter.parent_digest()?;

        let Some(stored) = stored else {
            crate::utils::debug_log(&format!(
                "no stored parent digest for repo {}, first check: {}",
                repo_id,
                short(&current)
            ));
            self.store.set_parent_digest(repo_id, &current)?;
            return Ok(DetectionResult {
                force_push_detected: false,
                stored_digest: None,
                current_digest: current,
                action: RewriteAction::None,
            });
        };

        if stored != current {
            eprintln!(
                "force-push detected for repo {}: stored {} != current {}",
                repo_id,
                short(&stored),
                short(&current)
            );
            return Ok(DetectionResult {
                force_push_detected: true,
                stored_digest: Some(stored),
                current_digest: current,
                action: RewriteAction::ReAtomize,
            });
        }

        Ok(DetectionResult {
            force_push_detected: false,
            stored_digest: Some(stored),
            current_digest: current,
            action: RewriteAction::None,
        })
    }

    /// Invalidates all derived semantic data for the repository and records
    /// the new digest, as one all-or-nothing transaction. Partial
    /// invalidation would leave stale rows pointing at blocks with no
    /// consistent history, so a failure leaves the stored digest untouched
    /// and a retry re-detects the same mismatch.
    pub fn trigger_re_atomization(
        &mut self,
        repo_id: i64,
        new_digest: &str,
    ) -> Result<(), AnchorError> {
        crate::utils::debug_log(&format!(
            "re-atomizing repo {} under digest {}",
            repo_id,
            short(new_digest)
        ));
        self.store.re_atomize(repo_id, new_digest)
    }
}

/// Digest prefix for log lines. A stored digest is normally 64 hex chars but
/// may be arbitrary text if the row was hand-edited.
fn short(digest: &str) -> &str {
    digest.get(..16).unwrap_or(digest)
}
