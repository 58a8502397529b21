//! Atomic multi-file commits against a moving branch head.
//!
//! Built on the low-level git object endpoints: the new tree overlays
//! the tip tree (structural merge, untouched paths survive) and the ref
//! update is non-forced, so a branch that moved between read and write
//! rejects the update instead of losing the concurrent push.

use std::sync::Arc;

use tracing::{debug, info};

use solvebot_core::Error;

use crate::client::{GithubApi, RepoRef, TreeEntry};

/// A planned file write: path and full new content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub path: String,
    pub content: String,
}

/// A set of file writes targeted at one branch.
#[derive(Debug, Clone)]
pub struct CommitPlan {
    pub message: String,
    pub files: Vec<PlannedFile>,
}

impl CommitPlan {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            files: Vec::new(),
        }
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push(PlannedFile {
            path: path.into(),
            content: content.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Result of applying a commit plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every planned content already matched the branch tip.
    NoOp,
    /// A commit was created; carries the new commit sha.
    Committed(String),
}

/// Applies a [`CommitPlan`] to a named branch.
pub struct BranchCommitter {
    api: Arc<dyn GithubApi>,
    repo: RepoRef,
    branch: String,
}

/// Terminate content with exactly one trailing newline.
fn normalize_content(content: &str) -> String {
    format!("{}\n", content.trim_end_matches('\n'))
}

impl BranchCommitter {
    pub fn new(api: Arc<dyn GithubApi>, repo: RepoRef, branch: impl Into<String>) -> Self {
        Self {
            api,
            repo,
            branch: branch.into(),
        }
    }

    /// Apply the plan. Returns `NoOp` without any write when every
    /// planned content already matches the branch tip, and
    /// `Error::ConcurrentModification` when the branch moved during the
    /// commit; callers treat the latter as retryable.
    pub async fn apply(&self, plan: &CommitPlan) -> Result<CommitOutcome, Error> {
        if plan.is_empty() {
            return Ok(CommitOutcome::NoOp);
        }

        let mut all_match = true;
        for file in &plan.files {
            let current = self
                .api
                .get_file_content(&self.repo, &file.path, &self.branch)
                .await?;
            let matches = match current {
                Some(existing) => normalize_content(&existing) == normalize_content(&file.content),
                None => false,
            };
            if !matches {
                all_match = false;
                break;
            }
        }
        if all_match {
            debug!(branch = %self.branch, files = plan.files.len(), "Commit plan is a no-op");
            return Ok(CommitOutcome::NoOp);
        }

        let tip_sha = self.api.get_ref_sha(&self.repo, &self.branch).await?;
        let tip_tree = self.api.get_commit_tree(&self.repo, &tip_sha).await?;

        let entries: Vec<TreeEntry> = plan
            .files
            .iter()
            .map(|f| TreeEntry::blob(&f.path, normalize_content(&f.content)))
            .collect();

        let new_tree = self.api.create_tree(&self.repo, &tip_tree, &entries).await?;
        let new_commit = self
            .api
            .create_commit(&self.repo, &plan.message, &new_tree, &tip_sha)
            .await?;

        // Rejected (not silently overwritten) if the branch moved since
        // tip_sha was read.
        self.api
            .update_ref(&self.repo, &self.branch, &new_commit)
            .await?;

        info!(
            branch = %self.branch,
            commit = %new_commit,
            files = plan.files.len(),
            "Committed generated files"
        );
        Ok(CommitOutcome::Committed(new_commit))
    }
}
