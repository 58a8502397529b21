//! GitHub REST surface for solvebot: the `GithubApi` seam, the
//! marker-based comment ledger, the atomic branch committer and the
//! installation token cache.

pub mod client;
pub mod comments;
pub mod commit;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{
    DraftReviewComment, GithubApi, GithubClient, IssueComment, PullFile, PullInfo, PullRef,
    RepoRef, ReviewInfo, TreeEntry,
};
pub use comments::CommentLedger;
pub use commit::{BranchCommitter, CommitOutcome, CommitPlan, PlannedFile};
pub use tokens::{InstallationToken, InstallationTokenCache, StaticTokenSource, TokenSource};
