//! Marker-based idempotent comment and review management.
//!
//! Every bot-managed comment carries a marker token as its first body
//! line. The marker plus bot authorship is the identity key: at most
//! one comment per (issue, marker) and at most one review per
//! (pull request, head sha, marker) exist at any time, however often a
//! job is redelivered.

use std::sync::Arc;

use tracing::{debug, info};

use solvebot_core::{Error, Marker, ResolvedComment};

use crate::client::{DraftReviewComment, GithubApi, PullRef};

/// Idempotent create/update/delete of bot comments and reviews.
pub struct CommentLedger {
    api: Arc<dyn GithubApi>,
    bot_login: String,
}

impl CommentLedger {
    pub fn new(api: Arc<dyn GithubApi>, bot_login: impl Into<String>) -> Self {
        Self {
            api,
            bot_login: bot_login.into(),
        }
    }

    /// Create or update the single bot comment under `marker`.
    ///
    /// After the call exactly one such comment exists and its body is
    /// the marker-tagged `body`.
    pub async fn upsert_issue_comment(
        &self,
        pull: &PullRef,
        marker: Marker,
        body: &str,
    ) -> Result<(), Error> {
        let tagged = marker.wrap(body);
        let existing = self.find_comment(pull, marker).await?;

        match existing {
            Some(id) => {
                debug!(comment_id = id, ?marker, "Updating existing bot comment");
                self.api.update_issue_comment(&pull.repo, id, &tagged).await
            }
            None => {
                info!(pull = pull.number, ?marker, "Creating bot comment");
                self.api.create_issue_comment(pull, &tagged).await.map(|_| ())
            }
        }
    }

    /// Delete the bot comment under `marker` if one exists; no-op
    /// otherwise.
    pub async fn delete_if_present(&self, pull: &PullRef, marker: Marker) -> Result<(), Error> {
        if let Some(id) = self.find_comment(pull, marker).await? {
            info!(comment_id = id, ?marker, "Deleting stale bot comment");
            self.api.delete_issue_comment(&pull.repo, id).await?;
        }
        Ok(())
    }

    /// Whether a bot review under `marker` already exists for this head
    /// commit. A new push gets a fresh head sha and becomes reviewable
    /// again even though the marker repeats.
    pub async fn has_posted_review(
        &self,
        pull: &PullRef,
        marker: Marker,
        head_sha: &str,
    ) -> Result<bool, Error> {
        let reviews = self.api.list_reviews(pull).await?;
        Ok(reviews.iter().any(|r| {
            r.author == self.bot_login && r.body.contains(marker.tag()) && r.commit_id == head_sha
        }))
    }

    /// Create one review at `head_sha` with the marker-tagged summary
    /// and at most `max_comments` inline comments. Callers must check
    /// [`Self::has_posted_review`] first.
    pub async fn post_review(
        &self,
        pull: &PullRef,
        marker: Marker,
        head_sha: &str,
        summary: &str,
        comments: &[ResolvedComment],
        max_comments: usize,
    ) -> Result<(), Error> {
        let drafts: Vec<DraftReviewComment> = comments
            .iter()
            .take(max_comments)
            .map(|c| DraftReviewComment::right(&c.path, c.line, &c.body))
            .collect();

        info!(
            pull = pull.number,
            head_sha,
            comments = drafts.len(),
            "Posting review"
        );
        self.api
            .create_review(pull, head_sha, &marker.wrap(summary), &drafts)
            .await
    }

    async fn find_comment(&self, pull: &PullRef, marker: Marker) -> Result<Option<u64>, Error> {
        let comments = self.api.list_issue_comments(pull).await?;
        Ok(comments
            .iter()
            .find(|c| c.author == self.bot_login && marker.matches(&c.body))
            .map(|c| c.id))
    }
}
