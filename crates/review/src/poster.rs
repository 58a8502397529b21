//! Placement of AI suggestions as an idempotent inline review.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use solvebot_core::{resolve_suggestion, ChangedFile, Marker, ResolverConfig, Suggestion};
use solvebot_github::{CommentLedger, PullRef};

/// Poster tuning. The caps are a tuning choice, not structural.
#[derive(Debug, Clone)]
pub struct PosterConfig {
    pub resolver: ResolverConfig,
    /// Maximum inline comments per review.
    pub max_inline_comments: usize,
    /// Maximum suggestions listed per file in the grouped fallback.
    pub max_per_file: usize,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            max_inline_comments: 8,
            max_per_file: 5,
        }
    }
}

/// What the poster ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// Review created at the head sha.
    Posted,
    /// A review for this head sha already exists; nothing done.
    AlreadyPosted,
    /// No suggestion resolved; grouped per-file comment posted instead.
    FellBack,
}

/// Composes the line resolver and the comment ledger into one
/// idempotent review per head commit.
pub struct InlineReviewPoster {
    config: PosterConfig,
}

impl InlineReviewPoster {
    pub fn new(config: PosterConfig) -> Self {
        Self { config }
    }

    pub async fn post(
        &self,
        ledger: &CommentLedger,
        pull: &PullRef,
        head_sha: &str,
        summary: &str,
        suggestions: &[Suggestion],
        files: &[ChangedFile],
    ) -> Result<PostOutcome, solvebot_core::Error> {
        let mut seen: HashSet<(String, u32)> = HashSet::new();
        let mut resolved = Vec::new();
        for suggestion in suggestions {
            let Some(comment) = resolve_suggestion(suggestion, files, &self.config.resolver)
            else {
                // Per-suggestion failures never fail the review.
                debug!(path = %suggestion.path, line = suggestion.line, "Dropped unresolvable suggestion");
                continue;
            };
            if seen.insert((comment.path.clone(), comment.line)) {
                resolved.push(comment);
            }
            if resolved.len() >= self.config.max_inline_comments {
                break;
            }
        }

        if resolved.is_empty() && !suggestions.is_empty() {
            info!(
                pull = pull.number,
                raw = suggestions.len(),
                "No suggestion resolved, falling back to grouped file comment"
            );
            let body = self.grouped_body(suggestions);
            ledger
                .upsert_issue_comment(pull, Marker::FileReview, &body)
                .await?;
            return Ok(PostOutcome::FellBack);
        }

        if ledger
            .has_posted_review(pull, Marker::InlineReview, head_sha)
            .await?
        {
            debug!(pull = pull.number, head_sha, "Review already posted for this head");
            return Ok(PostOutcome::AlreadyPosted);
        }

        ledger
            .post_review(
                pull,
                Marker::InlineReview,
                head_sha,
                summary,
                &resolved,
                self.config.max_inline_comments,
            )
            .await?;
        Ok(PostOutcome::Posted)
    }

    /// Group raw suggestions by path, each annotated with its original
    /// unresolved line.
    fn grouped_body(&self, suggestions: &[Suggestion]) -> String {
        let mut by_file: BTreeMap<&str, Vec<&Suggestion>> = BTreeMap::new();
        for suggestion in suggestions {
            by_file.entry(&suggestion.path).or_default().push(suggestion);
        }

        let mut body = String::from(
            "The following suggestions could not be placed on the diff:\n",
        );
        for (path, entries) in by_file {
            body.push_str(&format!("\n**`{path}`**\n"));
            for suggestion in entries.iter().take(self.config.max_per_file) {
                body.push_str(&format!("- line {}: {}\n", suggestion.line, suggestion.body));
            }
        }
        body
    }
}
