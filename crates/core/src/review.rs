//! Review value objects and comment markers.

use serde::{Deserialize, Serialize};

/// An AI-proposed inline suggestion, as returned by the provider.
///
/// The line number is the author's best guess and may reference
/// pre-truncation content; it is resolved against the diff index before
/// posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub path: String,
    pub line: u32,
    pub body: String,
}

/// A suggestion mapped onto an addressable diff coordinate.
///
/// `path` is canonicalized to an actual changed file and `line` is
/// guaranteed to be a member of that file's right-side line set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedComment {
    pub path: String,
    pub line: u32,
    pub body: String,
}

/// Structured review produced by the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub summary_markdown: String,
    pub time_complexity: String,
    pub space_complexity: String,
    pub answer_code: String,
    #[serde(default)]
    pub inline_suggestions: Vec<Suggestion>,
}

/// Sentinel used when the provider could not produce answer code.
pub const ANSWER_UNAVAILABLE: &str = "(unavailable)";

impl ReviewResult {
    pub fn has_answer_code(&self) -> bool {
        !self.answer_code.is_empty() && self.answer_code != ANSWER_UNAVAILABLE
    }
}

/// Identity tag for bot-managed comments.
///
/// Embedded as the first line of a managed comment body and used as the
/// sole identity key for idempotent upsert; matching is always marker
/// presence plus bot authorship, never free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Notice posted when the PR body lacks required template fields.
    TemplateCheck,
    /// Summary comment carrying the AI review.
    AiReview,
    /// Review with inline line comments.
    InlineReview,
    /// Grouped per-file fallback comment.
    FileReview,
}

impl Marker {
    /// The literal HTML-comment token embedded in comment bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            Marker::TemplateCheck => "<!-- solvebot:template-check -->",
            Marker::AiReview => "<!-- solvebot:ai-review -->",
            Marker::InlineReview => "<!-- solvebot:inline-review -->",
            Marker::FileReview => "<!-- solvebot:file-review -->",
        }
    }

    /// Prefix a body with this marker as its first line.
    pub fn wrap(&self, body: &str) -> String {
        format!("{}\n{}", self.tag(), body)
    }

    /// Check whether a comment body is managed under this marker.
    pub fn matches(&self, body: &str) -> bool {
        body.starts_with(self.tag())
    }
}
