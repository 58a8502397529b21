//! Job orchestration: payloads, the inline review poster and the
//! end-to-end review job runner.

pub mod job;
pub mod poster;

pub use job::{DocSource, JobConfig, JobPayload, ReviewJob};
pub use poster::{InlineReviewPoster, PostOutcome, PosterConfig};
