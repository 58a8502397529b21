//! AI review generation: completion provider seam, prompt building,
//! schema-validated decoding and the resilience pipeline.

pub mod decode;
pub mod pipeline;
pub mod prompt;
pub mod provider;

pub use decode::decode_review;
pub use pipeline::{PipelineConfig, ReviewPipeline};
pub use prompt::ReviewRequest;
pub use provider::{ChatClient, CompletionBackend, CompletionOutcome};
