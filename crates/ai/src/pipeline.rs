//! The review generation pipeline and its resilience policy.
//!
//! Layered fallbacks, in order: prompt-size fallback (full then
//! compact), one repair request for malformed output, cross-model
//! fallback after transport-only failures, and a narrowly-scoped
//! follow-up when answer code is missing. A rate limit aborts
//! everything immediately: it is account-global, so neither a smaller
//! prompt nor another attempt would help. Every unrecoverable path
//! yields `None`; "AI review unavailable" is not a job failure.

use tracing::{info, warn};

use solvebot_core::{ReviewResult, ANSWER_UNAVAILABLE};

use crate::decode::{decode_answer_code, decode_review};
use crate::prompt::{
    build_answer_code_prompt, build_prompt_variants, build_repair_prompt, ReviewRequest,
};
use crate::provider::{CompletionBackend, CompletionOutcome};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub primary_model: String,
    pub fallback_model: Option<String>,
    /// Upper bound on completion attempts per model phase.
    pub max_attempts: usize,
    /// Per-field character budget of the compact prompt variant.
    pub compact_budget: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary_model: "gpt-4o".into(),
            fallback_model: Some("gpt-4o-mini".into()),
            max_attempts: 2,
            compact_budget: 6_000,
        }
    }
}

/// Outcome of one model phase (all prompt variants against one model).
enum PhaseOutcome {
    Done(ReviewResult),
    /// Rate limited: abort generation entirely.
    RateLimited,
    /// Output obtained but not decodable, even after repair.
    Undecodable,
    /// Only transport failures; another model may still succeed.
    Transport,
}

/// Drives completion calls and returns a validated review, or `None`
/// when no review could be obtained.
pub struct ReviewPipeline<B> {
    backend: B,
    config: PipelineConfig,
}

impl<B: CompletionBackend> ReviewPipeline<B> {
    pub fn new(backend: B, config: PipelineConfig) -> Self {
        Self { backend, config }
    }

    pub async fn generate(&self, request: &ReviewRequest) -> Option<ReviewResult> {
        let prompts = build_prompt_variants(request, self.config.compact_budget);

        let primary = self.config.primary_model.clone();
        match self.run_phase(&primary, &prompts).await {
            PhaseOutcome::Done(result) => Some(self.ensure_answer_code(&primary, request, result).await),
            PhaseOutcome::RateLimited => {
                warn!(model = %primary, "Rate limited, aborting review generation");
                None
            }
            PhaseOutcome::Undecodable => None,
            PhaseOutcome::Transport => {
                let fallback = self
                    .config
                    .fallback_model
                    .as_ref()
                    .filter(|m| **m != primary)?
                    .clone();
                info!(model = %fallback, "Primary transport failure, trying fallback model");
                match self.run_phase(&fallback, &prompts).await {
                    PhaseOutcome::Done(result) => {
                        Some(self.ensure_answer_code(&fallback, request, result).await)
                    }
                    _ => None,
                }
            }
        }
    }

    /// Try each prompt variant against one model.
    async fn run_phase(&self, model: &str, prompts: &[String]) -> PhaseOutcome {
        for prompt in prompts.iter().take(self.config.max_attempts.max(1)) {
            match self.backend.complete(model, prompt).await {
                CompletionOutcome::Ok(raw) => return self.decode_with_repair(model, &raw).await,
                CompletionOutcome::RateLimited => return PhaseOutcome::RateLimited,
                CompletionOutcome::Failed(reason) => {
                    warn!(model, reason = %reason, "Completion failed, trying next variant");
                }
            }
        }
        PhaseOutcome::Transport
    }

    /// Decode raw output, issuing at most one repair request.
    async fn decode_with_repair(&self, model: &str, raw: &str) -> PhaseOutcome {
        match decode_review(raw) {
            Ok(result) => PhaseOutcome::Done(result),
            Err(first_err) => {
                warn!(model, error = %first_err, "Malformed review output, requesting repair");
                let repair_prompt = build_repair_prompt(raw);
                match self.backend.complete(model, &repair_prompt).await {
                    CompletionOutcome::Ok(repaired) => match decode_review(&repaired) {
                        Ok(result) => PhaseOutcome::Done(result),
                        Err(e) => {
                            warn!(model, error = %e, "Repair output still malformed");
                            PhaseOutcome::Undecodable
                        }
                    },
                    CompletionOutcome::RateLimited => PhaseOutcome::RateLimited,
                    CompletionOutcome::Failed(_) => PhaseOutcome::Undecodable,
                }
            }
        }
    }

    /// One follow-up request when the answer code came back as the
    /// unavailable sentinel; splice the recovered code in on success.
    async fn ensure_answer_code(
        &self,
        model: &str,
        request: &ReviewRequest,
        mut result: ReviewResult,
    ) -> ReviewResult {
        if result.has_answer_code() {
            return result;
        }

        info!(model, "Answer code unavailable, requesting it separately");
        let prompt = build_answer_code_prompt(request);
        if let CompletionOutcome::Ok(raw) = self.backend.complete(model, &prompt).await {
            if let Some(code) = decode_answer_code(&raw) {
                if !code.is_empty() && code != ANSWER_UNAVAILABLE {
                    result.answer_code = code;
                }
            }
        }
        result
    }
}
