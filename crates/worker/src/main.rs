//! Worker binary: consumes review jobs from Redis and executes them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use solvebot_ai::{ChatClient, PipelineConfig, ReviewPipeline};
use solvebot_core::ResolverConfig;
use solvebot_github::{
    CommentLedger, GithubApi, GithubClient, InstallationTokenCache, StaticTokenSource,
};
use solvebot_review::{JobConfig, PosterConfig, ReviewJob};

mod docs;
mod queue;

use docs::TemplateDocs;
use queue::Queue;

#[derive(Parser)]
#[command(name = "solvebot-worker")]
#[command(about = "Review worker: doc sync and AI review placement")]
struct Config {
    /// Redis URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN")]
    github_token: String,

    /// Bot account login, used to recognize our own comments
    #[arg(long, env = "BOT_LOGIN", default_value = "solvebot[bot]")]
    bot_login: String,

    /// OpenAI-compatible chat completions base URL
    #[arg(long, env = "AI_BASE_URL", default_value = "https://api.openai.com/v1")]
    ai_base_url: String,

    /// AI provider API key
    #[arg(long, env = "AI_API_KEY")]
    ai_api_key: String,

    /// Primary review model
    #[arg(long, env = "AI_MODEL", default_value = "gpt-4o")]
    model: String,

    /// Fallback model after transport failures
    #[arg(long, env = "AI_FALLBACK_MODEL")]
    fallback_model: Option<String>,

    /// Completion request timeout in seconds
    #[arg(long, env = "AI_TIMEOUT_SECS", default_value_t = 120)]
    ai_timeout_secs: u64,

    /// Maximum distance when snapping a suggestion to a diff line
    #[arg(long, env = "MAX_LINE_DISTANCE", default_value_t = 20)]
    max_line_distance: u32,

    /// Maximum inline comments per review
    #[arg(long, env = "MAX_INLINE_COMMENTS", default_value_t = 8)]
    max_inline_comments: usize,

    /// Maximum suggestions listed per file in the grouped fallback
    #[arg(long, env = "MAX_PER_FILE", default_value_t = 5)]
    max_per_file: usize,

    /// Queue pop timeout in seconds
    #[arg(long, env = "POP_TIMEOUT_SECS", default_value_t = 30)]
    pop_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::parse();

    info!("Solvebot worker starting");

    let queue = Queue::new(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    info!(redis = %config.redis_url, "Connected to Redis");

    // Single-installation deployment; a GitHub App setup swaps the
    // source and keys by installation id.
    let tokens = InstallationTokenCache::new(Arc::new(StaticTokenSource::new(
        &config.github_token,
    )));
    let token = tokens
        .get(0)
        .await
        .context("Failed to obtain GitHub token")?;

    let api: Arc<dyn GithubApi> = Arc::new(GithubClient::new(token));
    let ledger = CommentLedger::new(api.clone(), &config.bot_login);

    let backend = ChatClient::new(
        &config.ai_base_url,
        &config.ai_api_key,
        Duration::from_secs(config.ai_timeout_secs),
    );
    let pipeline = ReviewPipeline::new(
        backend,
        PipelineConfig {
            primary_model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
            ..PipelineConfig::default()
        },
    );

    let job = ReviewJob::new(
        api,
        ledger,
        pipeline,
        Arc::new(TemplateDocs::new()),
        JobConfig {
            poster: PosterConfig {
                resolver: ResolverConfig {
                    max_line_distance: config.max_line_distance,
                },
                max_inline_comments: config.max_inline_comments,
                max_per_file: config.max_per_file,
            },
            ..JobConfig::default()
        },
    );

    loop {
        match queue.pop(config.pop_timeout_secs).await {
            Ok(Some(item)) => {
                info!(id = %item.id, job = %item.payload.description(), "Processing queue item");

                if let Err(e) = queue.mark_processing(&item).await {
                    error!(error = %e, "Failed to mark item as processing");
                    continue;
                }

                match job.run(&item.payload).await {
                    Ok(()) => {
                        if let Err(e) = queue.mark_completed(&item.id).await {
                            error!(error = %e, "Failed to mark item as completed");
                        }
                    }
                    Err(e) => {
                        error!(id = %item.id, error = %e, "Job failed");
                        if let Err(e) = queue.mark_failed(item, &e.to_string()).await {
                            error!(error = %e, "Failed to record job failure");
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Queue pop failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}
