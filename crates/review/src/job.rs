//! End-to-end review jobs.
//!
//! A job describes one push or one pull-request event. Execution is a
//! single sequential async task: load changed files, sync generated
//! docs, generate the AI review, place it. Every step is idempotent
//! under queue redelivery.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use solvebot_ai::{CompletionBackend, ReviewPipeline, ReviewRequest};
use solvebot_core::{ChangedFile, Error, Marker, ReviewResult};
use solvebot_github::{
    BranchCommitter, CommentLedger, CommitOutcome, CommitPlan, GithubApi, PullInfo, PullRef,
    RepoRef,
};

use crate::poster::{InlineReviewPoster, PosterConfig};

/// Job input, as delivered by the queue relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobPayload {
    #[serde(rename = "push")]
    Push {
        owner: String,
        repo: String,
        branch: String,
    },
    #[serde(rename = "pull_request")]
    PullRequest {
        owner: String,
        repo: String,
        #[serde(rename = "pullNumber")]
        pull_number: u64,
        action: String,
    },
}

impl JobPayload {
    /// Short description for logging.
    pub fn description(&self) -> String {
        match self {
            JobPayload::Push { owner, repo, branch } => {
                format!("push {owner}/{repo}@{branch}")
            }
            JobPayload::PullRequest {
                owner,
                repo,
                pull_number,
                ..
            } => format!("pull_request {owner}/{repo}#{pull_number}"),
        }
    }
}

/// Produces the generated-documentation commit plan.
///
/// The actual generator (PR-body field extraction, problem-page
/// scraping, Markdown templating) lives outside this crate; jobs only
/// need its output.
#[async_trait]
pub trait DocSource: Send + Sync {
    /// Plan for a pull request. `Ok(None)` means the PR body lacks the
    /// required template fields.
    async fn plan_for_pull(
        &self,
        repo: &RepoRef,
        pull: &PullInfo,
    ) -> Result<Option<CommitPlan>, Error>;

    /// Plan for a direct branch push.
    async fn plan_for_branch(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<Option<CommitPlan>, Error>;
}

/// Job runner tuning.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub poster: PosterConfig,
    /// Bounded retries when the branch ref moves mid-commit.
    pub commit_retries: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poster: PosterConfig::default(),
            commit_retries: 3,
        }
    }
}

const TEMPLATE_NOTICE: &str = "This pull request is missing required template fields, so the \
problem document could not be generated. Please fill in the PR template and push again.";

const REVIEW_UNAVAILABLE_NOTICE: &str =
    "The AI review could not be generated for this push. It will be retried on the next update.";

/// Executes [`JobPayload`]s against GitHub and the AI provider.
pub struct ReviewJob<B> {
    api: Arc<dyn GithubApi>,
    ledger: CommentLedger,
    pipeline: ReviewPipeline<B>,
    docs: Arc<dyn DocSource>,
    config: JobConfig,
}

impl<B: CompletionBackend> ReviewJob<B> {
    pub fn new(
        api: Arc<dyn GithubApi>,
        ledger: CommentLedger,
        pipeline: ReviewPipeline<B>,
        docs: Arc<dyn DocSource>,
        config: JobConfig,
    ) -> Self {
        Self {
            api,
            ledger,
            pipeline,
            docs,
            config,
        }
    }

    pub async fn run(&self, payload: &JobPayload) -> Result<(), Error> {
        info!(job = %payload.description(), "Running job");
        match payload {
            JobPayload::Push { owner, repo, branch } => {
                self.run_push(&RepoRef::new(owner, repo), branch).await
            }
            JobPayload::PullRequest {
                owner,
                repo,
                pull_number,
                ..
            } => {
                self.run_pull_request(&PullRef {
                    repo: RepoRef::new(owner, repo),
                    number: *pull_number,
                })
                .await
            }
        }
    }

    async fn run_push(&self, repo: &RepoRef, branch: &str) -> Result<(), Error> {
        match self.docs.plan_for_branch(repo, branch).await? {
            Some(plan) => {
                self.commit_with_retry(repo, branch, &plan).await?;
                Ok(())
            }
            None => {
                info!(%repo, branch, "No documentation to sync for push");
                Ok(())
            }
        }
    }

    async fn run_pull_request(&self, pull: &PullRef) -> Result<(), Error> {
        let info = self.api.get_pull(pull).await?;
        let head_sha = info.head_sha.clone();

        // Template gate: notice while fields are missing, retracted once
        // they are satisfied.
        match self.docs.plan_for_pull(&pull.repo, &info).await? {
            None => {
                self.ledger
                    .upsert_issue_comment(pull, Marker::TemplateCheck, TEMPLATE_NOTICE)
                    .await?;
            }
            Some(plan) => {
                self.ledger
                    .delete_if_present(pull, Marker::TemplateCheck)
                    .await?;
                if !plan.is_empty() {
                    self.commit_with_retry(&pull.repo, &info.head_ref, &plan).await?;
                }
            }
        }

        let files = self.load_changed_files(pull, &head_sha).await?;
        let request = build_request(&info, &files);

        match self.pipeline.generate(&request).await {
            Some(result) => {
                self.ledger
                    .upsert_issue_comment(pull, Marker::AiReview, &summary_body(&result))
                    .await?;
                let poster = InlineReviewPoster::new(self.config.poster.clone());
                poster
                    .post(
                        &self.ledger,
                        pull,
                        &head_sha,
                        &result.summary_markdown,
                        &result.inline_suggestions,
                        &files,
                    )
                    .await?;
            }
            None => {
                // Surface the condition in place of the review; never a
                // silent drop.
                warn!(pull = pull.number, "AI review unavailable");
                self.ledger
                    .upsert_issue_comment(pull, Marker::AiReview, REVIEW_UNAVAILABLE_NOTICE)
                    .await?;
            }
        }

        Ok(())
    }

    async fn load_changed_files(
        &self,
        pull: &PullRef,
        head_sha: &str,
    ) -> Result<Vec<ChangedFile>, Error> {
        let listed = self.api.list_pull_files(pull).await?;
        let mut files = Vec::with_capacity(listed.len());
        for file in listed {
            let content = self
                .api
                .get_file_content(&pull.repo, &file.filename, head_sha)
                .await?;
            files.push(ChangedFile::new(file.filename, file.patch, content));
        }
        Ok(files)
    }

    async fn commit_with_retry(
        &self,
        repo: &RepoRef,
        branch: &str,
        plan: &CommitPlan,
    ) -> Result<CommitOutcome, Error> {
        let committer = BranchCommitter::new(self.api.clone(), repo.clone(), branch);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match committer.apply(plan).await {
                Err(Error::ConcurrentModification) if attempt <= self.config.commit_retries => {
                    warn!(%repo, branch, attempt, "Branch moved during commit, retrying");
                }
                other => return other,
            }
        }
    }
}

fn build_request(info: &PullInfo, files: &[ChangedFile]) -> ReviewRequest {
    let mut diff = String::new();
    for file in files {
        if let Some(patch) = &file.patch {
            diff.push_str(&format!("### {}\n{}\n", file.path, patch));
        }
    }

    ReviewRequest {
        title: info.title.clone(),
        description: info.body.clone().unwrap_or_default(),
        diff,
        files: files
            .iter()
            .filter_map(|f| Some((f.path.clone(), f.content.clone()?)))
            .collect(),
    }
}

/// Render the summary comment body.
fn summary_body(result: &ReviewResult) -> String {
    let mut body = String::new();
    body.push_str(&result.summary_markdown);
    body.push_str("\n\n| | |\n|---|---|\n");
    body.push_str(&format!("| Time complexity | {} |\n", result.time_complexity));
    body.push_str(&format!("| Space complexity | {} |\n", result.space_complexity));

    if result.has_answer_code() {
        body.push_str("\n<details>\n<summary>Reference solution</summary>\n\n```\n");
        body.push_str(&result.answer_code);
        body.push_str("\n```\n\n</details>\n");
    }
    body
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use solvebot_ai::{CompletionOutcome, PipelineConfig};
    use solvebot_github::{
        DraftReviewComment, IssueComment, PullFile, ReviewInfo, TreeEntry,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    const BOT: &str = "solvebot[bot]";

    /// Minimal in-memory GitHub double shared by the job and poster
    /// tests.
    pub(crate) struct InMemoryGithub {
        state: Mutex<GithubState>,
    }

    #[derive(Default)]
    struct GithubState {
        pull: Option<PullInfo>,
        pull_files: Vec<PullFile>,
        files: HashMap<String, String>,
        comments: Vec<IssueComment>,
        reviews: Vec<ReviewInfo>,
        review_comments: Vec<DraftReviewComment>,
        head_sha: String,
        next_id: u64,
        commits: u64,
    }

    impl InMemoryGithub {
        pub(crate) fn new() -> Self {
            Self {
                state: Mutex::new(GithubState {
                    head_sha: "head0".into(),
                    next_id: 1,
                    ..GithubState::default()
                }),
            }
        }

        pub(crate) fn seed_pull(&self, info: PullInfo, files: Vec<PullFile>) {
            let mut state = self.state.lock().unwrap();
            state.head_sha = info.head_sha.clone();
            state.pull = Some(info);
            state.pull_files = files;
        }

        pub(crate) fn seed_file(&self, path: &str, content: &str) {
            self.state
                .lock()
                .unwrap()
                .files
                .insert(path.into(), content.into());
        }

        pub(crate) fn comments(&self) -> Vec<IssueComment> {
            self.state.lock().unwrap().comments.clone()
        }

        pub(crate) fn reviews(&self) -> Vec<ReviewInfo> {
            self.state.lock().unwrap().reviews.clone()
        }

        pub(crate) fn review_comments(&self) -> Vec<DraftReviewComment> {
            self.state.lock().unwrap().review_comments.clone()
        }

        pub(crate) fn file(&self, path: &str) -> Option<String> {
            self.state.lock().unwrap().files.get(path).cloned()
        }

        pub(crate) fn commit_count(&self) -> u64 {
            self.state.lock().unwrap().commits
        }
    }

    #[async_trait]
    impl GithubApi for InMemoryGithub {
        async fn get_pull(&self, pull: &PullRef) -> Result<PullInfo, Error> {
            let state = self.state.lock().unwrap();
            state.pull.clone().ok_or(Error::Api {
                status: 404,
                message: format!("pull {} not seeded", pull.number),
            })
        }

        async fn list_pull_files(&self, _pull: &PullRef) -> Result<Vec<PullFile>, Error> {
            Ok(self.state.lock().unwrap().pull_files.clone())
        }

        async fn get_file_content(
            &self,
            _repo: &RepoRef,
            path: &str,
            _git_ref: &str,
        ) -> Result<Option<String>, Error> {
            Ok(self.file(path))
        }

        async fn list_issue_comments(&self, _pull: &PullRef) -> Result<Vec<IssueComment>, Error> {
            Ok(self.comments())
        }

        async fn create_issue_comment(&self, _pull: &PullRef, body: &str) -> Result<u64, Error> {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            state.comments.push(IssueComment {
                id,
                body: body.into(),
                author: BOT.into(),
            });
            Ok(id)
        }

        async fn update_issue_comment(
            &self,
            _repo: &RepoRef,
            comment_id: u64,
            body: &str,
        ) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            if let Some(c) = state.comments.iter_mut().find(|c| c.id == comment_id) {
                c.body = body.into();
            }
            Ok(())
        }

        async fn delete_issue_comment(
            &self,
            _repo: &RepoRef,
            comment_id: u64,
        ) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            state.comments.retain(|c| c.id != comment_id);
            Ok(())
        }

        async fn list_reviews(&self, _pull: &PullRef) -> Result<Vec<ReviewInfo>, Error> {
            Ok(self.reviews())
        }

        async fn create_review(
            &self,
            _pull: &PullRef,
            commit_id: &str,
            body: &str,
            comments: &[DraftReviewComment],
        ) -> Result<(), Error> {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            state.reviews.push(ReviewInfo {
                id,
                body: body.into(),
                commit_id: commit_id.into(),
                author: BOT.into(),
            });
            state.review_comments.extend_from_slice(comments);
            Ok(())
        }

        async fn get_ref_sha(&self, _repo: &RepoRef, _branch: &str) -> Result<String, Error> {
            Ok(self.state.lock().unwrap().head_sha.clone())
        }

        async fn get_commit_tree(
            &self,
            _repo: &RepoRef,
            commit_sha: &str,
        ) -> Result<String, Error> {
            Ok(format!("tree-of-{commit_sha}"))
        }

        async fn create_tree(
            &self,
            _repo: &RepoRef,
            _base_tree: &str,
            entries: &[TreeEntry],
        ) -> Result<String, Error> {
            let mut state = self.state.lock().unwrap();
            for entry in entries {
                state.files.insert(entry.path.clone(), entry.content.clone());
            }
            Ok("tree-new".into())
        }

        async fn create_commit(
            &self,
            _repo: &RepoRef,
            _message: &str,
            _tree_sha: &str,
            _parent_sha: &str,
        ) -> Result<String, Error> {
            let mut state = self.state.lock().unwrap();
            state.commits += 1;
            Ok(format!("commit-{}", state.commits))
        }

        async fn update_ref(&self, _repo: &RepoRef, _branch: &str, sha: &str) -> Result<(), Error> {
            self.state.lock().unwrap().head_sha = sha.into();
            Ok(())
        }
    }

    struct StaticDocs {
        plan: Option<CommitPlan>,
    }

    #[async_trait]
    impl DocSource for StaticDocs {
        async fn plan_for_pull(
            &self,
            _repo: &RepoRef,
            _pull: &PullInfo,
        ) -> Result<Option<CommitPlan>, Error> {
            Ok(self.plan.clone())
        }

        async fn plan_for_branch(
            &self,
            _repo: &RepoRef,
            _branch: &str,
        ) -> Result<Option<CommitPlan>, Error> {
            Ok(self.plan.clone())
        }
    }

    struct ScriptedBackend {
        script: Mutex<Vec<CompletionOutcome>>,
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _model: &str, _prompt: &str) -> CompletionOutcome {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                CompletionOutcome::Failed("script exhausted".into())
            } else {
                script.remove(0)
            }
        }
    }

    fn valid_raw(suggestion_line: u32) -> String {
        format!(
            r#"{{
                "summary_markdown": "Nice solution.",
                "time_complexity": "O(n)",
                "space_complexity": "O(1)",
                "answer_code": "fn main() {{}}",
                "inline_suggestions": [
                    {{ "path": "Main.java", "line": {suggestion_line}, "body": "check overflow" }}
                ]
            }}"#
        )
    }

    fn make_job(
        api: Arc<InMemoryGithub>,
        script: Vec<CompletionOutcome>,
        plan: Option<CommitPlan>,
    ) -> ReviewJob<ScriptedBackend> {
        let ledger = CommentLedger::new(api.clone(), BOT);
        let pipeline = ReviewPipeline::new(
            ScriptedBackend {
                script: Mutex::new(script),
            },
            PipelineConfig {
                primary_model: "primary".into(),
                fallback_model: None,
                max_attempts: 2,
                compact_budget: 10_000,
            },
        );
        ReviewJob::new(
            api,
            ledger,
            pipeline,
            Arc::new(StaticDocs { plan }),
            JobConfig::default(),
        )
    }

    fn seeded_api() -> Arc<InMemoryGithub> {
        let api = Arc::new(InMemoryGithub::new());
        api.seed_pull(
            PullInfo {
                number: 5,
                title: "solve: boj 1000".into(),
                body: Some("## Problem\n1000".into()),
                head_sha: "head0".into(),
                head_ref: "solve/1000".into(),
            },
            vec![PullFile {
                filename: "Main.java".into(),
                patch: Some("@@ -1,3 +1,4 @@\n line1\n+line2\n line3\n line4".into()),
            }],
        );
        api.seed_file("Main.java", "class Main {}\n");
        api
    }

    fn payload() -> JobPayload {
        JobPayload::PullRequest {
            owner: "octo".into(),
            repo: "solutions".into(),
            pull_number: 5,
            action: "opened".into(),
        }
    }

    #[test]
    fn test_payload_serialization() {
        let json = serde_json::to_string(&payload()).unwrap();
        assert!(json.contains(r#""type":"pull_request""#));
        assert!(json.contains(r#""pullNumber":5"#));

        let push: JobPayload = serde_json::from_str(
            r#"{ "type": "push", "owner": "octo", "repo": "solutions", "branch": "main" }"#,
        )
        .unwrap();
        assert!(matches!(push, JobPayload::Push { .. }));
        assert_eq!(push.description(), "push octo/solutions@main");
    }

    #[tokio::test]
    async fn test_full_pull_request_job() {
        let api = seeded_api();
        let plan = CommitPlan::new("docs: problem 1000").with_file("docs/1000.md", "# 1000");
        let job = make_job(
            api.clone(),
            vec![CompletionOutcome::Ok(valid_raw(2))],
            Some(plan),
        );

        job.run(&payload()).await.unwrap();

        // Docs committed.
        assert_eq!(api.file("docs/1000.md").unwrap(), "# 1000\n");
        // Summary comment under the ai-review marker.
        let comments = api.comments();
        assert!(comments
            .iter()
            .any(|c| Marker::AiReview.matches(&c.body) && c.body.contains("O(n)")));
        // Inline review placed at the suggested line.
        assert_eq!(api.reviews().len(), 1);
        assert_eq!(api.review_comments().len(), 1);
        assert_eq!(api.review_comments()[0].line, 2);
    }

    #[tokio::test]
    async fn test_redelivered_job_is_idempotent() {
        let api = seeded_api();
        let plan = CommitPlan::new("docs").with_file("docs/1000.md", "# 1000");
        let job = make_job(
            api.clone(),
            vec![
                CompletionOutcome::Ok(valid_raw(2)),
                CompletionOutcome::Ok(valid_raw(2)),
            ],
            Some(plan),
        );

        job.run(&payload()).await.unwrap();
        let commits_after_first = api.commit_count();
        job.run(&payload()).await.unwrap();

        // One docs commit, one review, one summary comment.
        assert_eq!(api.commit_count(), commits_after_first);
        assert_eq!(api.reviews().len(), 1);
        let summaries: Vec<_> = api
            .comments()
            .into_iter()
            .filter(|c| Marker::AiReview.matches(&c.body))
            .collect();
        assert_eq!(summaries.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_template_posts_notice() {
        let api = seeded_api();
        let job = make_job(api.clone(), vec![CompletionOutcome::Ok(valid_raw(2))], None);

        job.run(&payload()).await.unwrap();

        assert!(api
            .comments()
            .iter()
            .any(|c| Marker::TemplateCheck.matches(&c.body)));
    }

    #[tokio::test]
    async fn test_template_notice_retracted_once_satisfied() {
        let api = seeded_api();

        // First delivery: fields missing.
        let job = make_job(api.clone(), vec![CompletionOutcome::Ok(valid_raw(2))], None);
        job.run(&payload()).await.unwrap();
        assert!(api
            .comments()
            .iter()
            .any(|c| Marker::TemplateCheck.matches(&c.body)));

        // Second delivery: fields filled in.
        let plan = CommitPlan::new("docs").with_file("docs/1000.md", "# 1000");
        let job = make_job(
            api.clone(),
            vec![CompletionOutcome::Ok(valid_raw(2))],
            Some(plan),
        );
        job.run(&payload()).await.unwrap();
        assert!(!api
            .comments()
            .iter()
            .any(|c| Marker::TemplateCheck.matches(&c.body)));
    }

    #[tokio::test]
    async fn test_unavailable_review_posts_notice() {
        let api = seeded_api();
        let job = make_job(api.clone(), vec![CompletionOutcome::RateLimited], None);

        job.run(&payload()).await.unwrap();

        assert!(api
            .comments()
            .iter()
            .any(|c| Marker::AiReview.matches(&c.body)
                && c.body.contains("could not be generated")));
        assert!(api.reviews().is_empty());
    }

    #[tokio::test]
    async fn test_push_job_syncs_docs_only() {
        let api = Arc::new(InMemoryGithub::new());
        let plan = CommitPlan::new("docs").with_file("docs/1000.md", "# 1000");
        let job = make_job(api.clone(), vec![], Some(plan));

        job.run(&JobPayload::Push {
            owner: "octo".into(),
            repo: "solutions".into(),
            branch: "main".into(),
        })
        .await
        .unwrap();

        assert_eq!(api.file("docs/1000.md").unwrap(), "# 1000\n");
        assert!(api.comments().is_empty());
        assert!(api.reviews().is_empty());
    }
}
