//! GitHub REST API client and the `GithubApi` seam.

use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use tracing::debug;

use solvebot_core::Error;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "solvebot";

/// A repository coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A pull request coordinate.
#[derive(Debug, Clone)]
pub struct PullRef {
    pub repo: RepoRef,
    pub number: u64,
}

/// Pull request metadata needed by review jobs.
#[derive(Debug, Clone)]
pub struct PullInfo {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub head_sha: String,
    pub head_ref: String,
}

/// One file in a pull request's diff.
#[derive(Debug, Clone)]
pub struct PullFile {
    pub filename: String,
    pub patch: Option<String>,
}

/// An issue/PR comment.
#[derive(Debug, Clone)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
    pub author: String,
}

/// A pull request review.
#[derive(Debug, Clone)]
pub struct ReviewInfo {
    pub id: u64,
    pub body: String,
    pub commit_id: String,
    pub author: String,
}

/// An inline comment attached to a review at creation time.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DraftReviewComment {
    pub path: String,
    pub line: u32,
    pub side: String,
    pub body: String,
}

impl DraftReviewComment {
    pub fn right(path: impl Into<String>, line: u32, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            side: "RIGHT".into(),
            body: body.into(),
        }
    }
}

/// An entry in a tree creation request.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub content: String,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".into(),
            entry_type: "blob".into(),
            content: content.into(),
        }
    }
}

/// REST operations consumed by the ledger, committer and job runner.
#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn get_pull(&self, pull: &PullRef) -> Result<PullInfo, Error>;
    async fn list_pull_files(&self, pull: &PullRef) -> Result<Vec<PullFile>, Error>;

    /// Fetch a file's decoded text content at a ref; `None` when the
    /// path does not exist there.
    async fn get_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<String>, Error>;

    async fn list_issue_comments(&self, pull: &PullRef) -> Result<Vec<IssueComment>, Error>;
    async fn create_issue_comment(&self, pull: &PullRef, body: &str) -> Result<u64, Error>;
    async fn update_issue_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> Result<(), Error>;
    async fn delete_issue_comment(&self, repo: &RepoRef, comment_id: u64) -> Result<(), Error>;

    async fn list_reviews(&self, pull: &PullRef) -> Result<Vec<ReviewInfo>, Error>;
    async fn create_review(
        &self,
        pull: &PullRef,
        commit_id: &str,
        body: &str,
        comments: &[DraftReviewComment],
    ) -> Result<(), Error>;

    async fn get_ref_sha(&self, repo: &RepoRef, branch: &str) -> Result<String, Error>;
    async fn get_commit_tree(&self, repo: &RepoRef, commit_sha: &str) -> Result<String, Error>;
    async fn create_tree(
        &self,
        repo: &RepoRef,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, Error>;
    async fn create_commit(
        &self,
        repo: &RepoRef,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, Error>;

    /// Non-forced ref update. Fails with `ConcurrentModification` when
    /// the branch moved since the parent commit was read.
    async fn update_ref(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), Error>;
}

/// reqwest-backed implementation of [`GithubApi`].
pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, Error> {
        let resp = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        let resp = self
            .request(method, path)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn get_pull(&self, pull: &PullRef) -> Result<PullInfo, Error> {
        let json = self
            .get_json(&format!(
                "/repos/{}/pulls/{}",
                pull.repo, pull.number
            ))
            .await?;
        Ok(PullInfo {
            number: json["number"].as_u64().unwrap_or(pull.number),
            title: json["title"].as_str().unwrap_or_default().to_string(),
            body: json["body"].as_str().map(String::from),
            head_sha: json["head"]["sha"].as_str().unwrap_or_default().to_string(),
            head_ref: json["head"]["ref"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn list_pull_files(&self, pull: &PullRef) -> Result<Vec<PullFile>, Error> {
        let json = self
            .get_json(&format!(
                "/repos/{}/pulls/{}/files?per_page=100",
                pull.repo, pull.number
            ))
            .await?;
        let files = json
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|f| {
                        Some(PullFile {
                            filename: f["filename"].as_str()?.to_string(),
                            patch: f["patch"].as_str().map(String::from),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(files)
    }

    async fn get_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<String>, Error> {
        let encoded: String = path
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!("/repos/{repo}/contents/{encoded}?ref={git_ref}");

        let resp = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let json: serde_json::Value = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let raw = json["content"].as_str().unwrap_or_default();
        let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| Error::Decode(format!("contents base64: {e}")))?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn list_issue_comments(&self, pull: &PullRef) -> Result<Vec<IssueComment>, Error> {
        let json = self
            .get_json(&format!(
                "/repos/{}/issues/{}/comments?per_page=100",
                pull.repo, pull.number
            ))
            .await?;
        let comments = json
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| {
                        Some(IssueComment {
                            id: c["id"].as_u64()?,
                            body: c["body"].as_str().unwrap_or_default().to_string(),
                            author: c["user"]["login"].as_str().unwrap_or_default().to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(comments)
    }

    async fn create_issue_comment(&self, pull: &PullRef, body: &str) -> Result<u64, Error> {
        let json = self
            .send_json(
                reqwest::Method::POST,
                &format!("/repos/{}/issues/{}/comments", pull.repo, pull.number),
                &serde_json::json!({ "body": body }),
            )
            .await?;
        Ok(json["id"].as_u64().unwrap_or(0))
    }

    async fn update_issue_comment(
        &self,
        repo: &RepoRef,
        comment_id: u64,
        body: &str,
    ) -> Result<(), Error> {
        self.send_json(
            reqwest::Method::PATCH,
            &format!("/repos/{repo}/issues/comments/{comment_id}"),
            &serde_json::json!({ "body": body }),
        )
        .await?;
        Ok(())
    }

    async fn delete_issue_comment(&self, repo: &RepoRef, comment_id: u64) -> Result<(), Error> {
        let resp = self
            .request(
                reqwest::Method::DELETE,
                &format!("/repos/{repo}/issues/comments/{comment_id}"),
            )
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn list_reviews(&self, pull: &PullRef) -> Result<Vec<ReviewInfo>, Error> {
        let json = self
            .get_json(&format!(
                "/repos/{}/pulls/{}/reviews?per_page=100",
                pull.repo, pull.number
            ))
            .await?;
        let reviews = json
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|r| {
                        Some(ReviewInfo {
                            id: r["id"].as_u64()?,
                            body: r["body"].as_str().unwrap_or_default().to_string(),
                            commit_id: r["commit_id"].as_str().unwrap_or_default().to_string(),
                            author: r["user"]["login"].as_str().unwrap_or_default().to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(reviews)
    }

    async fn create_review(
        &self,
        pull: &PullRef,
        commit_id: &str,
        body: &str,
        comments: &[DraftReviewComment],
    ) -> Result<(), Error> {
        debug!(pull = pull.number, comments = comments.len(), "Creating review");
        self.send_json(
            reqwest::Method::POST,
            &format!("/repos/{}/pulls/{}/reviews", pull.repo, pull.number),
            &serde_json::json!({
                "commit_id": commit_id,
                "body": body,
                "event": "COMMENT",
                "comments": comments,
            }),
        )
        .await?;
        Ok(())
    }

    async fn get_ref_sha(&self, repo: &RepoRef, branch: &str) -> Result<String, Error> {
        let json = self
            .get_json(&format!("/repos/{repo}/git/ref/heads/{branch}"))
            .await?;
        Ok(json["object"]["sha"].as_str().unwrap_or_default().to_string())
    }

    async fn get_commit_tree(&self, repo: &RepoRef, commit_sha: &str) -> Result<String, Error> {
        let json = self
            .get_json(&format!("/repos/{repo}/git/commits/{commit_sha}"))
            .await?;
        Ok(json["tree"]["sha"].as_str().unwrap_or_default().to_string())
    }

    async fn create_tree(
        &self,
        repo: &RepoRef,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, Error> {
        let json = self
            .send_json(
                reqwest::Method::POST,
                &format!("/repos/{repo}/git/trees"),
                &serde_json::json!({ "base_tree": base_tree, "tree": entries }),
            )
            .await?;
        Ok(json["sha"].as_str().unwrap_or_default().to_string())
    }

    async fn create_commit(
        &self,
        repo: &RepoRef,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, Error> {
        let json = self
            .send_json(
                reqwest::Method::POST,
                &format!("/repos/{repo}/git/commits"),
                &serde_json::json!({
                    "message": message,
                    "tree": tree_sha,
                    "parents": [parent_sha],
                }),
            )
            .await?;
        Ok(json["sha"].as_str().unwrap_or_default().to_string())
    }

    async fn update_ref(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), Error> {
        let resp = self
            .request(
                reqwest::Method::PATCH,
                &format!("/repos/{repo}/git/refs/heads/{branch}"),
            )
            .json(&serde_json::json!({ "sha": sha, "force": false }))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        // A non-fast-forward update is rejected with 422 when the branch
        // moved between reading the tip and updating the ref.
        if resp.status().as_u16() == 422 {
            return Err(Error::ConcurrentModification);
        }
        Self::check(resp).await?;
        Ok(())
    }
}
