//! In-memory `GithubApi` used by the ledger and committer tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use solvebot_core::Error;

use crate::client::{
    DraftReviewComment, GithubApi, IssueComment, PullFile, PullInfo, PullRef, RepoRef, ReviewInfo,
    TreeEntry,
};

const BOT_LOGIN: &str = "solvebot[bot]";

#[derive(Default)]
struct State {
    files: HashMap<String, String>,
    head_sha: String,
    // commit sha -> (parent sha, tree sha)
    commits: HashMap<String, (String, String)>,
    trees: HashMap<String, Vec<TreeEntry>>,
    comments: Vec<IssueComment>,
    reviews: Vec<ReviewInfo>,
    review_comments: Vec<DraftReviewComment>,
    next_id: u64,
    writes: usize,
    fail_next_ref_update: bool,
}

/// Single-branch in-memory repository double.
pub struct InMemoryGithub {
    state: Mutex<State>,
}

impl InMemoryGithub {
    pub fn new() -> Self {
        let mut state = State {
            head_sha: "base0".into(),
            next_id: 1,
            ..State::default()
        };
        state.commits.insert("base0".into(), (String::new(), "tree-base0".into()));
        state.trees.insert("tree-base0".into(), Vec::new());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn pull(number: u64) -> PullRef {
        PullRef {
            repo: RepoRef::new("octo", "solutions"),
            number,
        }
    }

    pub fn seed_file(&self, path: &str, content: &str) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.into(), content.into());
    }

    pub fn seed_comment(&self, author: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.comments.push(IssueComment {
            id,
            body: body.into(),
            author: author.into(),
        });
    }

    pub fn fail_next_ref_update(&self) {
        self.state.lock().unwrap().fail_next_ref_update = true;
    }

    pub fn comments(&self) -> Vec<IssueComment> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn reviews(&self) -> Vec<ReviewInfo> {
        self.state.lock().unwrap().reviews.clone()
    }

    pub fn review_comments(&self) -> Vec<DraftReviewComment> {
        self.state.lock().unwrap().review_comments.clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn head_sha(&self) -> String {
        self.state.lock().unwrap().head_sha.clone()
    }

    pub fn commit_parent(&self, sha: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .commits
            .get(sha)
            .map(|(parent, _)| parent.clone())
    }

    /// Number of mutating API calls so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

#[async_trait]
impl GithubApi for InMemoryGithub {
    async fn get_pull(&self, pull: &PullRef) -> Result<PullInfo, Error> {
        Ok(PullInfo {
            number: pull.number,
            title: "test pull".into(),
            body: None,
            head_sha: self.head_sha(),
            head_ref: "main".into(),
        })
    }

    async fn list_pull_files(&self, _pull: &PullRef) -> Result<Vec<PullFile>, Error> {
        Ok(Vec::new())
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
        state.writes += 1;
        state.comments.push(IssueComment {
            id,
            body: body.into(),
            author: BOT_LOGIN.into(),
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
        state.writes += 1;
        match state.comments.iter_mut().find(|c| c.id == comment_id) {
            Some(comment) => {
                comment.body = body.into();
                Ok(())
            }
            None => Err(Error::Api {
                status: 404,
                message: "comment not found".into(),
            }),
        }
    }

    async fn delete_issue_comment(&self, _repo: &RepoRef, comment_id: u64) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
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
        state.writes += 1;
        state.reviews.push(ReviewInfo {
            id,
            body: body.into(),
            commit_id: commit_id.into(),
            author: BOT_LOGIN.into(),
        });
        state.review_comments.extend_from_slice(comments);
        Ok(())
    }

    async fn get_ref_sha(&self, _repo: &RepoRef, _branch: &str) -> Result<String, Error> {
        Ok(self.head_sha())
    }

    async fn get_commit_tree(&self, _repo: &RepoRef, commit_sha: &str) -> Result<String, Error> {
        let state = self.state.lock().unwrap();
        state
            .commits
            .get(commit_sha)
            .map(|(_, tree)| tree.clone())
            .ok_or(Error::Api {
                status: 404,
                message: "commit not found".into(),
            })
    }

    async fn create_tree(
        &self,
        _repo: &RepoRef,
        _base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.writes += 1;
        let sha = format!("tree-{id}");
        state.trees.insert(sha.clone(), entries.to_vec());
        Ok(sha)
    }

    async fn create_commit(
        &self,
        _repo: &RepoRef,
        _message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.writes += 1;
        let sha = format!("commit-{id}");
        state
            .commits
            .insert(sha.clone(), (parent_sha.into(), tree_sha.into()));
        Ok(sha)
    }

    async fn update_ref(&self, _repo: &RepoRef, _branch: &str, sha: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_ref_update {
            state.fail_next_ref_update = false;
            return Err(Error::ConcurrentModification);
        }
        state.writes += 1;

        // Apply the commit's tree entries to the visible file set.
        let tree_sha = state
            .commits
            .get(sha)
            .map(|(_, tree)| tree.clone())
            .unwrap_or_default();
        if let Some(entries) = state.trees.get(&tree_sha).cloned() {
            for entry in entries {
                state.files.insert(entry.path, entry.content);
            }
        }
        state.head_sha = sha.into();
        Ok(())
    }
}
