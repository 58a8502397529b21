//! Problem-document generation from the PR body template.
//!
//! Pull requests carry a Markdown template with `## Problem` and
//! `## Approach` sections. Both filled in, a document is generated
//! under `docs/`; either missing, the job posts the template notice
//! instead of committing.

use async_trait::async_trait;
use tracing::debug;

use solvebot_core::Error;
use solvebot_github::{CommitPlan, PullInfo, RepoRef};
use solvebot_review::DocSource;

const REQUIRED_SECTIONS: &[&str] = &["Problem", "Approach"];

pub struct TemplateDocs;

impl TemplateDocs {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TemplateDocs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocSource for TemplateDocs {
    async fn plan_for_pull(
        &self,
        _repo: &RepoRef,
        pull: &PullInfo,
    ) -> Result<Option<CommitPlan>, Error> {
        let Some(body) = pull.body.as_deref() else {
            return Ok(None);
        };

        let mut sections = Vec::with_capacity(REQUIRED_SECTIONS.len());
        for name in REQUIRED_SECTIONS {
            match extract_section(body, name) {
                Some(text) => sections.push((*name, text)),
                None => {
                    debug!(pull = pull.number, section = name, "Template section missing");
                    return Ok(None);
                }
            }
        }

        let path = format!("docs/{}.md", slug(&pull.title));
        let mut doc = format!("# {}\n", pull.title);
        for (name, text) in &sections {
            doc.push_str(&format!("\n## {name}\n\n{text}\n"));
        }

        Ok(Some(
            CommitPlan::new(format!("docs: {}", pull.title)).with_file(path, doc),
        ))
    }

    async fn plan_for_branch(
        &self,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<Option<CommitPlan>, Error> {
        // Branch pushes carry no template body to generate from.
        debug!(%repo, branch, "No template source for branch push");
        Ok(None)
    }
}

/// Extract the text under a `## {name}` heading, up to the next `##`
/// heading. Whitespace-only sections count as missing.
fn extract_section(body: &str, name: &str) -> Option<String> {
    let mut collecting = false;
    let mut lines = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim_end();
        if let Some(heading) = trimmed.strip_prefix("## ") {
            if collecting {
                break;
            }
            collecting = heading.trim() == name;
            continue;
        }
        if collecting {
            lines.push(trimmed);
        }
    }

    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Filesystem-safe document name from a PR title.
fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "untitled".into()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pull(body: Option<&str>) -> PullInfo {
        PullInfo {
            number: 1,
            title: "Solve: BOJ 1000 (A+B)".into(),
            body: body.map(String::from),
            head_sha: "abc".into(),
            head_ref: "solve/1000".into(),
        }
    }

    fn repo() -> RepoRef {
        RepoRef::new("octo", "solutions")
    }

    #[test]
    fn test_extract_section() {
        let body = "intro\n## Problem\nhttps://example.com/1000\n## Approach\nsimple sum\n";
        assert_eq!(
            extract_section(body, "Problem").unwrap(),
            "https://example.com/1000"
        );
        assert_eq!(extract_section(body, "Approach").unwrap(), "simple sum");
        assert!(extract_section(body, "Notes").is_none());
    }

    #[test]
    fn test_whitespace_section_is_missing() {
        let body = "## Problem\n\n   \n## Approach\nok\n";
        assert!(extract_section(body, "Problem").is_none());
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Solve: BOJ 1000 (A+B)"), "solve-boj-1000-a-b");
        assert_eq!(slug("???"), "untitled");
    }

    #[tokio::test]
    async fn test_plan_from_complete_template() {
        let pull = make_pull(Some("## Problem\nBOJ 1000\n## Approach\nread two ints\n"));
        let plan = TemplateDocs::new()
            .plan_for_pull(&repo(), &pull)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(plan.files.len(), 1);
        assert_eq!(plan.files[0].path, "docs/solve-boj-1000-a-b.md");
        assert!(plan.files[0].content.contains("## Problem"));
        assert!(plan.files[0].content.contains("read two ints"));
    }

    #[tokio::test]
    async fn test_incomplete_template_yields_none() {
        let pull = make_pull(Some("## Problem\nBOJ 1000\n"));
        assert!(TemplateDocs::new()
            .plan_for_pull(&repo(), &pull)
            .await
            .unwrap()
            .is_none());

        let empty = make_pull(None);
        assert!(TemplateDocs::new()
            .plan_for_pull(&repo(), &empty)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_branch_push_has_no_plan() {
        assert!(TemplateDocs::new()
            .plan_for_branch(&repo(), "main")
            .await
            .unwrap()
            .is_none());
    }
}
