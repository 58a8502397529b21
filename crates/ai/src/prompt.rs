//! Prompt building for review generation.
//!
//! Two variants are built per request: a full-detail prompt and a
//! size-capped compact prompt whose fields are truncated to a character
//! budget. When both are already under budget they are identical and
//! only one is tried.

use solvebot_core::review::ANSWER_UNAVAILABLE;

/// Everything the provider needs to review one pull request.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub title: String,
    pub description: String,
    pub diff: String,
    /// (path, content) of changed files at the head commit.
    pub files: Vec<(String, String)>,
}

const RESPONSE_CONTRACT: &str = r#"Respond with a single JSON object and nothing else:
{
  "summary_markdown": string,
  "time_complexity": string,
  "space_complexity": string,
  "answer_code": string,
  "inline_suggestions": [{ "path": string, "line": integer, "body": string }]
}
Line numbers refer to the post-change file. Use concise Markdown in bodies."#;

/// Build the prompt variants to try, full first, deduplicated.
pub fn build_prompt_variants(request: &ReviewRequest, compact_budget: usize) -> Vec<String> {
    let full = render(request, usize::MAX);
    let compact = render(request, compact_budget);

    if full == compact {
        vec![full]
    } else {
        vec![full, compact]
    }
}

fn render(request: &ReviewRequest, budget: usize) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are reviewing a solved-problem pull request.\n\n");
    prompt.push_str(&format!("**Title**: {}\n", truncate(&request.title, budget)));

    if !request.description.is_empty() {
        prompt.push_str(&format!(
            "\n**Description**:\n{}\n",
            truncate(&request.description, budget)
        ));
    }

    prompt.push_str("\n## Changed Files\n\n");
    for (path, content) in &request.files {
        prompt.push_str(&format!("### `{path}`\n\n```\n"));
        prompt.push_str(&truncate(content, budget));
        prompt.push_str("\n```\n\n");
    }

    prompt.push_str("## Diff\n\n```diff\n");
    prompt.push_str(&truncate(&request.diff, budget));
    prompt.push_str("\n```\n\n");

    prompt.push_str(RESPONSE_CONTRACT);
    prompt
}

/// Build the repair prompt for malformed provider output.
pub fn build_repair_prompt(malformed: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "The following review output is not valid JSON for the required schema. \
         Reconstruct it as a single schema-valid JSON object, preserving its meaning. \
         For any field you cannot recover use minimal placeholders: \
         \"O(unknown)\" for complexities, ",
    );
    prompt.push_str(&format!(
        "\"{ANSWER_UNAVAILABLE}\" for answer_code, and an empty array for inline_suggestions.\n\n"
    ));
    prompt.push_str(RESPONSE_CONTRACT);
    prompt.push_str("\n\nMalformed output:\n\n");
    prompt.push_str(malformed);
    prompt
}

/// Build the narrowly-scoped follow-up asking only for answer code.
pub fn build_answer_code_prompt(request: &ReviewRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Provide a reference solution for the problem below. \
         Respond with a single JSON object and nothing else: \
         { \"answer_code\": string }\n\n",
    );
    prompt.push_str(&format!("**Title**: {}\n", request.title));
    if !request.description.is_empty() {
        prompt.push_str(&format!("\n**Description**:\n{}\n", request.description));
    }
    prompt
}

/// Truncate to at most `budget` characters on a char boundary.
fn truncate(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    text.chars().take(budget).collect()
}
