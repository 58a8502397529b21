//! Resolution of AI-suggested (path, line) pairs onto diff coordinates.
//!
//! Provider output drifts: paths come back with `./` prefixes, missing
//! directories or backslashes, and line numbers are off by a few when
//! the prompt content was truncated. Resolution tolerates that drift
//! but fails (drops the suggestion) rather than place a misleading
//! comment.

use tracing::debug;

use crate::diff::ChangedFile;
use crate::review::{ResolvedComment, Suggestion};

/// Tuning knobs for suggestion resolution.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum distance between the suggested line and the nearest
    /// commentable line before the suggestion is dropped.
    pub max_line_distance: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_line_distance: 20,
        }
    }
}

/// Resolve a suggestion to a commentable coordinate, or `None` if it
/// cannot be mapped. Pure function of its inputs.
pub fn resolve_suggestion(
    suggestion: &Suggestion,
    files: &[ChangedFile],
    config: &ResolverConfig,
) -> Option<ResolvedComment> {
    let file = resolve_path(&suggestion.path, files)?;
    let line = resolve_line(suggestion.line, &file.index.right_lines, config)?;

    Some(ResolvedComment {
        path: file.path.clone(),
        line,
        body: suggestion.body.clone(),
    })
}

/// Normalize a path for comparison: strip leading `./` and slashes,
/// convert backslashes.
fn normalize(path: &str) -> String {
    let mut p = path.replace('\\', "/");
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest.to_string();
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest.to_string();
        } else {
            break;
        }
    }
    p
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Is `suffix` a path-suffix of `path` on segment boundaries?
fn is_path_suffix(path: &str, suffix: &str) -> bool {
    path == suffix || path.ends_with(&format!("/{suffix}"))
}

fn resolve_path<'a>(suggested: &str, files: &'a [ChangedFile]) -> Option<&'a ChangedFile> {
    let wanted = normalize(suggested);

    // 1. Exact match after normalization.
    if let Some(file) = files.iter().find(|f| normalize(&f.path) == wanted) {
        return Some(file);
    }

    // 2. Unique suffix match, in either direction.
    let suffix_matches: Vec<&ChangedFile> = files
        .iter()
        .filter(|f| {
            let have = normalize(&f.path);
            is_path_suffix(&have, &wanted) || is_path_suffix(&wanted, &have)
        })
        .collect();
    if suffix_matches.len() == 1 {
        return Some(suffix_matches[0]);
    }

    // 3. Unique basename match.
    let name = basename(&wanted);
    if !name.is_empty() {
        let name_matches: Vec<&ChangedFile> = files
            .iter()
            .filter(|f| basename(&normalize(&f.path)) == name)
            .collect();
        if name_matches.len() == 1 {
            return Some(name_matches[0]);
        }
    }

    // 4. A single-file change is unambiguous regardless of the path.
    if files.len() == 1 {
        return Some(&files[0]);
    }

    debug!(path = %suggested, "Suggestion path unmappable");
    None
}

fn resolve_line(suggested: u32, right_lines: &[u32], config: &ResolverConfig) -> Option<u32> {
    if right_lines.contains(&suggested) {
        return Some(suggested);
    }

    // Nearest commentable line; right_lines is sorted, so on a distance
    // tie the smaller line wins.
    let (best, distance) = right_lines
        .iter()
        .map(|&line| (line, line.abs_diff(suggested)))
        .min_by_key(|&(_, d)| d)?;

    if distance > config.max_line_distance {
        debug!(
            line = suggested,
            nearest = best,
            distance,
            "Suggestion line too far from any commentable line"
        );
        return None;
    }

    Some(best)
}
