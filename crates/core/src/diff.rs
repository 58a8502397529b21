//! Unified-diff line indexing.
//!
//! Review APIs address inline comments by new-side ("right") line
//! numbers. This module turns a per-file patch string into the ordered
//! sets of right-side line numbers that exist after the change, and the
//! subset of those that were introduced by the change.

/// Line-number index for one file's unified diff.
///
/// `added_lines` holds new-side numbers of `+` lines; `right_lines`
/// holds every new-side number present in the post-change file (`+`
/// plus context). Both are sorted and deduplicated, and
/// `added_lines ⊆ right_lines` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffIndex {
    pub added_lines: Vec<u32>,
    pub right_lines: Vec<u32>,
}

impl DiffIndex {
    /// Parse a unified-diff patch for a single file.
    ///
    /// A malformed or headerless patch yields empty sets rather than an
    /// error; downstream treats that as "no commentable lines".
    pub fn parse(patch: &str) -> Self {
        let mut added = Vec::new();
        let mut right = Vec::new();

        // New-side line counter; None while outside any hunk.
        let mut line: Option<u32> = None;

        for raw in patch.lines() {
            if raw.starts_with("@@") {
                match parse_hunk_header(raw) {
                    Some(new_start) => line = Some(new_start.saturating_sub(1)),
                    None => line = None,
                }
                continue;
            }

            let Some(current) = line else { continue };

            if raw.starts_with("+++") || raw.starts_with("---") {
                // File headers, not hunk content.
                continue;
            }
            if raw.starts_with('\\') {
                // "\ No newline at end of file"
                continue;
            }

            if raw.starts_with('+') {
                let next = current + 1;
                added.push(next);
                right.push(next);
                line = Some(next);
            } else if raw.starts_with('-') {
                // Old-side line, does not advance the new-side counter.
            } else {
                // Context line (leading space, or empty context line).
                let next = current + 1;
                right.push(next);
                line = Some(next);
            }
        }

        added.sort_unstable();
        added.dedup();
        right.sort_unstable();
        right.dedup();

        DiffIndex {
            added_lines: added,
            right_lines: right,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.right_lines.is_empty()
    }
}

/// Extract the new-side start line `c` from `@@ -a,b +c,d @@`.
fn parse_hunk_header(line: &str) -> Option<u32> {
    let plus = line.find('+')?;
    let rest = &line[plus + 1..];
    let end = rest.find(|c: char| !c.is_ascii_digit())?;
    if end == 0 {
        return None;
    }
    rest[..end].parse().ok()
}

/// A file changed in the pull request, with its diff index.
///
/// Recomputed fresh per job; never persisted.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    /// Repo-relative, slash-separated path.
    pub path: String,
    /// Unified diff text for this file, if the API provided one.
    pub patch: Option<String>,
    /// Current blob text at the head commit, possibly truncated.
    pub content: Option<String>,
    pub index: DiffIndex,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, patch: Option<String>, content: Option<String>) -> Self {
        let index = patch.as_deref().map(DiffIndex::parse).unwrap_or_default();
        Self {
            path: path.into(),
            patch,
            content,
            index,
        }
    }
}
