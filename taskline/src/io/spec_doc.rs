//! Task document parsing for `taskline register`.
//!
//! A task document is human-facing markdown. The first ATX heading becomes
//! the task title; the whole document body is the description.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Parsed task document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDoc {
    /// First heading, if the document has one.
    pub title: Option<String>,
    /// Full document text.
    pub body: String,
}

/// Read and parse a task document from disk.
pub fn read_task_doc(path: &Path) -> Result<TaskDoc> {
    let body =
        fs::read_to_string(path).with_context(|| format!("read task document {}", path.display()))?;
    let title = extract_title(&body);
    Ok(TaskDoc { title, body })
}

/// Extract the first markdown heading, skipping fenced code blocks.
pub fn extract_title(contents: &str) -> Option<String> {
    let mut in_fence = false;
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('#') {
            let title = rest.trim_start_matches('#').trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_heading() {
        let doc = "intro text\n\n# Add login\n\n## Details\n";
        assert_eq!(extract_title(doc), Some("Add login".to_string()));
    }

    #[test]
    fn skips_headings_inside_code_fences() {
        let doc = "```sh\n# not a title\n```\n\n## Real title\n";
        assert_eq!(extract_title(doc), Some("Real title".to_string()));
    }

    #[test]
    fn returns_none_without_heading() {
        assert_eq!(extract_title("plain paragraph\n"), None);
        assert_eq!(extract_title("#\n##   \n"), None);
    }

    #[test]
    fn read_task_doc_keeps_full_body() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("task.md");
        std::fs::write(&path, "# Fix pagination\n\nOff-by-one on page 2.\n").expect("write");

        let doc = read_task_doc(&path).expect("read");
        assert_eq!(doc.title, Some("Fix pagination".to_string()));
        assert!(doc.body.contains("Off-by-one"));
    }
}
