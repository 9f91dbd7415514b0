//! Cleanup of model output and rendering of the numbered "Sources" section.

use consult_core::{SearchItem, SourceCitation};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

lazy_static! {
    /// "```markdown" or "```md" opening the reply, tolerant of case and spacing
    static ref LEADING_FENCE: Regex =
        Regex::new(r"(?i)\A\s*```[ \t]*(?:markdown|md)\b[ \t]*\r?\n?").unwrap();
    static ref TRAILING_FENCE: Regex = Regex::new(r"\s*```\s*\z").unwrap();
    /// A header marker glued to the preceding text
    static ref INLINE_HEADER: Regex = Regex::new(r"([^\n#])(#{1,6}[ \t])").unwrap();
}

const FENCE: &str = "```";

/// Strip an accidental code fence around the whole reply and put every
/// markdown header on its own line.
///
/// The trailing closer is only removed while it is unbalanced, so a reply that
/// legitimately ends with a complete code block keeps it.
pub fn sanitize(raw: &str) -> String {
    let text = LEADING_FENCE.replace(raw, "");

    let text = if text.matches(FENCE).count() % 2 == 1 {
        TRAILING_FENCE.replace(&text, "").into_owned()
    } else {
        text.into_owned()
    };

    let text = INLINE_HEADER.replace_all(&text, "${1}\n${2}");
    text.trim().to_string()
}

fn clean_title(title: &str) -> String {
    title
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('"', "'")
        .trim()
        .to_string()
}

/// Number the citable search results, first occurrence first.
///
/// Results without a URL cannot be linked and are skipped. A repeated URL keeps
/// the index and title of its first occurrence. A missing title falls back to
/// the URL.
pub fn collect_citations(results: &[SearchItem]) -> Vec<SourceCitation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for item in results {
        let Some(url) = item.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            debug!(title = ?item.title, "Skipping search result without a URL");
            continue;
        };
        if !seen.insert(url) {
            continue;
        }

        let title = item
            .title
            .as_deref()
            .map(clean_title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| url.to_string());

        citations.push(SourceCitation {
            index: citations.len() + 1,
            title,
            url: url.to_string(),
        });
    }

    citations
}

/// Render the "Sources" section, or nothing when there is nothing to cite.
pub fn render_sources(citations: &[SourceCitation]) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = citations
        .iter()
        .map(|c| format!("{}. [{}]({})", c.index, c.title, c.url))
        .collect();
    format!("\n\n### Sources\n{}", lines.join("\n"))
}

/// Sanitize the raw model reply and append the sources it may cite.
pub fn finalize(raw: &str, results: &[SearchItem]) -> String {
    let mut text = sanitize(raw);
    text.push_str(&render_sources(&collect_citations(results)));
    text
}
