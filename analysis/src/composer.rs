//! Prompt construction for each report template.

use crate::finalizer::collect_citations;
use crate::template::{AnalysisTemplate, TopicSource};
use consult_core::{ConversationState, SearchItem};
use std::fmt::Write;

/// Stand-in for the reference material when search produced nothing
pub const EMPTY_RESULTS_MARKER: &str = "No web search results are available for this request.";

const NO_FENCE_RULE: &str = "Do NOT wrap your response in a code block. Never start the reply with ```markdown or ```md and never end it with ```. Write the markdown directly.";

const MARKDOWN_CONVENTIONS: [&str; 6] = [
    "Headers: use # for the report title, ## for main sections and ### for subsections. Every header starts on its own line.",
    "Bullet lists: use - for unordered points.",
    "Numbered lists: use 1., 2., 3. for ordered steps or rankings.",
    "Bold: wrap key terms and conclusions in **double asterisks**.",
    "Tables: use markdown tables with a header row for comparisons and ratings.",
    "Inline code: use `backticks` only for figures, tickers or technical identifiers.",
];

/// Text the search for this template is about.
///
/// Templates that read the previous turn fall back to the current input when
/// there is no history yet.
pub fn topic_for(template: AnalysisTemplate, state: &ConversationState) -> &str {
    match template.topic_source() {
        TopicSource::PreviousTurn => state.last_turn_text().unwrap_or(state.input.as_str()),
        TopicSource::CurrentInput => state.input.as_str(),
    }
}

/// Web search query for a template. General searches on the raw topic.
pub fn search_query(template: AnalysisTemplate, topic: &str, year: u16) -> String {
    match template {
        AnalysisTemplate::General => topic.to_string(),
        _ => format!("{} analysis of {} {}", template.search_label(), topic, year),
    }
}

fn push_formatting_rules(prompt: &mut String) {
    prompt.push_str("## Formatting rules\n");
    let _ = writeln!(prompt, "{}", NO_FENCE_RULE);
    prompt.push_str("Use these markdown conventions:\n");
    for (i, rule) in MARKDOWN_CONVENTIONS.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, rule);
    }
    prompt.push('\n');
}

fn push_citation_rules(prompt: &mut String, citable: usize) {
    prompt.push_str("## Citations\n");
    prompt.push_str(
        "Support factual claims with numbered in-text citations in square brackets, e.g. [1] or [2].\n",
    );
    let _ = writeln!(
        prompt,
        "Each number refers to the search result with the same number below; only numbers 1 to {} are valid.",
        citable
    );
    prompt.push_str("Cite every fact, figure or quote that comes from a search result, and never invent a citation.\n");
    prompt.push_str("Do not add your own list of sources; it is appended automatically.\n");
    prompt.push_str("Example: \"Revenue grew 12% year over year [1], driven by expansion in Asia [2].\"\n\n");
}

fn push_outline(prompt: &mut String, template: AnalysisTemplate) {
    let Some(outline) = template.outline() else {
        return;
    };
    prompt.push_str("## Required structure\n");
    prompt.push_str("Use exactly these sections, in this order, each as a ## header:\n");
    for (i, section) in outline.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}: {}", i + 1, section.title, section.guidance);
    }
    prompt.push_str(
        "Where a section assesses a force or dependency, state its rating as High, Medium or Low and justify it.\n\n",
    );
}

/// Reference material numbered the same way the Sources section will be.
fn push_search_results(prompt: &mut String, results: &[SearchItem]) {
    prompt.push_str("## Search results\n");
    let citations = collect_citations(results);
    if citations.is_empty() {
        let _ = writeln!(prompt, "{}", EMPTY_RESULTS_MARKER);
        return;
    }

    for citation in &citations {
        let _ = writeln!(prompt, "[{}] {}", citation.index, citation.title);
        let _ = writeln!(prompt, "URL: {}", citation.url);
        let snippet = results
            .iter()
            .find(|item| item.url.as_deref().map(str::trim) == Some(citation.url.as_str()))
            .and_then(|item| item.content.as_deref());
        if let Some(content) = snippet {
            let _ = writeln!(prompt, "Content: {}", content.trim());
        }
        prompt.push('\n');
    }
}

fn push_history(prompt: &mut String, state: &ConversationState) {
    prompt.push_str("## Conversation so far\n");
    if state.history.is_empty() {
        prompt.push_str("(no earlier messages)\n");
    }
    for turn in &state.history {
        let _ = writeln!(prompt, "{}: {}", turn.role, turn.text);
    }
    prompt.push('\n');
    prompt.push_str("## Latest message\n");
    let _ = writeln!(prompt, "{}\n", state.input);
}

/// Build the full instruction prompt for one turn.
pub fn compose(
    template: AnalysisTemplate,
    topic: &str,
    state: &ConversationState,
    results: &[SearchItem],
) -> String {
    let mut prompt = String::new();

    match template {
        AnalysisTemplate::General => {
            prompt.push_str(
                "You are an experienced business consultant continuing a conversation with a client.\n",
            );
            let _ = writeln!(prompt, "{}\n", template.scope());
            push_history(&mut prompt, state);
        }
        _ => {
            prompt.push_str("You are an experienced strategy consultant writing a structured report.\n");
            let _ = writeln!(
                prompt,
                "Generate a {} of {} as a structured markdown document.",
                template.display_name(),
                topic
            );
            let _ = writeln!(prompt, "{}\n", template.scope());
        }
    }

    push_outline(&mut prompt, template);
    push_formatting_rules(&mut prompt);

    let citable = collect_citations(results).len();
    if template.supports_citations() && citable > 0 {
        push_citation_rules(&mut prompt, citable);
    }

    push_search_results(&mut prompt, results);
    prompt
}
