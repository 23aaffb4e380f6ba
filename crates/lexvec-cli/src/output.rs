//! Output formatting for search results and index info.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use lexvec_core::lifecycle::IndexInfo;
use lexvec_core::search::{citations, SearchResult, SourceCitation};
use serde::Serialize;

/// Maximum characters to show in text snippet
const SNIPPET_MAX_LEN: usize = 200;

/// JSON output structure for search results
#[derive(Serialize)]
pub struct JsonOutput {
    pub query: String,
    pub results: Vec<JsonResult>,
    pub sources: Vec<SourceCitation>,
}

/// One ranked record in JSON format
#[derive(Serialize)]
pub struct JsonResult {
    pub ordinal: u64,
    /// Final fused score
    pub score: f32,
    pub semantic_score: Option<f32>,
    pub keyword_score: Option<f32>,
    pub exact_match: bool,
    pub snippet: String,
}

impl From<&SearchResult> for JsonResult {
    fn from(result: &SearchResult) -> Self {
        Self {
            ordinal: result.ordinal.as_u64(),
            score: result.score,
            semantic_score: result.semantic_score,
            keyword_score: result.keyword_score,
            exact_match: result.exact_match,
            snippet: truncate_text(&result.content, SNIPPET_MAX_LEN),
        }
    }
}

/// Formats search results as JSON.
pub fn format_json(query: &str, results: &[SearchResult]) -> String {
    let output = JsonOutput {
        query: query.to_string(),
        results: results.iter().map(JsonResult::from).collect(),
        sources: citations(results),
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats search results for human-readable terminal output.
pub fn format_human(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for \"{}\"", query);
    }

    let mut output = String::new();
    output.push_str(&format!(
        "Found {} result{} for \"{}\":\n\n",
        results.len(),
        if results.len() == 1 { "" } else { "s" },
        query
    ));

    for (i, result) in results.iter().enumerate() {
        let source = result
            .metadata
            .source_file()
            .unwrap_or_else(|| format!("#{}", result.ordinal));
        output.push_str(&format!(
            "{}. {} (score: {:.2}){}\n",
            i + 1,
            source,
            result.score,
            if result.exact_match { " [exact]" } else { "" }
        ));

        let mut score_parts = Vec::new();
        if let Some(semantic) = result.semantic_score {
            score_parts.push(format!("semantic: {:.2}", semantic));
        }
        if let Some(keyword) = result.keyword_score {
            score_parts.push(format!("keyword: {:.2}", keyword));
        }
        if let Some(page) = result.metadata.page() {
            score_parts.push(format!("page: {}", page));
        }
        if !score_parts.is_empty() {
            output.push_str(&format!("   [{}]\n", score_parts.join(", ")));
        }

        let snippet = truncate_text(&result.content, SNIPPET_MAX_LEN);
        output.push_str(&format!("   {}\n", indent_text(&snippet, "   ")));
        output.push('\n');
    }

    output.trim_end().to_string()
}

/// Formats index info for the terminal.
pub fn format_info(info: &IndexInfo) -> String {
    let mut lines = vec![
        format!("State:      {}", info.state),
        format!("Documents:  {}", info.total_documents),
        format!("Index rows: {}", info.index_size),
        format!("Model:      {}", info.model_id),
    ];
    if let Some(dimension) = info.dimension {
        lines.push(format!("Dimension:  {}", dimension));
    }
    if let Some(build_id) = &info.build_id {
        lines.push(format!("Build:      {}", build_id));
    }
    if let Some(created_at) = info.created_at {
        lines.push(format!("Created:    {} (unix)", created_at));
    }
    lines.push(format!("Top-k:      {}", info.top_k));
    lines.join("\n")
}

pub fn format_info_json(info: &IndexInfo) -> String {
    serde_json::to_string_pretty(info).unwrap_or_else(|_| "{}".to_string())
}

/// Truncates text to at most `max_len` characters, adding ellipsis if needed.
fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(max_len) else {
        return text.to_string();
    };
    let truncated = &text[..cut];
    // Prefer a word boundary
    match truncated.rfind(' ') {
        Some(last_space) if last_space > 0 => format!("{}...", &truncated[..last_space]),
        _ => format!("{}...", truncated),
    }
}

/// Indents all lines of text after the first line.
fn indent_text(text: &str, indent: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.to_string()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
