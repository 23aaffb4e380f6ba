//! Rendering of search results for downstream consumers.
//!
//! [`format_context`] produces the numbered plain-text block that an answer
//! generator is prompted with; [`citations`] produces the structured source
//! list returned next to an answer.

use super::types::{DocumentMetadata, SearchResult};
use serde::Serialize;

/// Returned by [`format_context`] when there is nothing to show.
pub const NO_CONTEXT_MESSAGE: &str = "No relevant documents found";

/// Placeholder for metadata fields a chunk does not carry.
pub const UNKNOWN: &str = "Unknown";

const RULE_WIDTH: usize = 80;

/// Provenance of one result, with `"Unknown"` for missing fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    pub source_file: String,
    pub page: String,
    pub chunk_id: String,
    pub relevance_score: f32,
}

fn field_or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

/// Renders results as numbered context blocks.
///
/// ```text
///
/// ================================================================================
/// Document 1: (Source: a.pdf, Page: (3), Score: 10.812):
/// chunk text
/// ```
pub fn format_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_CONTEXT_MESSAGE.to_string();
    }

    let blocks: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "Document {}: (Source: {}, Page: ({}), Score: {:.3}):\n{}\n",
                i + 1,
                field_or_unknown(result.metadata.source_file()),
                field_or_unknown(result.metadata.page()),
                result.score,
                result.content
            )
        })
        .collect();

    format!("\n{}\n{}", "=".repeat(RULE_WIDTH), blocks.join("\n"))
}

/// Builds one citation per result, preserving rank order.
pub fn citations(results: &[SearchResult]) -> Vec<SourceCitation> {
    results
        .iter()
        .map(|result| citation(&result.metadata, result.score))
        .collect()
}

fn citation(metadata: &DocumentMetadata, score: f32) -> SourceCitation {
    SourceCitation {
        source_file: field_or_unknown(metadata.source_file()),
        page: field_or_unknown(metadata.page()),
        chunk_id: field_or_unknown(metadata.chunk_id()),
        relevance_score: score,
    }
}
