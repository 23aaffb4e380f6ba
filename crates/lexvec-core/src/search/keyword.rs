//! Exact-match keyword pass.
//!
//! Queries are mined for identifier-like tokens (long digit runs, numeric
//! codes and mixed letter/digit tokens such as part numbers). A record scores
//! one point per distinct keyword that occurs anywhere in its lower-cased
//! content.
//!
//! # Usage
//!
//! ```ignore
//! use lexvec_core::search::keyword::{extract_keywords, KeywordIndex};
//!
//! let keywords = extract_keywords("invoice INV2024A for order 0012345678");
//! assert!(keywords.contains("INV2024A"));
//!
//! let index = KeywordIndex::new(&records);
//! let hits = index.search("where is INV2024A", 10); // Vec<(Ordinal, f32)>
//! ```
//!
//! Matching is plain substring containment, so a keyword also matches inside
//! longer tokens of the content. The scan is linear in corpus size.

use super::types::{DocumentRecord, Ordinal};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Digit runs of at least 10 characters (account or phone numbers).
static LONG_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{10,}\b").expect("long number pattern is valid"));

/// Digit runs of at least 6 characters (codes, dates, references).
static NUMERIC_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{6,}\b").expect("numeric code pattern is valid"));

/// Tokens mixing letters and digits in either order.
static MIXED_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z]\w*\d+\w*\b|\b\d+\w*[A-Za-z]\w*\b")
        .expect("mixed alphanumeric pattern is valid")
});

/// Extracts identifier-like keywords from `text`.
///
/// Returns the union of all pattern matches with duplicates collapsed. Case
/// is preserved here; the keyword pass lower-cases before comparing.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    [&*LONG_NUMBER, &*NUMERIC_CODE, &*MIXED_ALPHANUMERIC]
        .into_iter()
        .flat_map(|pattern| pattern.find_iter(text).map(|m| m.as_str().to_string()))
        .collect()
}

/// Lower-cased copy of every record's content, in ordinal order.
///
/// Built once per index so queries do not re-fold the corpus.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    contents: Vec<String>,
}

impl KeywordIndex {
    pub fn new(records: &[DocumentRecord]) -> Self {
        Self {
            contents: records.iter().map(|r| r.content.to_lowercase()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Scores every record against the query's keywords.
    ///
    /// Returns up to `limit` `(Ordinal, hits)` pairs with `hits > 0`, sorted
    /// by hit count descending; equal counts keep ordinal order.
    #[instrument(skip_all, fields(limit))]
    pub fn search(&self, query: &str, limit: usize) -> Vec<(Ordinal, f32)> {
        let keywords: BTreeSet<String> = extract_keywords(query)
            .into_iter()
            .map(|k| k.to_lowercase())
            .collect();

        if keywords.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut hits: Vec<(Ordinal, f32)> = self
            .contents
            .iter()
            .enumerate()
            .filter_map(|(row, content)| {
                let found = keywords
                    .iter()
                    .filter(|k| content.contains(k.as_str()))
                    .count();
                (found > 0).then(|| (Ordinal::from_index(row), found as f32))
            })
            .collect();

        // Stable sort keeps ordinal order among equal counts
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(limit);

        debug!(
            "Keyword pass: {} keywords, {} matching records",
            keywords.len(),
            hits.len()
        );
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::DocumentMetadata;

    fn records(texts: &[&str]) -> Vec<DocumentRecord> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| DocumentRecord {
                ordinal: Ordinal::from_index(i),
                content: text.to_string(),
                metadata: DocumentMetadata::default(),
                embedding: vec![0.0],
            })
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extracts_mixed_tokens() {
        assert_eq!(
            extract_keywords("Order ABC123 shipped via 9XY"),
            set(&["9XY", "ABC123"])
        );
    }

    #[test]
    fn test_long_number_also_counts_as_code() {
        // Both numeric patterns match; the set collapses them
        assert_eq!(extract_keywords("call 0123456789 now"), set(&["0123456789"]));
    }

    #[test]
    fn test_short_numbers_ignored() {
        assert!(extract_keywords("page 12345 of the report").is_empty());
        assert_eq!(extract_keywords("ref 123456"), set(&["123456"]));
    }

    #[test]
    fn test_plain_words_yield_nothing() {
        assert!(extract_keywords("hello world").is_empty());
        assert!(extract_keywords("").is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(extract_keywords("A1 and A1 again"), set(&["A1"]));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let index = KeywordIndex::new(&records(&["Part abc123xyz in stock", "nothing here"]));
        let hits = index.search("where is ABC123XYZ", 10);
        assert_eq!(hits, vec![(Ordinal::from_index(0), 1.0)]);
    }

    #[test]
    fn test_counts_distinct_keywords_and_orders_by_hits() {
        let index = KeywordIndex::new(&records(&[
            "only A1 here",
            "both A1 and B2 here",
            "A1 A1 A1 repeated",
        ]));
        let hits = index.search("A1 B2", 10);
        assert_eq!(
            hits,
            vec![
                (Ordinal::from_index(1), 2.0),
                (Ordinal::from_index(0), 1.0),
                (Ordinal::from_index(2), 1.0),
            ]
        );
    }

    #[test]
    fn test_limit_applies_after_sort() {
        let index = KeywordIndex::new(&records(&["A1", "A1 B2", "A1"]));
        let hits = index.search("A1 B2", 1);
        assert_eq!(hits, vec![(Ordinal::from_index(1), 2.0)]);
        assert!(index.search("A1", 0).is_empty());
    }

    #[test]
    fn test_query_without_keywords_matches_nothing() {
        let index = KeywordIndex::new(&records(&["hello world"]));
        assert!(index.search("hello", 10).is_empty());
    }
}
