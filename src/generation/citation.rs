//! Citation extraction linking bracketed markers back to evidence

use regex::Regex;

use crate::types::{Citation, EvidenceBundle, EvidenceItem};

/// Extract bracketed `[n]` markers from an answer and map each to the nth
/// evidence reference.
///
/// Markers pointing outside the bundle are dropped. When the answer cites
/// nothing but evidence exists, the top items by similarity are attached so
/// the caller can still show sources.
pub fn extract_citations(answer: &str, bundle: &EvidenceBundle) -> Vec<Citation> {
    let marker = Regex::new(r"\[(\d+)\]").expect("Invalid regex");

    let mut citations: Vec<Citation> = Vec::new();

    for capture in marker.captures_iter(answer) {
        let reference: usize = match capture[1].parse() {
            Ok(n) => n,
            Err(_) => continue,
        };
        if reference == 0 || reference > bundle.items.len() {
            tracing::debug!("Dropping out-of-range citation marker [{}]", reference);
            continue;
        }
        if citations.iter().any(|c| c.reference == reference) {
            continue;
        }
        citations.push(citation_for(reference, &bundle.items[reference - 1]));
    }

    // Uncited answer with evidence available: surface the strongest sources
    if citations.is_empty() && !bundle.items.is_empty() {
        let mut indexed: Vec<(usize, &EvidenceItem)> =
            bundle.items.iter().enumerate().collect();
        indexed.sort_by(|a, b| {
            similarity_of(b.1)
                .partial_cmp(&similarity_of(a.1))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (index, item) in indexed.into_iter().take(3) {
            citations.push(citation_for(index + 1, item));
        }
    }

    citations
}

fn citation_for(reference: usize, item: &EvidenceItem) -> Citation {
    match item {
        EvidenceItem::RagChunk(result) => Citation {
            reference,
            document_id: Some(result.document_id),
            title: result.document_title.clone(),
            url: None,
            snippet: snippet_of(&result.content),
            similarity_score: Some(result.similarity),
        },
        EvidenceItem::WebResult(passage) => Citation {
            reference,
            document_id: None,
            title: passage.title.clone(),
            url: Some(passage.url.clone()),
            snippet: snippet_of(&passage.text),
            similarity_score: None,
        },
    }
}

fn similarity_of(item: &EvidenceItem) -> f32 {
    match item {
        EvidenceItem::RagChunk(result) => result.similarity,
        EvidenceItem::WebResult(_) => 0.0,
    }
}

/// Bounded snippet preserving word boundaries
fn snippet_of(content: &str) -> String {
    const MAX_SNIPPET: usize = 240;
    if content.chars().count() <= MAX_SNIPPET {
        return content.to_string();
    }

    let truncated: String = content.chars().take(MAX_SNIPPET).collect();
    match truncated.rfind(' ') {
        Some(pos) => format!("{}...", &truncated[..pos]),
        None => format!("{}...", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::WebPassage;
    use crate::types::SearchResult;
    use uuid::Uuid;

    fn rag_item(title: &str, content: &str, similarity: f32) -> EvidenceItem {
        EvidenceItem::RagChunk(SearchResult {
            document_id: Uuid::new_v4(),
            document_title: title.to_string(),
            content: content.to_string(),
            similarity,
            chunk_index: 0,
            semantic_score: None,
            keyword_score: None,
        })
    }

    fn web_item(title: &str, url: &str) -> EvidenceItem {
        EvidenceItem::WebResult(WebPassage {
            title: title.to_string(),
            url: url.to_string(),
            text: "web passage text".to_string(),
        })
    }

    #[test]
    fn markers_map_to_evidence_positions() {
        let bundle = EvidenceBundle::new(vec![
            rag_item("First", "alpha content", 0.9),
            web_item("Second", "https://example.org"),
        ]);

        let citations =
            extract_citations("The plan was approved [1] and announced publicly [2].", &bundle);

        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].reference, 1);
        assert_eq!(citations[0].title, "First");
        assert_eq!(citations[1].url.as_deref(), Some("https://example.org"));
    }

    #[test]
    fn repeated_and_out_of_range_markers_are_dropped() {
        let bundle = EvidenceBundle::new(vec![rag_item("Only", "content", 0.9)]);

        let citations = extract_citations("Claim [1], again [1], and bogus [7] [0].", &bundle);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].reference, 1);
    }

    #[test]
    fn uncited_answer_falls_back_to_top_similarity() {
        let bundle = EvidenceBundle::new(vec![
            rag_item("Weak", "weak content", 0.2),
            rag_item("Strong", "strong content", 0.95),
        ]);

        let citations = extract_citations("An answer without any markers.", &bundle);

        assert!(!citations.is_empty());
        assert_eq!(citations[0].title, "Strong");
        assert_eq!(citations[0].reference, 2);
    }

    #[test]
    fn empty_bundle_yields_no_citations() {
        let citations = extract_citations("Anything [1] at all.", &EvidenceBundle::default());
        assert!(citations.is_empty());
    }
}
