//! The working conceptual model accumulated across a run.
//!
//! Single-writer: only the Builder mutates this, one decision at a time,
//! which keeps merges race-free without locking.

use std::collections::HashSet;

use conceptscribe_reasoner::ConceptDraft;
use conceptscribe_shared::Concept;

/// Ordered concept collection plus the crawl frontier.
///
/// Insertion order is significant — it determines index ordering at
/// emission. The frontier holds normalized URLs already visited (or
/// attempted), preventing re-visits.
#[derive(Debug, Default)]
pub struct ConceptualModel {
    concepts: Vec<Concept>,
    /// Insertion-ordered names, kept in lockstep with `concepts`.
    names: Vec<String>,
    frontier: HashSet<String>,
    pages_visited: usize,
}

impl ConceptualModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a concept draft. A re-encountered name merges into the
    /// existing concept (extending detail, unioning sources) instead of
    /// creating a duplicate. Returns `true` when the name was new.
    pub fn record(&mut self, draft: ConceptDraft) -> bool {
        let concept = Concept {
            name: draft.name,
            summary: draft.summary,
            detail: draft.detail,
            source_urls: draft.source_url.into_iter().collect(),
        };

        if let Some(existing) = self
            .concepts
            .iter_mut()
            .find(|c| c.name == concept.name)
        {
            existing.merge(concept);
            false
        } else {
            self.names.push(concept.name.clone());
            self.concepts.push(concept);
            true
        }
    }

    /// Concepts in insertion order.
    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    /// Recorded names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Mark a normalized URL as visited. Returns `false` when it was
    /// already in the frontier (the page must not be visited again).
    pub fn mark_visited(&mut self, normalized_url: &str) -> bool {
        if self.frontier.insert(normalized_url.to_string()) {
            self.pages_visited += 1;
            true
        } else {
            false
        }
    }

    /// Whether a normalized URL is already in the frontier.
    pub fn in_frontier(&self, normalized_url: &str) -> bool {
        self.frontier.contains(normalized_url)
    }

    /// Pages visited (or attempted) so far.
    pub fn pages_visited(&self) -> usize {
        self.pages_visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, detail: &str, source: Option<&str>) -> ConceptDraft {
        ConceptDraft {
            name: name.into(),
            summary: format!("{name} summary"),
            detail: detail.into(),
            source_url: source.map(String::from),
        }
    }

    #[test]
    fn record_preserves_insertion_order() {
        let mut model = ConceptualModel::new();
        assert!(model.record(draft("Resource", "d1", None)));
        assert!(model.record(draft("Representation", "d2", None)));
        assert!(model.record(draft("Cache", "d3", None)));

        assert_eq!(model.names(), &["Resource", "Representation", "Cache"]);
    }

    #[test]
    fn rediscovered_name_merges_instead_of_duplicating() {
        let mut model = ConceptualModel::new();
        model.record(draft(
            "Resource",
            "Resources have URIs.",
            Some("https://docs.test/one"),
        ));
        let was_new = model.record(draft(
            "Resource",
            "Resources support representations.",
            Some("https://docs.test/two"),
        ));

        assert!(!was_new);
        assert_eq!(model.concepts().len(), 1);

        let concept = &model.concepts()[0];
        assert!(concept.detail.contains("have URIs"));
        assert!(concept.detail.contains("support representations"));
        assert_eq!(concept.source_urls.len(), 2);
    }

    #[test]
    fn frontier_blocks_revisits() {
        let mut model = ConceptualModel::new();
        assert!(model.mark_visited("https://docs.test/a"));
        assert!(!model.mark_visited("https://docs.test/a"));
        assert!(model.in_frontier("https://docs.test/a"));
        assert!(!model.in_frontier("https://docs.test/b"));
        // Re-marking does not inflate the visit count
        assert_eq!(model.pages_visited(), 1);
    }
}
