//! Core domain types for ConceptScribe research runs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScribeError};

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// The root subject under research. Created once per run from user input
/// and immutable for the run's duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    /// Free-text keyword, guaranteed non-empty.
    pub keyword: String,
    /// Output folder for the emitted artifact set. The caller guarantees
    /// it exists and is writable before the run starts.
    pub output_folder: PathBuf,
}

impl Topic {
    /// Build a topic, rejecting empty or whitespace-only keywords.
    pub fn new(keyword: impl Into<String>, output_folder: impl Into<PathBuf>) -> Result<Self> {
        let keyword = keyword.into();
        if keyword.trim().is_empty() {
            return Err(ScribeError::config("keyword must be non-empty"));
        }
        Ok(Self {
            keyword,
            output_folder: output_folder.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Concept
// ---------------------------------------------------------------------------

/// A named, bounded idea discovered while crawling documentation.
///
/// Names are unique within a run; re-encountering a name merges into the
/// existing concept instead of creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    /// Unique (per run) concept name as it will appear in the index.
    pub name: String,
    /// One-line description for the index bullet.
    pub summary: String,
    /// Longer conceptual-model text for the detail file.
    pub detail: String,
    /// Ordered provenance links, deduplicated, may be empty.
    pub source_urls: Vec<String>,
}

impl Concept {
    /// Extend this concept with material discovered on another page.
    ///
    /// The detail becomes a union of both texts (never a silent replace),
    /// the summary keeps the first non-empty value, and source URLs are
    /// appended preserving order without duplicates.
    pub fn merge(&mut self, other: Concept) {
        if self.summary.is_empty() && !other.summary.is_empty() {
            self.summary = other.summary;
        }
        if !other.detail.is_empty() && !self.detail.contains(other.detail.as_str()) {
            if self.detail.is_empty() {
                self.detail = other.detail;
            } else {
                self.detail.push_str("\n\n");
                self.detail.push_str(&other.detail);
            }
        }
        for url in other.source_urls {
            if !self.source_urls.contains(&url) {
                self.source_urls.push(url);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tool observations
// ---------------------------------------------------------------------------

/// One result row from a web search invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Rendered textual content of a fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// Final URL after redirects.
    pub url: String,
    /// Page title, if one was found.
    pub title: Option<String>,
    /// Main content converted to Markdown.
    pub markdown: String,
    /// Same-origin outbound links found on the page.
    pub links: Vec<String>,
}

// ---------------------------------------------------------------------------
// Run phases & result
// ---------------------------------------------------------------------------

/// Phases of the research loop state machine.
///
/// `Crawl` and `Synthesize` alternate until the policy judges coverage
/// sufficient or the page-visit bound is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Init,
    ReferenceCheck,
    Discover,
    Crawl,
    Synthesize,
    Emit,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ReferenceCheck => "reference-check",
            Self::Discover => "discover",
            Self::Crawl => "crawl",
            Self::Synthesize => "synthesize",
            Self::Emit => "emit",
            Self::Done => "done",
        }
    }
}

/// Summary of a completed run. There is no partial-success value: from the
/// caller's perspective a run either produces this or fails with an error.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Session identifier the transcript was recorded under.
    pub session_id: String,
    /// Folder the artifact set was written to.
    pub output_folder: PathBuf,
    /// Path of the emitted index file.
    pub index_path: PathBuf,
    /// Number of concepts emitted (index bullets == detail files).
    pub concept_count: usize,
    /// Pages visited during the crawl phase.
    pub pages_visited: usize,
    /// Policy decisions consumed.
    pub steps_taken: usize,
    /// True when the specification reference could not be retrieved and
    /// the run proceeded with a best-effort structure.
    pub reference_degraded: bool,
    /// Turns appended to the session store during this run.
    pub transcript_turns: usize,
    /// Total elapsed time.
    pub elapsed: Duration,
}
