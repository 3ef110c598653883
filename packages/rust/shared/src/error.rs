//! Error types for ConceptScribe.
//!
//! Library crates use [`ScribeError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ConceptScribe operations.
#[derive(Debug, thiserror::Error)]
pub enum ScribeError {
    /// The external crawling capability could not be acquired.
    /// Fatal: aborts the run before any artifacts are written.
    #[error("tool provider unavailable: {0}")]
    ToolUnavailable(String),

    /// A page could not be reached. Recovered locally during the crawl
    /// (the page is skipped); never aborts the run.
    #[error("navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    /// A page was reached but its content could not be read.
    /// Recovered locally, like [`ScribeError::Navigation`].
    #[error("read failed for {url}: {message}")]
    Read { url: String, message: String },

    /// The specification reference document could not be retrieved.
    /// Non-fatal: the run proceeds with a best-effort output structure.
    #[error("specification reference unavailable: {0}")]
    ReferenceUnavailable(String),

    /// The step budget was exhausted before emission completed.
    /// Fatal; partial artifacts may exist on disk.
    #[error("reasoning exhausted after {steps} steps without completing emission")]
    ReasoningExhausted { steps: usize },

    /// Reasoning-engine API error (HTTP failure, malformed response).
    #[error("inference error: {0}")]
    Inference(String),

    /// Session/history store error.
    #[error("session error: {0}")]
    Session(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// llms.txt or response parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The run was cancelled between suspension points.
    /// Already-written artifacts remain on disk.
    #[error("run cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScribeError>;

impl ScribeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a navigation error for a URL.
    pub fn navigation(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a read error for a URL.
    pub fn read(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Read {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for per-page errors that the crawl loop recovers from by
    /// skipping the page. These must never escape the Crawl phase.
    pub fn is_page_local(&self) -> bool {
        matches!(self, Self::Navigation { .. } | Self::Read { .. })
    }

    /// True for errors where retrying the current phase may succeed
    /// (rate limits, dropped connections to the reasoning engine or store).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Inference(_) | Self::Session(_))
    }
}
