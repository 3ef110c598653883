//! Tool Provider: the web capability set the research loop drives.
//!
//! The [`ToolProvider`] trait covers search, navigation, page reading, and
//! scoped release of the underlying resources. [`HttpToolProvider`] is the
//! production implementation over plain HTTP; tests inject in-memory
//! providers instead.

mod extract;
mod http;

use conceptscribe_shared::{PageText, Result, SearchHit};
use url::Url;

pub use extract::{extract_page_text, normalize_url};
pub use http::HttpToolProvider;

/// A navigated page, ready for content extraction.
///
/// Navigation and reading are separate steps so a provider can fail them
/// independently: an unreachable URL is a `Navigation` error, a reachable
/// page with unusable content is a `Read` error.
#[derive(Debug, Clone)]
pub struct PageHandle {
    /// Final URL after redirects.
    pub url: Url,
    /// Raw response body.
    pub html: String,
    /// HTTP status code of the response.
    pub status: u16,
}

/// Capability set required by the Conceptual Model Builder.
///
/// A provider is acquired once per run and must release its underlying
/// resources via [`ToolProvider::close`] on every exit path.
pub trait ToolProvider {
    /// Perform a web search. Bounded; may return an empty list.
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<SearchHit>>>;

    /// Navigate to a URL, returning a handle to the loaded page.
    fn navigate(&self, url: &str) -> impl Future<Output = Result<PageHandle>>;

    /// Extract the rendered textual content of a navigated page.
    fn read_content(&self, page: &PageHandle) -> impl Future<Output = Result<PageText>>;

    /// Release the provider's underlying resources. Further calls fail.
    fn close(&self) -> impl Future<Output = Result<()>>;
}
