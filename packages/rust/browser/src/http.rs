//! HTTP implementation of the [`ToolProvider`] capability set.
//!
//! Search goes through the DuckDuckGo HTML endpoint; navigation is a plain
//! GET with redirect and timeout limits; SSRF protection blocks private and
//! loopback targets. The provider counts opened pages as its own session
//! limit, a second line of defense behind the Builder's crawl bound.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use conceptscribe_shared::{PageText, Result, RunLimits, ScribeError, SearchHit};

use crate::{PageHandle, ToolProvider, extract};

/// User-Agent string for all requests.
const USER_AGENT: &str = concat!("ConceptScribe/", env!("CARGO_PKG_VERSION"));

/// Default search endpoint (HTML results page, no API key required).
const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Tool Provider over plain HTTP.
pub struct HttpToolProvider {
    client: Client,
    limits: RunLimits,
    search_endpoint: String,
    /// Pages opened in this session; enforces the provider's own limit.
    pages_opened: AtomicUsize,
    closed: AtomicBool,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl HttpToolProvider {
    /// Acquire the provider for one run.
    ///
    /// Fails with `ToolUnavailable` when the HTTP client cannot be built —
    /// the run aborts before any artifacts are written.
    pub fn acquire(limits: RunLimits) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(limits.timeout_secs))
            .build()
            .map_err(|e| ScribeError::ToolUnavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            limits,
            search_endpoint: SEARCH_ENDPOINT.to_string(),
            pages_opened: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            allow_localhost: false,
        })
    }

    /// Allow crawling localhost/private IPs (for integration tests).
    #[cfg(test)]
    pub(crate) fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Override the search endpoint (for integration tests).
    #[cfg(test)]
    pub(crate) fn with_search_endpoint(mut self, endpoint: &str) -> Self {
        self.search_endpoint = endpoint.to_string();
        self
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ScribeError::ToolUnavailable(
                "provider session already closed".into(),
            ));
        }
        Ok(())
    }
}

impl ToolProvider for HttpToolProvider {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.check_open()?;

        let response = self
            .client
            .get(self.search_endpoint.as_str())
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ScribeError::navigation(&self.search_endpoint, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScribeError::navigation(
                &self.search_endpoint,
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScribeError::read(&self.search_endpoint, e.to_string()))?;

        let hits = parse_search_results(&body, self.limits.max_search_results);
        info!(query, hits = hits.len(), "search complete");
        Ok(hits)
    }

    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<PageHandle> {
        self.check_open()?;

        let parsed =
            Url::parse(url).map_err(|e| ScribeError::navigation(url, format!("invalid URL: {e}")))?;

        if !self.allow_localhost && is_ssrf_target(&parsed) {
            warn!(%url, "SSRF protection: blocked");
            return Err(ScribeError::navigation(url, "blocked target"));
        }

        let opened = self.pages_opened.fetch_add(1, Ordering::SeqCst);
        if opened >= self.limits.max_pages * 2 {
            return Err(ScribeError::navigation(url, "session page limit reached"));
        }

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| ScribeError::navigation(url, e.to_string()))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(ScribeError::navigation(url, format!("HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ScribeError::read(url, e.to_string()))?;

        debug!(%final_url, status = status.as_u16(), bytes = html.len(), "page loaded");

        Ok(PageHandle {
            url: final_url,
            html,
            status: status.as_u16(),
        })
    }

    async fn read_content(&self, page: &PageHandle) -> Result<PageText> {
        self.check_open()?;
        extract::extract_page_text(&page.html, &page.url)
    }

    async fn close(&self) -> Result<()> {
        let was_closed = self.closed.swap(true, Ordering::SeqCst);
        if !was_closed {
            info!(
                pages_opened = self.pages_opened.load(Ordering::SeqCst),
                "provider session closed"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Search result parsing
// ---------------------------------------------------------------------------

/// Parse the DuckDuckGo HTML results page into search hits.
fn parse_search_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);
    let link_sel = Selector::parse("a.result__a").expect("result link selector");
    let snippet_sel = Selector::parse(".result__snippet").expect("snippet selector");

    let snippets: Vec<String> = doc
        .select(&snippet_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();

    let mut hits = Vec::new();
    for (i, el) in doc.select(&link_sel).enumerate() {
        if hits.len() >= max_results {
            break;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_result_url(href) else {
            continue;
        };
        let title = el.text().collect::<String>().trim().to_string();
        hits.push(SearchHit {
            url,
            title,
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        });
    }
    hits
}

/// Unwrap the engine's redirect link (`/l/?uddg=<encoded>`) to the target URL.
fn resolve_result_url(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute)
        .or_else(|_| Url::parse("https://duckduckgo.com").and_then(|b| b.join(href)))
        .ok()?;

    if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }

    match parsed.scheme() {
        "http" | "https" => Some(parsed.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        if host == "localhost"
            || host == "127.0.0.1"
            || host == "[::1]"
            || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_limits() -> RunLimits {
        RunLimits {
            max_pages: 10,
            max_steps: 30,
            max_search_results: 5,
            timeout_secs: 5,
        }
    }

    #[test]
    fn ssrf_blocks_private_targets() {
        for bad in [
            "file:///etc/passwd",
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://localhost:3000/api",
            "http://service.internal/health",
        ] {
            assert!(is_ssrf_target(&Url::parse(bad).unwrap()), "{bad}");
        }
    }

    #[test]
    fn ssrf_allows_public_targets() {
        let url = Url::parse("https://docs.example.com/page").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[test]
    fn resolve_result_url_unwraps_redirect() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fdocs.example.com%2Frest&rut=abc";
        assert_eq!(
            resolve_result_url(href).as_deref(),
            Some("https://docs.example.com/rest")
        );
    }

    #[test]
    fn resolve_result_url_passes_direct_links() {
        assert_eq!(
            resolve_result_url("https://docs.example.com/rest").as_deref(),
            Some("https://docs.example.com/rest")
        );
        assert!(resolve_result_url("javascript:void(0)").is_none());
    }

    #[test]
    fn parse_search_results_caps_at_max() {
        let mut html = String::from("<html><body>");
        for i in 0..8 {
            html.push_str(&format!(
                r#"<a class="result__a" href="https://docs.test/{i}">Result {i}</a>
                   <div class="result__snippet">Snippet {i}</div>"#
            ));
        }
        html.push_str("</body></html>");

        let hits = parse_search_results(&html, 5);
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].url, "https://docs.test/0");
        assert_eq!(hits[0].title, "Result 0");
        assert_eq!(hits[0].snippet, "Snippet 0");
    }

    #[tokio::test]
    async fn navigate_and_read_against_mock_server() {
        let server = wiremock::MockServer::start().await;

        let page = r#"<html><body><main>
            <h1>Resources</h1>
            <p>A resource is an addressable entity.</p>
            <a href="/representations">Representations</a>
        </main></body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/rest"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let provider = HttpToolProvider::acquire(test_limits())
            .unwrap()
            .allow_localhost();

        let handle = provider
            .navigate(&format!("{}/rest", server.uri()))
            .await
            .unwrap();
        assert_eq!(handle.status, 200);

        let text = provider.read_content(&handle).await.unwrap();
        assert_eq!(text.title, Some("Resources".into()));
        assert!(text.markdown.contains("addressable entity"));
        assert_eq!(text.links.len(), 1);

        provider.close().await.unwrap();
    }

    #[tokio::test]
    async fn navigate_error_is_page_local() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = HttpToolProvider::acquire(test_limits())
            .unwrap()
            .allow_localhost();

        let err = provider
            .navigate(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(err.is_page_local());
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn search_parses_results_from_endpoint() {
        let server = wiremock::MockServer::start().await;

        let results = r#"<html><body>
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdocs.test%2Frest">REST docs</a>
            <div class="result__snippet">Official REST documentation</div>
        </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(results))
            .mount(&server)
            .await;

        let provider = HttpToolProvider::acquire(test_limits())
            .unwrap()
            .allow_localhost()
            .with_search_endpoint(&server.uri());

        let hits = provider.search("REST").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://docs.test/rest");
        assert_eq!(hits[0].title, "REST docs");
    }

    #[tokio::test]
    async fn closed_provider_refuses_calls() {
        let provider = HttpToolProvider::acquire(test_limits()).unwrap();
        provider.close().await.unwrap();

        let err = provider.search("anything").await.unwrap_err();
        assert!(matches!(err, ScribeError::ToolUnavailable(_)));
        // close is idempotent
        provider.close().await.unwrap();
    }
}
