//! Issue discovery on the newsletter's index page.
//!
//! The index lists archive links newest first, `links_per_issue` of them per
//! monthly issue. The requested issue is picked by its distance in months
//! from the current month.

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use issuepress_shared::{IssuePressError, IssueReference, NewsletterConfig, Result, RunContext};

/// Maximum number of redirects to follow when fetching the index.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for fetching the index.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for index requests.
const USER_AGENT: &str = concat!("IssuePress/", env!("CARGO_PKG_VERSION"));

/// HTTP settings for the index request.
#[derive(Debug, Clone)]
pub struct LocatorOptions {
    pub timeout_secs: u64,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Resolve the URL of the issue for `ctx.month`.
#[instrument(skip_all, fields(index = %config.index_url, month = ctx.month))]
pub async fn locate_issue(
    ctx: &RunContext,
    config: &NewsletterConfig,
    opts: &LocatorOptions,
) -> Result<IssueReference> {
    let index_url = Url::parse(&config.index_url)
        .map_err(|e| IssuePressError::config(format!("invalid index_url: {e}")))?;

    let offset = issue_offset(ctx.current_month, ctx.month, config.links_per_issue)?;

    let client = build_client(opts)?;
    let body = fetch_index(&client, &index_url).await?;

    let links = extract_issue_links(&body, &index_url, &config.archive_prefix);
    debug!(count = links.len(), links = ?links, "issue links found");

    let url = select_issue_link(&links, offset)?.to_string();
    info!(%url, offset, "issue located");

    Ok(IssueReference {
        url,
        title: ctx.title.clone(),
        date: ctx.date,
    })
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Position of the requested issue's link in the newest-first link list.
pub fn issue_offset(current_month: u32, month: u32, links_per_issue: usize) -> Result<usize> {
    if month > current_month {
        return Err(IssuePressError::issue_not_found(format!(
            "month {month} is after the current month {current_month}"
        )));
    }
    Ok(links_per_issue * (current_month - month) as usize)
}

/// The link at `offset`, or `IssueNotFound` when there is none.
pub fn select_issue_link(links: &[String], offset: usize) -> Result<&str> {
    if links.is_empty() {
        return Err(IssuePressError::issue_not_found(
            "no issue links on the index page",
        ));
    }
    links.get(offset).map(String::as_str).ok_or_else(|| {
        IssuePressError::issue_not_found(format!(
            "offset {offset} out of range ({} issue links)",
            links.len()
        ))
    })
}

/// Anchors whose resolved href contains `archive_prefix`, in document order.
pub fn extract_issue_links(html: &str, base_url: &Url, archive_prefix: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Ok(link_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    doc.select(&link_sel)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .map(|url| url.to_string())
        .filter(|url| url.contains(archive_prefix))
        .collect()
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

fn build_client(opts: &LocatorOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(std::time::Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| IssuePressError::Network(format!("failed to build HTTP client: {e}")))
}

async fn fetch_index(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| IssuePressError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(IssuePressError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| IssuePressError::Network(format!("{url}: failed to read body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const INDEX_PAGE: &str = r#"<html><body>
<nav><a href="/">Home</a><a href="/blog/">Blog</a></nav>
<ul>
  <li><a href="/crypto-gram/archives/2026/1015.html">October 2026</a>
      <a href="/crypto-gram/archives/2026/1015.html#cg1">Web</a></li>
  <li><a href="/crypto-gram/archives/2026/0915.html">September 2026</a>
      <a href="/crypto-gram/archives/2026/0915.html#cg1">Web</a></li>
  <li><a href="/crypto-gram/archives/2026/0815.html">August 2026</a>
      <a href="/crypto-gram/archives/2026/0815.html#cg1">Web</a></li>
</ul>
<a href="mailto:someone@example.com">mail</a>
</body></html>"#;

    fn context(month: u32) -> RunContext {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        RunContext::new(today, month, "Crypto-Gram", "/tmp/ip-scratch").unwrap()
    }

    fn config_for(server: &wiremock::MockServer) -> NewsletterConfig {
        NewsletterConfig {
            index_url: format!("{}/crypto-gram/", server.uri()),
            archive_prefix: format!("{}/crypto-gram/archives/", server.uri()),
            ..NewsletterConfig::default()
        }
    }

    async fn serve_index(body: &str) -> wiremock::MockServer {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/crypto-gram/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn offset_is_two_links_per_month_back() {
        for m in 1..=12 {
            assert_eq!(issue_offset(12, m, 2).unwrap(), 2 * (12 - m) as usize);
        }
        assert_eq!(issue_offset(5, 5, 2).unwrap(), 0);
    }

    #[test]
    fn future_month_is_not_found() {
        for m in 7..=12 {
            assert!(matches!(
                issue_offset(6, m, 2),
                Err(IssuePressError::IssueNotFound { .. })
            ));
        }
    }

    #[test]
    fn extracts_only_archive_links_in_order() {
        let base = Url::parse("https://www.schneier.com/crypto-gram/").unwrap();
        let links = extract_issue_links(
            INDEX_PAGE,
            &base,
            "https://www.schneier.com/crypto-gram/archives/",
        );
        assert_eq!(links.len(), 6);
        assert_eq!(
            links[0],
            "https://www.schneier.com/crypto-gram/archives/2026/1015.html"
        );
        assert_eq!(
            links[2],
            "https://www.schneier.com/crypto-gram/archives/2026/0915.html"
        );
    }

    #[test]
    fn select_rejects_empty_and_out_of_range() {
        let links = vec!["a".to_string(), "b".to_string()];
        assert_eq!(select_issue_link(&links, 1).unwrap(), "b");
        assert!(matches!(
            select_issue_link(&links, 2),
            Err(IssuePressError::IssueNotFound { .. })
        ));
        assert!(matches!(
            select_issue_link(&[], 0),
            Err(IssuePressError::IssueNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn locates_current_issue() {
        let server = serve_index(INDEX_PAGE).await;
        let issue = locate_issue(&context(10), &config_for(&server), &LocatorOptions::default())
            .await
            .unwrap();

        assert_eq!(
            issue.url,
            format!("{}/crypto-gram/archives/2026/1015.html", server.uri())
        );
        assert_eq!(issue.title, "Crypto-Gram - October 2026 issue");
        assert_eq!(issue.date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[tokio::test]
    async fn locates_earlier_issue_by_offset() {
        let server = serve_index(INDEX_PAGE).await;
        let issue = locate_issue(&context(8), &config_for(&server), &LocatorOptions::default())
            .await
            .unwrap();
        assert!(issue.url.ends_with("/crypto-gram/archives/2026/0815.html"));
        assert_eq!(issue.title, "Crypto-Gram - August 2026 issue");
    }

    #[tokio::test]
    async fn too_old_issue_is_not_found() {
        let server = serve_index(INDEX_PAGE).await;
        let err = locate_issue(&context(5), &config_for(&server), &LocatorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IssuePressError::IssueNotFound { .. }));
    }

    #[tokio::test]
    async fn page_without_links_is_not_found() {
        let server = serve_index("<html><body><p>maintenance</p></body></html>").await;
        let err = locate_issue(&context(10), &config_for(&server), &LocatorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IssuePressError::IssueNotFound { .. }));
    }

    #[tokio::test]
    async fn http_error_is_network_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = locate_issue(&context(10), &config_for(&server), &LocatorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IssuePressError::Network(_)));
    }

    #[tokio::test]
    async fn future_month_fails_before_fetching() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(INDEX_PAGE))
            .expect(0)
            .mount(&server)
            .await;

        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let ctx = RunContext::new(today, 11, "Crypto-Gram", "/tmp/ip-scratch").unwrap();
        let err = locate_issue(&ctx, &config_for(&server), &LocatorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IssuePressError::IssueNotFound { .. }));
    }
}
