//! Live-site page source over HTTP.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use rosetta_shared::{PageKind, Result, RosettaError, SourceConfig};
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::PageSource;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("rosetta-extract/", env!("CARGO_PKG_VERSION"));

/// Fetches pages from a MediaWiki site.
///
/// Task pages are requested as raw wikitext (`/wiki/<name>?action=raw`);
/// category pages as rendered HTML (`/wiki/Category:<name>`), since the member
/// list only exists in the rendered page.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    base: Url,
    max_response_bytes: u64,
}

impl HttpPageSource {
    /// Build a source from the `[source]` config section.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            RosettaError::config(format!("invalid base_url '{}': {e}", config.base_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(RosettaError::config(format!(
                "base_url '{}' cannot be used as a base",
                config.base_url
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RosettaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// URL a page of `kind` named `name` is fetched from.
    pub fn page_url(&self, kind: PageKind, name: &str) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                RosettaError::config(format!("base_url '{}' cannot be a base", self.base))
            })?;
            segments.pop_if_empty().push("wiki");
            match kind {
                // Subpages (`Sorting algorithms/Bubble sort`) keep their slashes.
                PageKind::Task => {
                    segments.extend(name.split('/'));
                }
                PageKind::Category => {
                    segments.push(&format!("Category:{name}"));
                }
            }
        }
        if kind == PageKind::Task {
            url.set_query(Some("action=raw"));
        }
        Ok(url)
    }

    async fn get_text(&self, kind: PageKind, name: &str, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RosettaError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RosettaError::not_found(kind, name));
        }
        if !status.is_success() {
            return Err(RosettaError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_response_bytes {
                return Err(RosettaError::validation(format!(
                    "{url}: response too large ({len} bytes, max {})",
                    self.max_response_bytes
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| RosettaError::Network(format!("{url}: failed to read body: {e}")))?;

        if body.len() as u64 > self.max_response_bytes {
            return Err(RosettaError::validation(format!(
                "{url}: response too large ({} bytes, max {})",
                body.len(),
                self.max_response_bytes
            )));
        }
        Ok(body)
    }
}

impl PageSource for HttpPageSource {
    #[instrument(skip(self, kind), fields(%kind))]
    async fn fetch(&self, kind: PageKind, name: &str) -> Result<String> {
        let url = self.page_url(kind, name)?;
        info!(%url, "fetching page");

        let body = self.get_text(kind, name, &url).await?;
        let body = match kind {
            PageKind::Task => edit_page_text(&body).unwrap_or(body),
            PageKind::Category => body,
        };

        debug!(bytes = body.len(), "page fetched");
        Ok(body)
    }
}

/// Wiki text from an HTML edit page (`action=edit`), if `body` is one.
///
/// Some mirrors serve the edit form instead of raw text; the markup is the
/// content of its first `<textarea>`, entity-decoded.
fn edit_page_text(body: &str) -> Option<String> {
    let head = body.trim_start();
    if !head.starts_with('<') || !body.contains("<textarea") {
        return None;
    }
    let doc = Html::parse_document(body);
    let selector = Selector::parse("textarea").ok()?;
    let area = doc.select(&selector).next()?;
    Some(area.text().collect())
}
