//! The `fetch` / `process` / `find` surface of the feed pipeline.
//!
//! A document moves through [`Stage`]s:
//! `Fetching → Autodiscovering → ParsingFeed → Normalizing → Done`, or
//! `Failed` from any of them. Parsing runs synchronously over the fetched
//! text; the only suspension points are the transport calls.

use super::discovery::find_feed_link;
use super::entry::Feed;
use super::extract::{extract_entries, ExtractOptions};
use super::fetcher::{FetchError, Transport};
use crate::markup::ParseError;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Errors that end a feed operation.
///
/// Field-level problems inside an item never surface here; they only leave
/// the corresponding entry field unset.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The transport failed; passed through unchanged.
    #[error("Transport error: {0}")]
    Transport(#[from] FetchError),
    #[error("Markup error: {0}")]
    Parse(#[from] ParseError),
    /// Neither an `rss` nor an `rdf:RDF` root element was found.
    #[error("Not a feed: no rss or rdf:RDF root element")]
    MissingRoot,
}

/// Pipeline progress, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Autodiscovering,
    ParsingFeed,
    Normalizing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetching => "fetching",
            Self::Autodiscovering => "autodiscovering",
            Self::ParsingFeed => "parsing-feed",
            Self::Normalizing => "normalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// A request for one feed.
///
/// Deserializes from `{"filter": {"url": ..., "disableThumbnailExtraction": ...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Query {
    pub filter: Filter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Filter {
    /// Feed URL, or the URL of an HTML page that links to the feed.
    pub url: Option<String>,
    pub disable_thumbnail_extraction: bool,
}

impl Query {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            filter: Filter {
                url: Some(url.into()),
                disable_thumbnail_extraction: false,
            },
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.filter.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Fetches feeds through a [`Transport`] and normalizes them.
#[derive(Debug, Clone)]
pub struct FeedSource<T> {
    transport: T,
    disable_thumbnails: bool,
}

impl<T: Transport> FeedSource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            disable_thumbnails: false,
        }
    }

    /// Disables in-body thumbnail extraction for every query, regardless of
    /// the query's own flag.
    pub fn disable_thumbnails(mut self, disable: bool) -> Self {
        self.disable_thumbnails = disable;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Retrieves the raw feed text for a query.
    ///
    /// The URL is fetched and scanned for an RSS autodiscovery link; when one
    /// is found, the linked document is fetched and returned instead. A query
    /// without a URL yields empty text.
    pub async fn fetch(&self, query: &Query) -> Result<String, FeedError> {
        let Some(url) = query.url() else {
            tracing::debug!("Query has no URL, nothing to fetch");
            return Ok(String::new());
        };
        let url = with_scheme(url.trim());

        log_stage(Stage::Fetching, &url);
        let body = self.transport.get_text(&url).await.inspect_err(|e| {
            tracing::warn!(url = %url, error = %e, stage = %Stage::Failed, "Fetch failed");
        })?;
        if body.is_empty() {
            return Ok(body);
        }

        log_stage(Stage::Autodiscovering, &url);
        match find_feed_link(&body, &url) {
            Some(feed_url) => {
                tracing::info!(page = %url, feed = %feed_url, "Following autodiscovered feed");
                log_stage(Stage::Fetching, &feed_url);
                let feed = self.transport.get_text(&feed_url).await.inspect_err(|e| {
                    tracing::warn!(url = %feed_url, error = %e, stage = %Stage::Failed, "Fetch failed");
                })?;
                Ok(feed)
            }
            None => Ok(body),
        }
    }

    /// Parses raw feed text into normalized entries.
    pub fn process(&self, data: &str, query: &Query) -> Result<Feed, FeedError> {
        if data.trim().is_empty() {
            return Ok(Feed::default());
        }

        let options = ExtractOptions {
            disable_thumbnail_extraction: self.disable_thumbnails
                || query.filter.disable_thumbnail_extraction,
        };

        log_stage(Stage::ParsingFeed, query.url().unwrap_or_default());
        let entries = extract_entries(data, options).inspect_err(|e| {
            tracing::warn!(error = %e, stage = %Stage::Failed, "Feed extraction failed");
        })?;
        log_stage(Stage::Normalizing, query.url().unwrap_or_default());

        tracing::debug!(entries = entries.len(), stage = %Stage::Done, "Feed processed");
        Ok(Feed { entries })
    }

    /// `fetch` followed by `process`.
    pub async fn find(&self, query: &Query) -> Result<Feed, FeedError> {
        let data = self.fetch(query).await?;
        self.process(&data, query)
    }
}

fn log_stage(stage: Stage, url: &str) {
    tracing::debug!(stage = %stage, url = %url, "Feed pipeline stage");
}

/// Prepends `http://` to URLs that lack an http(s) scheme.
fn with_scheme(url: &str) -> String {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_owned()
    } else {
        format!("http://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const RSS: &str = "<rss><channel><item><title>Hi</title>\
        <description><![CDATA[<img src=\"http://x/i.png\">]]></description></item></channel></rss>";

    /// Serves canned bodies and records requested URLs.
    #[derive(Default)]
    struct StubTransport {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl StubTransport {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_owned(), body.to_owned());
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_owned());
            self.pages
                .get(url)
                .cloned()
                .ok_or(FetchError::HttpStatus(404))
        }
    }

    #[tokio::test]
    async fn test_fetch_without_url_is_empty() {
        let source = FeedSource::new(StubTransport::default());
        assert_eq!(source.fetch(&Query::default()).await.unwrap(), "");
        assert!(source.find(&Query::default()).await.unwrap().is_empty());
        assert!(source.transport().requested().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_prepends_scheme() {
        let source = FeedSource::new(StubTransport::default().with("http://example.com/rss", RSS));
        let text = source.fetch(&Query::for_url("example.com/rss")).await.unwrap();
        assert_eq!(text, RSS);
        assert_eq!(source.transport().requested(), vec!["http://example.com/rss"]);
    }

    #[tokio::test]
    async fn test_fetch_follows_autodiscovery() {
        let page = r#"<html><head><link rel="alternate" type="application/rss+xml" href="/feed"></head></html>"#;
        let source = FeedSource::new(
            StubTransport::default()
                .with("http://site/page", page)
                .with("http://site/feed", RSS),
        );
        let feed = source.find(&Query::for_url("http://site/page")).await.unwrap();
        assert_eq!(feed.entries[0].name, "Hi");
        assert_eq!(
            source.transport().requested(),
            vec!["http://site/page", "http://site/feed"]
        );
    }

    #[tokio::test]
    async fn test_transport_error_passed_through() {
        let source = FeedSource::new(StubTransport::default());
        let err = source.find(&Query::for_url("http://gone/")).await.unwrap_err();
        assert!(matches!(err, FeedError::Transport(FetchError::HttpStatus(404))));
    }

    #[test]
    fn test_process_empty_data() {
        let source = FeedSource::new(StubTransport::default());
        assert_eq!(source.process("", &Query::default()).unwrap(), Feed::default());
    }

    #[test]
    fn test_process_missing_root() {
        let source = FeedSource::new(StubTransport::default());
        let err = source.process("<html></html>", &Query::default()).unwrap_err();
        assert!(matches!(err, FeedError::MissingRoot));
    }

    #[test]
    fn test_thumbnail_flag_from_query_or_source() {
        let source = FeedSource::new(StubTransport::default());
        let feed = source.process(RSS, &Query::default()).unwrap();
        assert!(feed.entries[0].image.is_some());

        let mut query = Query::default();
        query.filter.disable_thumbnail_extraction = true;
        let feed = source.process(RSS, &query).unwrap();
        assert!(feed.entries[0].image.is_none());

        let source = source.disable_thumbnails(true);
        let feed = source.process(RSS, &Query::default()).unwrap();
        assert!(feed.entries[0].image.is_none());
    }

    #[test]
    fn test_query_deserialization() {
        let query: Query = serde_json::from_str(
            r#"{"filter": {"url": "http://x/rss", "disableThumbnailExtraction": true}}"#,
        )
        .unwrap();
        assert_eq!(query.url(), Some("http://x/rss"));
        assert!(query.filter.disable_thumbnail_extraction);

        let query: Query = serde_json::from_str("{}").unwrap();
        assert_eq!(query, Query::default());
    }

    #[test]
    fn test_with_scheme() {
        assert_eq!(with_scheme("example.com"), "http://example.com");
        assert_eq!(with_scheme("HTTPS://example.com"), "HTTPS://example.com");
        assert_eq!(with_scheme("http://a"), "http://a");
        assert_eq!(with_scheme("ftp://a"), "http://ftp://a");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::ParsingFeed.to_string(), "parsing-feed");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
