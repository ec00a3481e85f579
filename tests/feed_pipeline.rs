//! End-to-end tests for the feed pipeline: HTTP fetch, autodiscovery,
//! extraction and fan-out.
//!
//! Each test starts its own mock server. Transports are built with private
//! hosts allowed, since the mock server listens on localhost.

use feedpost::config::Config;
use feedpost::feed::{
    find_many, find_posts, FeedError, FeedSource, FetchError, HttpTransport, Named, Query,
    WordPressQuery,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_source() -> FeedSource<HttpTransport> {
    let config = Config {
        timeout_secs: 5,
        max_retries: 1,
        retry_base_delay_ms: 1,
        allow_private_hosts: true,
        ..Config::default()
    };
    FeedSource::new(HttpTransport::new(&config).unwrap())
}

async fn serve(server: &MockServer, route: &str, body: &str, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", content_type),
        )
        .mount(server)
        .await;
}

const RSS2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example Blog</title>
    <link>https://example.com</link>
    <item>
      <title>Hi</title>
      <link>http://a/?utm_source=x&amp;id=1</link>
      <pubDate>Mon, 01 Jan 2018 00:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second &amp; last</title>
      <link>http://a/2</link>
      <dc:creator>Ada</dc:creator>
      <category>news</category>
      <description>&lt;p&gt;Hello &lt;img src="//img.example.com/x.png" alt="wave" width="40"&gt;&lt;/p&gt;</description>
    </item>
  </channel>
</rss>"#;

// ============================================================================
// Single feed
// ============================================================================

#[tokio::test]
async fn test_rss2_feed_end_to_end() {
    let server = MockServer::start().await;
    serve(&server, "/feed", RSS2, "application/rss+xml").await;

    let feed = test_source()
        .find(&Query::for_url(format!("{}/feed", server.uri())))
        .await
        .unwrap();

    assert_eq!(feed.len(), 2);
    let first = &feed.entries[0];
    assert_eq!(first.name, "Hi");
    assert_eq!(first.url.as_deref(), Some("http://a/?id=1"));
    assert_eq!(first.date_published.as_deref(), Some("2018-01-01T00:00:00Z"));
    assert!(first.keywords.is_empty());

    let second = &feed.entries[1];
    assert_eq!(second.name, "Second & last");
    assert_eq!(second.author, Some(Named::person("Ada")));
    assert_eq!(second.keywords, vec!["news"]);
    assert_eq!(second.description.as_deref(), Some("Hello wave"));

    assert_eq!(
        serde_json::to_value(&second.image).unwrap(),
        json!({
            "@type": "ImageObject",
            "itemType": "ImageObject",
            "contentURL": "http://img.example.com/x.png",
            "name": "wave",
            "width": 40
        })
    );
}

#[tokio::test]
async fn test_autodiscovery_refetches_linked_feed() {
    let server = MockServer::start().await;
    let page = r#"<!DOCTYPE html>
<html><head>
  <title>Site</title>
  <link rel="stylesheet" href="/style.css">
  <link rel="alternate" type="application/rss+xml" href="/feed">
</head><body><p>Welcome</p></body></html>"#;
    serve(&server, "/page", page, "text/html").await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS2))
        .expect(1)
        .mount(&server)
        .await;

    let feed = test_source()
        .find(&Query::for_url(format!("{}/page", server.uri())))
        .await
        .unwrap();
    assert_eq!(feed.entries[0].name, "Hi");
}

#[tokio::test]
async fn test_rdf_feed_uses_rdf_about() {
    let server = MockServer::start().await;
    let rdf = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="http://b/"><title>B</title></channel>
  <item rdf:about="http://b/">
    <title>About</title>
    <dc:date>2018-01-01T01:00:00+01:00</dc:date>
    <dc:subject>Meta</dc:subject>
  </item>
</rdf:RDF>"#;
    serve(&server, "/index.rdf", rdf, "application/rdf+xml").await;

    let feed = test_source()
        .find(&Query::for_url(format!("{}/index.rdf", server.uri())))
        .await
        .unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.entries[0].url.as_deref(), Some("http://b/"));
    assert_eq!(
        feed.entries[0].date_published.as_deref(),
        Some("2018-01-01T00:00:00Z")
    );
    assert_eq!(feed.entries[0].about, Some(Named::thing("Meta")));
}

#[tokio::test]
async fn test_html_without_feed_link_is_missing_root() {
    let server = MockServer::start().await;
    serve(&server, "/", "<html><body>Just a page</body></html>", "text/html").await;

    let err = test_source()
        .find(&Query::for_url(server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::MissingRoot));
}

#[tokio::test]
async fn test_http_error_surfaces_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let err = test_source()
        .find(&Query::for_url(format!("{}/feed", server.uri())))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FeedError::Transport(FetchError::HttpStatus(410))
    ));
}

#[tokio::test]
async fn test_malformed_items_degrade_gracefully() {
    let server = MockServer::start().await;
    let rss = "<rss><channel><item></item><item><pubDate>never</pubDate>\
        <title>Kept</title><media:thumbnail/></item></channel></rss>";
    serve(&server, "/feed", rss, "text/xml").await;

    let feed = test_source()
        .find(&Query::for_url(format!("{}/feed", server.uri())))
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&feed).unwrap(),
        json!({"entries": [
            {"@type": "BlogPosting", "itemType": "BlogPosting", "name": "", "keywords": []},
            {"@type": "BlogPosting", "itemType": "BlogPosting", "name": "Kept", "keywords": []}
        ]})
    );
}

// ============================================================================
// Fan-out
// ============================================================================

#[tokio::test]
async fn test_find_many_keeps_query_order() {
    let server = MockServer::start().await;
    for name in ["one", "two", "three"] {
        let body = format!("<rss><channel><item><title>{name}</title></item></channel></rss>");
        serve(&server, &format!("/{name}"), &body, "text/xml").await;
    }

    let queries: Vec<Query> = ["one", "two", "three"]
        .iter()
        .map(|name| Query::for_url(format!("{}/{name}", server.uri())))
        .collect();
    let feeds = find_many(&test_source(), &queries).await.unwrap();

    let names: Vec<_> = feeds.iter().map(|f| f.entries[0].name.as_str()).collect();
    assert_eq!(names, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_find_many_first_error_wins() {
    let server = MockServer::start().await;
    serve(&server, "/ok", RSS2, "text/xml").await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let queries = [
        Query::for_url(format!("{}/ok", server.uri())),
        Query::for_url(format!("{}/missing", server.uri())),
    ];
    let err = find_many(&test_source(), &queries).await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Transport(FetchError::HttpStatus(404))
    ));
}

// ============================================================================
// WordPress
// ============================================================================

#[tokio::test]
async fn test_wordpress_category_ids_and_quantity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("cat", "3"))
        .and(query_param("feed", "rss2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS2))
        .expect(1)
        .mount(&server)
        .await;

    let query = WordPressQuery {
        url: Some(server.uri()),
        categories: Some("3".to_owned()),
        quantity: Some(1),
        ..WordPressQuery::default()
    };
    let feed = find_posts(&test_source(), &query).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.entries[0].name, "Hi");
}

#[tokio::test]
async fn test_wordpress_single_post_rdf() {
    let server = MockServer::start().await;
    let rdf = r#"<rdf:RDF><item rdf:about="http://blog/hello"><title>Hello</title></item>
        <item rdf:about="http://blog/other"><title>Other</title></item></rdf:RDF>"#;
    Mock::given(method("GET"))
        .and(path("/2012/05/hello/"))
        .and(query_param("feed", "rdf"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rdf))
        .mount(&server)
        .await;

    let query = WordPressQuery {
        url: Some(format!("{}/", server.uri())),
        path: Some("/2012/05/hello/".to_owned()),
        ..WordPressQuery::default()
    };
    let feed = find_posts(&test_source(), &query).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.entries[0].url.as_deref(), Some("http://blog/hello"));
}
