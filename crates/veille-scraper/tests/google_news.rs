//! Google News adapter against a wiremock server.

use futures::StreamExt;
use veille_scraper::{FetchError, GoogleNewsCollector, PlatformCollector};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn feed(count: usize) -> String {
    let items: String = (0..count)
        .map(|i| {
            format!(
                "<item><title>Article {i} sur le mil</title>\
                 <link>https://www.actuniger.com/mil-{i}?utm_source=gn</link>\
                 <pubDate>Tue, 14 Oct 2025 08:30:00 GMT</pubDate>\
                 <description>Récolte {i}</description></item>"
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{items}</channel></rss>"#)
}

fn collector(server: &MockServer) -> GoogleNewsCollector {
    GoogleNewsCollector::new(5, "veille-test", "fr", "NE")
        .expect("client builds")
        .with_base_url(server.uri())
}

#[tokio::test]
async fn search_sends_locale_and_caps_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/search"))
        .and(query_param("q", "mil Niger"))
        .and(query_param("hl", "fr"))
        .and(query_param("gl", "NE"))
        .and(query_param("ceid", "NE:fr"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(feed(20))
                .insert_header("content-type", "application/rss+xml"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stream = collector(&server)
        .search("mil Niger", 15)
        .await
        .expect("search succeeds");
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 15);
    let first = items[0].as_ref().expect("item ok");
    assert_eq!(first.title, "Article 0 sur le mil");
    assert!(first.published_at.is_some());
}

#[tokio::test]
async fn rate_limited_response_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/search"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let Err(err) = collector(&server).search("Niger", 10).await else {
        panic!("expected an error");
    };
    assert!(matches!(err, FetchError::Transient(_)), "got {err:?}");
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let Err(err) = collector(&server).search("Niger", 10).await else {
        panic!("expected an error");
    };
    assert!(matches!(err, FetchError::Transient(_)), "got {err:?}");
}

#[tokio::test]
async fn client_error_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/search"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let Err(err) = collector(&server).search("Niger", 10).await else {
        panic!("expected an error");
    };
    assert!(matches!(err, FetchError::Fatal(_)), "got {err:?}");
}

#[tokio::test]
async fn blank_query_is_fatal_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let Err(err) = collector(&server).search("   ", 10).await else {
        panic!("expected an error");
    };
    assert!(matches!(err, FetchError::Fatal(_)));
}
