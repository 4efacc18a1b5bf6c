// tests/providers_site.rs
use std::time::Duration;

use herbert_signal::ingest::providers::site::{
    fetch_and_parse, fetch_site_html, parse, HtmlInput, SiteProvider,
};
use herbert_signal::ingest::run_provider;
use herbert_signal::ingest::thesis::{AUTONOMY_SIGNAL, TSLA_MILESTONE};
use herbert_signal::{IngestError, QuotaTracker, ResilientClient, RetryPolicy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str =
    r#"<html><body><ul><li data-date="2026-01-28">Q4 results posted</li></ul></body></html>"#;

fn client(quota: std::sync::Arc<QuotaTracker>) -> ResilientClient {
    let policy = RetryPolicy {
        timeout: Duration::from_secs(2),
        max_retries: 2,
        backoff_base: 0.01,
    };
    ResilientClient::new(policy, quota).unwrap()
}

async fn mount_page(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/milestones"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn allowed_page_is_fetched_and_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 1).await;

    let quota = QuotaTracker::shared();
    let c = client(quota.clone());
    let tmp = tempfile::tempdir().unwrap();
    let url = format!("{}/milestones", server.uri());
    let events = fetch_and_parse(&c, &url, "li", tmp.path()).await.unwrap();

    assert_eq!(events.len(), 1);
    let ev = &events[0];
    assert_eq!(ev.timestamp.as_deref(), Some("2026-01-28T00:00:00Z"));
    assert_eq!(ev.thesis_tag, TSLA_MILESTONE);
    assert_eq!(ev.source, "herbertong:site");
    assert_eq!(ev.expected_move_bp, 40);
    assert!(ev.id.starts_with("herbert-site-"));
    assert!(tmp.path().join(format!("{}.json", ev.id)).is_file());

    assert_eq!(quota.count("robots.txt"), 1);
    assert_eq!(quota.count("site.page"), 1);
}

#[tokio::test]
async fn disallowed_page_is_never_requested() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;
    mount_page(&server, 0).await;

    let c = client(QuotaTracker::shared());
    let url = format!("{}/milestones", server.uri());
    let err = fetch_site_html(&c, &url).await.unwrap_err();

    match err {
        IngestError::PermissionDenied { url: u, robots_url } => {
            assert_eq!(u, url);
            assert_eq!(robots_url, format!("{}/robots.txt", server.uri()));
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_robots_allows_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 1).await;

    let quota = QuotaTracker::shared();
    let c = client(quota.clone());
    let html = fetch_site_html(&c, &format!("{}/milestones", server.uri()))
        .await
        .unwrap();
    assert!(html.contains("Q4 results posted"));
    // robots.txt is a single attempt even with retries configured
    assert_eq!(quota.count("robots.txt"), 1);
}

#[tokio::test]
async fn agent_specific_group_is_honoured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "User-agent: *\nAllow: /\n\nUser-agent: herbert-signal\nDisallow: /milestones\n",
        ))
        .mount(&server)
        .await;
    mount_page(&server, 0).await;

    let c = client(QuotaTracker::shared());
    let err = fetch_site_html(&c, &format!("{}/milestones", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::PermissionDenied { .. }));
}

#[tokio::test]
async fn page_failures_are_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/milestones"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let quota = QuotaTracker::shared();
    let c = client(quota.clone());
    let err = fetch_site_html(&c, &format!("{}/milestones", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_network());
    assert_eq!(quota.count("site.page"), 3);
}

#[tokio::test]
async fn offline_parse_of_inline_html() {
    let tmp = tempfile::tempdir().unwrap();
    let events = parse(&HtmlInput::Text(PAGE.to_string()), "li", tmp.path())
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].features.title.as_deref(), Some("Q4 results posted"));
    assert_eq!(events[0].features.keywords, vec!["milestone"]);
    assert!(events[0].features.summary.is_none());
}

#[tokio::test]
async fn sample_file_provider() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = SiteProvider::from_sample_file("tests/fixtures/herbert_site_milestones_sample.html");
    let events = run_provider(&provider, tmp.path()).await.unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].thesis_tag, TSLA_MILESTONE);
    assert_eq!(events[1].thesis_tag, AUTONOMY_SIGNAL);
    assert_eq!(
        events[1].features.title.as_deref(),
        Some("Unsupervised autonomy pilot expands")
    );
    assert!(events[2].timestamp.is_none());

    let by_path = parse(
        &HtmlInput::Path("tests/fixtures/herbert_site_milestones_sample.html".into()),
        "li",
        tmp.path(),
    )
    .await
    .unwrap();
    let ids: Vec<_> = by_path.iter().map(|e| e.id.clone()).collect();
    let first: Vec<_> = events.iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids, first);
}
