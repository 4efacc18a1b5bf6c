// src/ingest/providers/site.rs
//! Milestone list scraper for the target website (robots.txt-aware).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::error::{IngestError, Result};
use crate::ingest::http::{ResilientClient, RetryPolicy};
use crate::ingest::providers::robots::{robots_url_for, RobotsRules};
use crate::ingest::types::{MilestoneNode, RawFeedItem, SignalEvent, SourceProvider};

pub const OP_ROBOTS: &str = "robots.txt";
pub const OP_PAGE: &str = "site.page";
pub const DEFAULT_SELECTOR: &str = "li";

/// HTML given inline or as a file to read.
#[derive(Debug, Clone)]
pub enum HtmlInput {
    Text(String),
    Path(PathBuf),
}

impl HtmlInput {
    pub async fn read(&self) -> Result<String> {
        match self {
            HtmlInput::Text(s) => Ok(s.clone()),
            HtmlInput::Path(p) => Ok(tokio::fs::read_to_string(p).await?),
        }
    }
}

/// Collapse whitespace runs (NBSP included) to one space and trim. Node text
/// is otherwise kept as the document has it.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract one [`MilestoneNode`] per node matching `selector`.
/// Empty documents and documents without matches yield an empty list.
pub fn parse_milestones(html: &str, selector: &str) -> Result<Vec<MilestoneNode>> {
    let sel = Selector::parse(selector)
        .map_err(|e| IngestError::malformed(format!("selector '{selector}'"), e))?;
    let doc = Html::parse_document(html);

    let nodes = doc
        .select(&sel)
        .map(|el| MilestoneNode {
            date: el.value().attr("data-date").map(str::to_string),
            text: collapse_ws(&el.text().collect::<String>()),
        })
        .collect();
    Ok(nodes)
}

/// Fetch robots.txt once (no retries). A missing or unreachable file allows
/// everything.
pub async fn fetch_robots(client: &ResilientClient, page: &Url) -> Result<(Url, RobotsRules)> {
    let robots_url = robots_url_for(page)?;
    let policy = RetryPolicy::no_retry(client.policy().timeout);

    let rules = match client.get_with(robots_url.as_str(), &[], OP_ROBOTS, &policy).await {
        Ok(rsp) => match rsp.text().await {
            Ok(body) => RobotsRules::parse(&body, client.user_agent()),
            Err(_) => RobotsRules::allow_all(),
        },
        Err(e) => {
            debug!(error = %e, "robots.txt unavailable, treating as allow-all");
            RobotsRules::allow_all()
        }
    };
    Ok((robots_url, rules))
}

/// robots.txt check, then page GET through the resilient client.
pub async fn fetch_site_html(client: &ResilientClient, url: &str) -> Result<String> {
    let page = Url::parse(url)?;
    let (robots_url, rules) = fetch_robots(client, &page).await?;
    if !rules.is_url_allowed(&page) {
        return Err(IngestError::PermissionDenied {
            url: url.to_string(),
            robots_url: robots_url.to_string(),
        });
    }
    let html = client.get(url, &[], OP_PAGE).await?.text().await?;
    info!(url, bytes = html.len(), "fetched milestone page");
    Ok(html)
}

/// Live path: fetch, parse, normalize and persist.
pub async fn fetch_and_parse(
    client: &ResilientClient,
    url: &str,
    selector: &str,
    out_dir: &Path,
) -> Result<Vec<SignalEvent>> {
    let html = fetch_site_html(client, url).await?;
    let items = parse_milestones(&html, selector)?
        .into_iter()
        .map(RawFeedItem::Milestone)
        .collect();
    crate::ingest::run(items, out_dir)
}

/// Offline path: parse HTML text or a sample file, normalize and persist.
pub async fn parse(input: &HtmlInput, selector: &str, out_dir: &Path) -> Result<Vec<SignalEvent>> {
    let html = input.read().await?;
    let items = parse_milestones(&html, selector)?
        .into_iter()
        .map(RawFeedItem::Milestone)
        .collect();
    crate::ingest::run(items, out_dir)
}

pub struct SiteProvider {
    mode: Mode,
    selector: String,
}

enum Mode {
    Live { client: ResilientClient, url: String },
    SampleFile(PathBuf),
}

impl SiteProvider {
    pub fn live(client: ResilientClient, url: impl Into<String>) -> Self {
        Self {
            mode: Mode::Live {
                client,
                url: url.into(),
            },
            selector: DEFAULT_SELECTOR.to_string(),
        }
    }

    pub fn from_sample_file(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mode::SampleFile(path.into()),
            selector: DEFAULT_SELECTOR.to_string(),
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }
}

#[async_trait]
impl SourceProvider for SiteProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawFeedItem>> {
        let html = match &self.mode {
            Mode::Live { client, url } => fetch_site_html(client, url).await?,
            Mode::SampleFile(p) => HtmlInput::Path(p.clone()).read().await?,
        };

        let t0 = std::time::Instant::now();
        let out: Vec<RawFeedItem> = parse_milestones(&html, &self.selector)?
            .into_iter()
            .map(RawFeedItem::Milestone)
            .collect();
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "site"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str =
        r#"<html><body><ul><li data-date="2026-01-28">Q4 results posted</li></ul></body></html>"#;

    #[test]
    fn single_node_is_extracted() {
        let nodes = parse_milestones(SAMPLE_HTML, "li").unwrap();
        assert_eq!(
            nodes,
            vec![MilestoneNode {
                date: Some("2026-01-28".into()),
                text: "Q4 results posted".into(),
            }]
        );
    }

    #[test]
    fn nested_markup_is_flattened() {
        let html = "<ul><li data-date=\"2025-10-01\">  <b>Unsupervised</b>\n  autonomy <i>pilot</i> </li><li>No date</li></ul>";
        let nodes = parse_milestones(html, "li").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text, "Unsupervised autonomy pilot");
        assert_eq!(nodes[1].date, None);
    }

    #[test]
    fn node_text_is_kept_verbatim_apart_from_whitespace() {
        let html = "<ul>\
            <li>Cybertruck deliveries begin.</li>\
            <li>0-60 &lt; 2s &gt; rivals</li>\
            <li>Robotaxi in Austin?!</li>\
            <li>Model&nbsp;&nbsp;Y <b>L</b>aunch</li>\
            </ul>";
        let texts: Vec<_> = parse_milestones(html, "li")
            .unwrap()
            .into_iter()
            .map(|n| n.text)
            .collect();
        assert_eq!(
            texts,
            vec![
                "Cybertruck deliveries begin.",
                "0-60 < 2s > rivals",
                "Robotaxi in Austin?!",
                "Model Y Launch",
            ]
        );
    }

    #[test]
    fn long_text_is_not_truncated() {
        let long = "a".repeat(2_000);
        let nodes = parse_milestones(&format!("<ul><li>{long}</li></ul>"), "li").unwrap();
        assert_eq!(nodes[0].text.len(), 2_000);
    }

    #[test]
    fn empty_documents_yield_nothing() {
        assert!(parse_milestones("", "li").unwrap().is_empty());
        assert!(parse_milestones("<p>no list here</p>", "li").unwrap().is_empty());
    }

    #[test]
    fn custom_selector_is_respected() {
        let html = r#"<ul><li>nav</li></ul><ol class="ms"><li data-date="2026-02-01">Model Y refresh</li></ol>"#;
        let nodes = parse_milestones(html, "ol.ms > li").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, "Model Y refresh");
    }

    #[test]
    fn bad_selector_is_malformed() {
        let err = parse_milestones(SAMPLE_HTML, "li[").unwrap_err();
        assert!(matches!(err, IngestError::Malformed { .. }));
    }
}
