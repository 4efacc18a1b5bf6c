// src/ingest/providers/youtube.rs
//! Channel video adapter: paginated `search.list` followed by batched
//! `videos.list` enrichment (tags, duration, view count).

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::ingest::config::{YoutubeCredentials, YoutubeSettings};
use crate::ingest::http::ResilientClient;
use crate::ingest::types::{parse_view_count, RawFeedItem, SourceProvider, VideoFeed, VideoItem};

/// Provider ceiling for `maxResults` and for ids per `videos.list` call.
pub const PAGE_SIZE_MAX: usize = 50;

pub const OP_SEARCH: &str = "search.list";
pub const OP_VIDEOS: &str = "videos.list";

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: SearchId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    published_at: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VideosPage {
    #[serde(default)]
    items: Vec<VideoDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetail {
    id: Option<String>,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    content_details: ContentDetails,
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<Value>,
}

/// Live adapter against the video platform API.
pub struct YoutubeAdapter<'a> {
    client: &'a ResilientClient,
    creds: YoutubeCredentials,
    search_url: String,
    videos_url: String,
}

impl<'a> YoutubeAdapter<'a> {
    pub fn new(
        client: &'a ResilientClient,
        creds: YoutubeCredentials,
        search_url: impl Into<String>,
        videos_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            creds,
            search_url: search_url.into(),
            videos_url: videos_url.into(),
        }
    }

    /// Validates credentials before any HTTP call.
    pub fn from_settings(client: &'a ResilientClient, settings: &YoutubeSettings) -> Result<Self> {
        let creds = settings.credentials()?;
        Ok(Self::new(
            client,
            creds,
            settings.search_url.clone(),
            settings.videos_url.clone(),
        ))
    }

    /// Collect up to `max_results` recent videos, optionally enriched.
    pub async fn fetch(&self, max_results: usize, enrich: bool) -> Result<VideoFeed> {
        let mut items = self.search(max_results).await?;
        if enrich && !items.is_empty() {
            self.enrich(&mut items).await?;
        }
        Ok(VideoFeed { items })
    }

    async fn search(&self, max_results: usize) -> Result<Vec<VideoItem>> {
        let mut items: Vec<VideoItem> = Vec::new();
        let mut page_token: Option<String> = None;

        while items.len() < max_results {
            let page_size = (max_results - items.len()).min(PAGE_SIZE_MAX).to_string();
            let body = {
                let mut params: Vec<(&str, &str)> = vec![
                    ("part", "snippet"),
                    ("channelId", self.creds.channel_id.as_str()),
                    ("order", "date"),
                    ("maxResults", page_size.as_str()),
                    ("type", "video"),
                    ("key", self.creds.api_key.as_str()),
                ];
                if let Some(tok) = page_token.as_deref() {
                    params.push(("pageToken", tok));
                }
                self.client
                    .get(&self.search_url, &params, OP_SEARCH)
                    .await?
                    .text()
                    .await?
            };
            let page: SearchPage = serde_json::from_str(&body)
                .map_err(|e| IngestError::malformed("search.list page", e))?;

            debug!(
                items = page.items.len(),
                has_next = page.next_page_token.is_some(),
                "search.list page"
            );

            let before = items.len();
            for it in page.items {
                if items.len() >= max_results {
                    break;
                }
                items.push(search_item_to_video(it));
            }
            // An empty page with a continuation token would loop forever.
            if items.len() == before {
                break;
            }

            match page.next_page_token {
                Some(tok) if !tok.is_empty() => page_token = Some(tok),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn enrich(&self, items: &mut [VideoItem]) -> Result<()> {
        let ids: Vec<&str> = items
            .iter()
            .map(|it| it.id.as_str())
            .filter(|id| !id.is_empty())
            .collect();

        let mut details: HashMap<String, VideoDetail> = HashMap::new();
        for chunk in ids.chunks(PAGE_SIZE_MAX) {
            let joined = chunk.join(",");
            let params = [
                ("part", "snippet,contentDetails,statistics"),
                ("id", joined.as_str()),
                ("key", self.creds.api_key.as_str()),
            ];
            let body = self
                .client
                .get(&self.videos_url, &params, OP_VIDEOS)
                .await?
                .text()
                .await?;
            let page: VideosPage = serde_json::from_str(&body)
                .map_err(|e| IngestError::malformed("videos.list page", e))?;
            debug!(requested = chunk.len(), returned = page.items.len(), "videos.list batch");
            for d in page.items {
                if let Some(id) = d.id.clone() {
                    details.insert(id, d);
                }
            }
        }

        for it in items.iter_mut() {
            // Ids missing from the detail response stay under-enriched.
            let Some(d) = details.get(&it.id) else {
                continue;
            };
            it.tags = d.snippet.tags.clone();
            it.duration = d.content_details.duration.clone();
            it.view_count = parse_view_count(d.statistics.view_count.as_ref());
        }
        Ok(())
    }
}

fn search_item_to_video(it: SearchItem) -> VideoItem {
    let id = it.id.video_id.unwrap_or_default();
    let url = (!id.is_empty()).then(|| format!("{WATCH_URL}{id}"));
    VideoItem {
        url,
        id,
        published: it.snippet.published_at,
        title: it.snippet.title,
        summary: it.snippet.description,
        tags: Vec::new(),
        duration: None,
        view_count: None,
    }
}

/// Decode a `{"items": [...]}` feed document.
pub fn parse_feed_str(s: &str) -> Result<VideoFeed> {
    serde_json::from_str(s).map_err(|e| IngestError::malformed("video feed", e))
}

pub struct YoutubeProvider {
    mode: Mode,
}

enum Mode {
    Live {
        client: ResilientClient,
        settings: YoutubeSettings,
    },
    SampleFile(PathBuf),
}

impl YoutubeProvider {
    pub fn live(client: ResilientClient, settings: YoutubeSettings) -> Self {
        Self {
            mode: Mode::Live { client, settings },
        }
    }

    pub fn from_sample_file(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mode::SampleFile(path.into()),
        }
    }
}

#[async_trait]
impl SourceProvider for YoutubeProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawFeedItem>> {
        let t0 = std::time::Instant::now();
        let feed = match &self.mode {
            Mode::Live { client, settings } => {
                YoutubeAdapter::from_settings(client, settings)?
                    .fetch(settings.max_results, settings.enrich)
                    .await?
            }
            Mode::SampleFile(path) => parse_feed_str(&tokio::fs::read_to_string(path).await?)?,
        };

        let out: Vec<RawFeedItem> = feed.items.into_iter().map(RawFeedItem::Video).collect();
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_item_builds_watch_url() {
        let it: SearchItem = serde_json::from_value(json!({
            "id": {"videoId": "vid123"},
            "snippet": {
                "publishedAt": "2026-02-10T18:00:00Z",
                "title": "Test video",
                "description": "Summary here"
            }
        }))
        .unwrap();
        let v = search_item_to_video(it);
        assert_eq!(v.id, "vid123");
        assert_eq!(v.url.as_deref(), Some("https://www.youtube.com/watch?v=vid123"));
        assert_eq!(v.published.as_deref(), Some("2026-02-10T18:00:00Z"));
        assert!(v.tags.is_empty());
    }

    #[test]
    fn search_item_without_id_has_no_url() {
        let it: SearchItem = serde_json::from_value(json!({"snippet": {"title": "x"}})).unwrap();
        let v = search_item_to_video(it);
        assert_eq!(v.id, "");
        assert!(v.url.is_none());
    }

    #[test]
    fn feed_document_parses() {
        let feed = parse_feed_str(
            r#"{"items": [{"id": "a", "published": null, "title": "t", "url": null, "summary": "s", "tags": ["x"]}]}"#,
        )
        .unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].tags, vec!["x"]);
        assert!(parse_feed_str("{not json").is_err());
    }

    #[test]
    fn bad_item_fields_do_not_drop_the_feed() {
        let feed = parse_feed_str(
            r#"{"items": [
                {"id": "good", "title": "ok", "view_count": "1234"},
                {"id": "odd", "title": "views", "view_count": "12k"},
                {"id": null, "tags": null, "title": "no id"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(feed.items.len(), 3);
        assert_eq!(feed.items[0].view_count, Some(1234));
        assert_eq!(feed.items[1].view_count, None);
        assert_eq!(feed.items[2].id, "");
        assert!(feed.items[2].tags.is_empty());
    }
}
