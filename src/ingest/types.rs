// src/ingest/types.rs
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Canonical output unit. Serialized field order is the on-disk contract read
/// by the reporting side; every key is always written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalEvent {
    pub id: String,
    pub timestamp: Option<String>,
    pub source: String,
    pub features: Features,
    pub expected_move_bp: i64,
    pub iv30: Option<f64>,
    pub iv90: Option<f64>,
    #[serde(default)]
    pub skew_note: String,
    pub thesis_tag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Features {
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub sentiment: String,
    // Video-only enrichments; absent for site events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
}

/// Feed/provider identity. Fixes the `source` string, the id prefix and the
/// placeholder expected move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Youtube,
    Site,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Youtube => "herbertong:yt",
            SourceTag::Site => "herbertong:site",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            SourceTag::Youtube => "herbert-yt",
            SourceTag::Site => "herbert-site",
        }
    }

    pub fn expected_move_bp(self) -> i64 {
        match self {
            SourceTag::Youtube => 50,
            SourceTag::Site => 40,
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// View counts arrive as decimal strings; tolerate numbers, reject the rest.
pub fn parse_view_count(v: Option<&Value>) -> Option<u64> {
    match v? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn lenient_view_count<'de, D>(d: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(parse_view_count(v.as_ref()))
}

/// One video as produced by the video adapter (and as stored in sample feeds).
/// Bad per-item fields decode to their empty value instead of failing the feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub published: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_view_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub view_count: Option<u64>,
}

/// `{"items": [...]}` feed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoFeed {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

/// One milestone node scraped from the site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MilestoneNode {
    /// Raw `data-date` attribute, if any.
    pub date: Option<String>,
    pub text: String,
}

/// Transient adapter output, consumed by the normalizer and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFeedItem {
    Video(VideoItem),
    Milestone(MilestoneNode),
}

impl RawFeedItem {
    /// The source an item belongs to by construction.
    pub fn source_tag(&self) -> SourceTag {
        match self {
            RawFeedItem::Video(_) => SourceTag::Youtube,
            RawFeedItem::Milestone(_) => SourceTag::Site,
        }
    }
}

impl From<VideoItem> for RawFeedItem {
    fn from(v: VideoItem) -> Self {
        RawFeedItem::Video(v)
    }
}

impl From<MilestoneNode> for RawFeedItem {
    fn from(m: MilestoneNode) -> Self {
        RawFeedItem::Milestone(m)
    }
}


#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawFeedItem>>;
    fn name(&self) -> &'static str;
}
