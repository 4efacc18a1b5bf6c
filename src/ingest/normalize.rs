// src/ingest/normalize.rs
//! Raw feed item → [`SignalEvent`]. Pure: no I/O, no clock, no randomness.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::ingest::duration::parse_opt;
use crate::ingest::thesis::{classify, classify_milestone};
use crate::ingest::types::{
    Features, MilestoneNode, RawFeedItem, SignalEvent, SourceTag, VideoItem,
};

pub const SENTIMENT_NEUTRAL: &str = "neu";
pub const SITE_PLACEHOLDER_URL: &str = "https://www.herbertong.com/";
pub const SITE_KEYWORDS: &[&str] = &["milestone"];

/// Keys every persisted event must carry, with the default used when missing.
const REQUIRED_KEYS: &[&str] = &[
    "id",
    "timestamp",
    "source",
    "features",
    "expected_move_bp",
    "thesis_tag",
];

/// Map one raw item onto the canonical shape. `source` decides the id prefix,
/// the `source` string and the placeholder expected move.
pub fn normalize(item: &RawFeedItem, source: SourceTag) -> SignalEvent {
    match item {
        RawFeedItem::Video(v) => normalize_video(v, source),
        RawFeedItem::Milestone(m) => normalize_milestone(m, source),
    }
}

fn normalize_video(v: &VideoItem, source: SourceTag) -> SignalEvent {
    let title = v.title.as_deref().unwrap_or_default();
    let summary = v.summary.as_deref().unwrap_or_default();
    let thesis = classify(title, summary, &v.tags);

    let id_part = if v.id.trim().is_empty() {
        content_digest(&[
            source.as_str(),
            v.published.as_deref().unwrap_or_default(),
            title,
        ])
    } else {
        v.id.trim().to_string()
    };

    SignalEvent {
        id: format!("{}-{id_part}", source.id_prefix()),
        timestamp: v.published.clone(),
        source: source.as_str().to_string(),
        features: Features {
            title: v.title.clone(),
            url: v.url.clone(),
            summary: v.summary.clone(),
            keywords: v.tags.clone(),
            sentiment: SENTIMENT_NEUTRAL.to_string(),
            video_duration: v.duration.clone(),
            video_duration_secs: parse_opt(v.duration.as_deref()),
            view_count: v.view_count,
        },
        expected_move_bp: source.expected_move_bp(),
        iv30: None,
        iv90: None,
        skew_note: String::new(),
        thesis_tag: thesis.to_string(),
    }
}

fn normalize_milestone(m: &MilestoneNode, source: SourceTag) -> SignalEvent {
    let date = m.date.as_deref().map(str::trim).unwrap_or_default();
    let digest = content_digest(&[source.as_str(), date, &m.text.to_lowercase()]);

    SignalEvent {
        id: format!("{}-{digest}", source.id_prefix()),
        timestamp: midnight_utc(m.date.as_deref()),
        source: source.as_str().to_string(),
        features: Features {
            title: Some(m.text.clone()),
            url: Some(SITE_PLACEHOLDER_URL.to_string()),
            summary: None,
            keywords: SITE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            sentiment: SENTIMENT_NEUTRAL.to_string(),
            ..Features::default()
        },
        expected_move_bp: source.expected_move_bp(),
        iv30: None,
        iv90: None,
        skew_note: String::new(),
        thesis_tag: classify_milestone(&m.text).to_string(),
    }
}

/// `YYYY-MM-DD` → `YYYY-MM-DDT00:00:00Z`; anything else → `None`.
pub fn midnight_utc(date: Option<&str>) -> Option<String> {
    let d = NaiveDate::parse_from_str(date?.trim(), "%Y-%m-%d").ok()?;
    Some(format!("{}T00:00:00Z", d.format("%Y-%m-%d")))
}

/// First 16 hex chars of sha256 over the `|`-joined parts.
fn content_digest(parts: &[&str]) -> String {
    let mut h = Sha256::new();
    h.update(parts.join("|").as_bytes());
    let hex = format!("{:x}", h.finalize());
    hex[..16].to_string()
}

/// Fill missing required keys of an already-produced (possibly partial)
/// event. Present keys are left untouched, even when `null`.
pub fn complete_schema(map: &mut Map<String, Value>) {
    for k in REQUIRED_KEYS {
        map.entry(*k).or_insert(Value::Null);
    }
    map.entry("iv30").or_insert(Value::Null);
    map.entry("iv90").or_insert(Value::Null);
    map.entry("skew_note")
        .or_insert_with(|| Value::String(String::new()));
}

/// Convenience for arbitrary JSON values; non-objects are returned unchanged.
pub fn complete_value(mut v: Value) -> Value {
    if let Value::Object(map) = &mut v {
        complete_schema(map);
    }
    v
}
