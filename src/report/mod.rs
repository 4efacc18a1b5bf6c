// src/report/mod.rs
//! Downstream artifacts built from the persisted event files: the run index
//! (`signals_index.json`) and the markdown catalyst calendar.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::ingest::normalize::complete_value;

pub const SIGNALS_INDEX_FILE: &str = "signals_index.json";
pub const CALENDAR_TITLE: &str = "Catalyst Calendar (Enriched with HERBERT-SIGNAL)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalsIndex {
    pub yt_count: usize,
    pub site_count: usize,
    pub files: Vec<String>,
}

/// `*.json` files directly under `dir`, sorted by file name. A missing
/// directory is an empty listing.
pub fn list_event_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == "json"))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub fn write_signals_index(
    artifacts_dir: &Path,
    out_dir: &Path,
    yt_count: usize,
    site_count: usize,
) -> Result<PathBuf> {
    fs::create_dir_all(artifacts_dir)?;
    let files = list_event_files(out_dir)?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    let index = SignalsIndex {
        yt_count,
        site_count,
        files,
    };

    let path = artifacts_dir.join(SIGNALS_INDEX_FILE);
    let mut json = serde_json::to_string_pretty(&index)?;
    json.push('\n');
    fs::write(&path, json)?;
    info!(path = %path.display(), yt_count, site_count, "wrote signals index");
    Ok(path)
}

/// Read every event file in `in_dir` (file-name order). Unreadable or
/// non-object files are skipped with a warning; partial events get their
/// missing keys filled.
pub fn load_events(in_dir: &Path) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for path in list_event_files(in_dir)? {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<Value>(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(v) if v.is_object() => out.push(complete_value(v)),
            Ok(_) => warn!(path = %path.display(), "event file is not a JSON object, skipping"),
            Err(error) => warn!(path = %path.display(), %error, "unreadable event file, skipping"),
        }
    }
    Ok(out)
}

fn field(v: &Value) -> String {
    match v {
        Value::Null => "n/a".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_calendar(events: &[Value], generated_at: DateTime<Utc>) -> String {
    let mut md = format!(
        "# {CALENDAR_TITLE}\n_Generated: {}_\n\n## Herbert-derived Catalysts\n\n",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    for ev in events {
        let features = &ev["features"];
        md.push_str(&format!(
            "- **{}** — **{}** — {}  ({})  {}\n",
            field(&ev["timestamp"]),
            field(&ev["thesis_tag"]),
            field(&features["title"]),
            field(&ev["source"]),
            field(&features["url"]),
        ));
    }
    md
}

/// Render the calendar for `in_dir` into `out_md`. Returns the bullet count.
pub fn write_calendar(in_dir: &Path, out_md: &Path) -> Result<usize> {
    let events = load_events(in_dir)?;
    if let Some(parent) = out_md.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_md, render_calendar(&events, Utc::now()))?;
    info!(path = %out_md.display(), events = events.len(), "wrote catalyst calendar");
    Ok(events.len())
}
