// src/ingest/mod.rs
pub mod config;
pub mod duration;
pub mod http;
pub mod normalize;
pub mod providers;
pub mod thesis;
pub mod types;

use std::fs;
use std::path::{Path, PathBuf};

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

use crate::error::Result;
use crate::ingest::normalize::normalize;
use crate::ingest::types::{RawFeedItem, SignalEvent, SourceProvider};

/// One-time metrics registration (so series show up once a recorder is installed).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total raw items parsed from providers.");
        describe_counter!(
            "ingest_events_written_total",
            "Signal events persisted to the output directory."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_counter!("http_requests_total", "Outbound GET attempts by operation.");
        describe_counter!("http_retries_total", "GET retries by operation.");
        describe_counter!(
            "http_failures_total",
            "GETs that exhausted their retries, by operation."
        );
    });
}

/// `<out_dir>/<id>.json`.
pub fn event_path(out_dir: &Path, ev: &SignalEvent) -> PathBuf {
    out_dir.join(format!("{}.json", ev.id))
}

/// Persist one event as pretty JSON. Same event → same bytes.
pub fn write_event(out_dir: &Path, ev: &SignalEvent) -> Result<PathBuf> {
    let path = event_path(out_dir, ev);
    let mut json = serde_json::to_string_pretty(ev)?;
    json.push('\n');
    fs::write(&path, json)?;
    Ok(path)
}

/// Normalize each item and write it under `out_dir` (created if absent).
/// Returns the events in feed order. Not transactional: files written before
/// a failing write stay on disk.
pub fn run(items: Vec<RawFeedItem>, out_dir: &Path) -> Result<Vec<SignalEvent>> {
    ensure_metrics_described();
    fs::create_dir_all(out_dir)?;

    let mut events = Vec::with_capacity(items.len());
    for item in &items {
        let ev = normalize(item, item.source_tag());
        write_event(out_dir, &ev)?;
        counter!("ingest_events_written_total").increment(1);
        events.push(ev);
    }

    tracing::info!(
        target: "ingest",
        written = events.len(),
        out_dir = %out_dir.display(),
        "ingest run complete"
    );
    Ok(events)
}

/// Fetch from a provider, then [`run`]. Provider errors propagate.
pub async fn run_provider(
    provider: &dyn SourceProvider,
    out_dir: &Path,
) -> Result<Vec<SignalEvent>> {
    ensure_metrics_described();

    let items = match provider.fetch_latest().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, provider = provider.name(), "provider error");
            counter!("ingest_provider_errors_total").increment(1);
            return Err(e);
        }
    };
    tracing::debug!(provider = provider.name(), items = items.len(), "provider fetched");
    run(items, out_dir)
}
