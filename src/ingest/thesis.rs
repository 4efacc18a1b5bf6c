//! Keyword thesis classifier.
//!
//! Ordered tables of `(tag, keywords)`; the first bucket with any
//! case-insensitive substring hit wins, so table order is the tie-breaker.

pub const GROK_IN_CAR: &str = "GROK_IN_CAR";
pub const ENERGY_FLYWHEEL: &str = "ENERGY_FLYWHEEL";
pub const AUTONOMY_SIGNAL: &str = "AUTONOMY_SIGNAL";
pub const TSLA_MILESTONE: &str = "TSLA_MILESTONE";
pub const UPCOMING_CATALYST: &str = "UPCOMING_CATALYST";

/// Video table. Falls back to [`UPCOMING_CATALYST`].
pub const THESIS_KEYWORDS: &[(&str, &[&str])] = &[
    (GROK_IN_CAR, &["grok", "voice", "assistant"]),
    (ENERGY_FLYWHEEL, &["energy", "megapack", "deployment", "gwh"]),
    (AUTONOMY_SIGNAL, &["fsd", "robotaxi", "autonomy"]),
];

/// Site table: autonomy beats the generic milestone bucket.
pub const SITE_THESIS_KEYWORDS: &[(&str, &[&str])] = &[(AUTONOMY_SIGNAL, &["autonomy"])];

/// Classify a video from its title, summary and tags.
pub fn classify(title: &str, summary: &str, tags: &[String]) -> &'static str {
    let text = format!("{title} {summary} {}", tags.join(" ")).to_lowercase();
    first_match(&text, THESIS_KEYWORDS).unwrap_or(UPCOMING_CATALYST)
}

/// Classify milestone text scraped from the site.
pub fn classify_milestone(text: &str) -> &'static str {
    first_match(&text.to_lowercase(), SITE_THESIS_KEYWORDS).unwrap_or(TSLA_MILESTONE)
}

fn first_match(lowered: &str, table: &[(&'static str, &[&str])]) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, kws)| kws.iter().any(|k| lowered.contains(k)))
        .map(|(tag, _)| *tag)
}
