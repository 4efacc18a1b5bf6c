// src/ingest/duration.rs
use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)S)?)?$")
        .expect("static duration regex")
});

/// Parse a restricted ISO-8601 duration (`P[nD][T[nH][nM][nS]]`) into total seconds.
///
/// Returns `None` for empty input, anything outside the grammar, a bare `"P"`
/// or `"PT"` with no components, and values that overflow `u64`.
///
/// ```
/// use herbert_signal::ingest::duration::parse_iso8601_duration;
/// assert_eq!(parse_iso8601_duration("PT2M30S"), Some(150));
/// assert_eq!(parse_iso8601_duration("P1DT1H"), Some(90_000));
/// assert_eq!(parse_iso8601_duration("P"), None);
/// ```
pub fn parse_iso8601_duration(input: &str) -> Option<u64> {
    let caps = DURATION_RE.captures(input)?;

    let mut total: u64 = 0;
    let mut any = false;
    for (name, unit) in [
        ("days", 86_400u64),
        ("hours", 3_600),
        ("minutes", 60),
        ("seconds", 1),
    ] {
        if let Some(m) = caps.name(name) {
            any = true;
            let n: u64 = m.as_str().parse().ok()?;
            total = total.checked_add(n.checked_mul(unit)?)?;
        }
    }

    // "P" and "PT" match the grammar but carry no components.
    any.then_some(total)
}

/// Convenience for optional API fields.
pub fn parse_opt(input: Option<&str>) -> Option<u64> {
    input.and_then(parse_iso8601_duration)
}
