use regex::Regex;
use std::sync::LazyLock;

static RATING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid rating regex"));

static STARS_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\d+(?:\.\d+)?\s+out\s+of\s+5\s+stars\s*").expect("valid stars regex")
});

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First number in a star-rating text, e.g. "4.0 out of 5 stars" -> 4.0.
pub fn parse_rating(text: &str) -> Option<f64> {
    let found = RATING_PATTERN.find(text)?;
    let value: f64 = found.as_str().parse().ok()?;

    if (0.0..=5.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Drop the "5.0 out of 5 stars" fragment some review titles carry.
pub fn strip_stars_prefix(title: &str) -> String {
    STARS_PREFIX.replace(title, "").trim().to_string()
}

/// Drop a trailing "READ MORE" expander label.
pub fn strip_read_more(body: &str) -> String {
    const LABEL: &str = "READ MORE";
    let trimmed = body.trim_end();

    match trimmed.len().checked_sub(LABEL.len()) {
        Some(cut)
            if trimmed.is_char_boundary(cut) && trimmed[cut..].eq_ignore_ascii_case(LABEL) =>
        {
            trimmed[..cut].trim_end().to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Optional text field: `None` when blank after cleanup.
pub fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Review length buckets used in exports.
pub fn length_category(word_count: usize) -> &'static str {
    match word_count {
        0..=5 => "Very Short",
        6..=15 => "Short",
        16..=50 => "Medium",
        _ => "Long",
    }
}
