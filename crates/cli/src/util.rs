use chrono::{DateTime, NaiveDate, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use misp_review_engine::model::Timestamp;

/// Parse a `--since`/`--until` bound: `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub(crate) fn parse_time(s: &str) -> Result<Timestamp, String> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("invalid time '{s}' (expected YYYY-MM-DD or RFC 3339)"))
}

pub(crate) fn format_time(ts: Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Display width of a string, accounting for double-width characters.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate to `width` display columns, ending in ".." when shortened.
pub(crate) fn truncate_display(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    let budget = width.saturating_sub(2);
    let mut used = 0;
    let mut out = String::new();
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        out.push(ch);
    }
    if width >= 2 {
        out.push_str("..");
    }
    out
}

/// Left-align to `width` display columns.
pub(crate) fn pad(s: &str, width: usize) -> String {
    let truncated = truncate_display(s, width);
    let fill = width.saturating_sub(display_width(&truncated));
    format!("{truncated}{}", " ".repeat(fill))
}
