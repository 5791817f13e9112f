//! Display projection of one bound row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

use super::AdapterOptions;
use crate::snapshot::EntryRow;

const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";
const FALLBACK_TIME_FORMAT: &str = "%H:%M";

/// What a renderer needs to draw one entry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView<'a> {
    pub id: i64,
    pub title: &'a str,
    /// `"<date> <time>"`, followed by `", <feed name>"` when feed info is shown.
    pub subtitle: String,
    #[serde(skip)]
    pub icon: Option<&'a [u8]>,
    /// Opened when the row is activated.
    pub link: Option<&'a str>,
    pub favorite: bool,
    pub read: bool,
}

/// Format with `format`, or `fallback` if `format` is not a valid strftime string.
fn format_with_fallback(date: &DateTime<Utc>, format: &str, fallback: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(format)).is_err() {
        tracing::debug!(format, "Invalid date format, using fallback");
        out.clear();
        let _ = write!(out, "{}", date.format(fallback));
    }
    out
}

pub(super) fn subtitle(row: &EntryRow, options: &AdapterOptions) -> String {
    let date = DateTime::<Utc>::from_timestamp_millis(row.date).unwrap_or_default();
    let mut subtitle = format_with_fallback(&date, &options.date_format, FALLBACK_DATE_FORMAT);
    subtitle.push(' ');
    subtitle.push_str(&format_with_fallback(
        &date,
        &options.time_format,
        FALLBACK_TIME_FORMAT,
    ));

    if options.show_feed_info {
        if let Some(name) = row.feed_name.as_deref() {
            subtitle.push_str(", ");
            subtitle.push_str(name);
        }
    }
    subtitle
}

pub(super) fn icon<'a>(row: &'a EntryRow, options: &AdapterOptions) -> Option<&'a [u8]> {
    if options.show_feed_info {
        row.feed_icon.as_deref()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::row;
    use std::sync::Arc;

    #[test]
    fn test_subtitle_without_feed_info() {
        let options = AdapterOptions {
            show_feed_info: false,
            ..AdapterOptions::default()
        };
        let mut entry = row(1, None, false);
        entry.date = 1_700_000_000_000; // 2023-11-14 22:13:20 UTC
        entry.feed_name = Some(Arc::from("Ignored"));
        assert_eq!(subtitle(&entry, &options), "2023-11-14 22:13");
        assert!(icon(&entry, &options).is_none());
    }

    #[test]
    fn test_subtitle_with_feed_name() {
        let options = AdapterOptions::default();
        let mut entry = row(1, None, false);
        entry.date = 1_700_000_000_000;
        entry.feed_name = Some(Arc::from("Example"));
        entry.feed_icon = Some(Arc::from(vec![1u8, 2, 3]));
        assert_eq!(subtitle(&entry, &options), "2023-11-14 22:13, Example");
        assert_eq!(icon(&entry, &options), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_missing_feed_name_is_tolerated() {
        let options = AdapterOptions::default();
        let mut entry = row(1, None, false);
        entry.date = 0;
        assert_eq!(subtitle(&entry, &options), "1970-01-01 00:00");
    }

    #[test]
    fn test_invalid_format_falls_back() {
        let options = AdapterOptions {
            date_format: "%Q".to_string(),
            ..AdapterOptions::default()
        };
        let mut entry = row(1, None, false);
        entry.date = 0;
        assert_eq!(subtitle(&entry, &options), "1970-01-01 00:00");
    }
}
