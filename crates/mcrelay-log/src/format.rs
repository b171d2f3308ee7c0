//! Shared line formatting: the `YYYY-MM-DD HH:MM:SS ` timestamp prefix every
//! logged line carries, and the `§`-escape stripping both directions apply
//! to chat text.

use once_cell::sync::Lazy;
use regex::Regex;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const TIMESTAMP_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

static COLOR_CODE: Lazy<Regex> = Lazy::new(|| Regex::new("\u{00A7}.").expect("valid color-code regex"));

/// Formats `now` as the fixed-width prefix every log line starts with.
pub fn timestamp_prefix(now: OffsetDateTime) -> String {
    now.format(TIMESTAMP_FORMAT).expect("fixed timestamp format never fails")
}

/// Strips every `§`-plus-one-character color code escape from `text`.
#[must_use]
pub fn strip_color_codes(text: &str) -> std::borrow::Cow<'_, str> {
    COLOR_CODE.replace_all(text, "")
}
