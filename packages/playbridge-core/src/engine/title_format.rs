//! Entry title formatting for generations without engine-side formatting.
//!
//! Supported directives:
//!
//! | Directive | Expands to |
//! |-----------|------------|
//! | `%a` | artist |
//! | `%T` | title |
//! | `%A` | album |
//! | `%Y` | date |
//! | `%G` | genre |
//! | `%F` | filename |
//! | `%L` | duration as `m:ss` |
//! | `%%` | literal `%` |
//!
//! Unknown directives are copied verbatim.

use super::types::EntryData;

/// Expands `format` against an entry's fields.
#[must_use]
pub fn format_title(entry: &EntryData, format: &str) -> String {
    let mut out = String::with_capacity(format.len() + 32);
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => out.push_str(entry.tag("artist")),
            Some('T') => out.push_str(entry.tag("title")),
            Some('A') => out.push_str(entry.tag("album")),
            Some('Y') => out.push_str(entry.tag("date")),
            Some('G') => out.push_str(entry.tag("genre")),
            Some('F') => out.push_str(&entry.filename),
            Some('L') => {
                let secs = entry.duration.as_secs();
                out.push_str(&format!("{}:{:02}", secs / 60, secs % 60));
            }
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    out
}
