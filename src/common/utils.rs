//! Utility functions for ubiquity

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Percent-encoding set for URL path segments (includes /, %, and control chars)
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'%')
    .add(b' ')
    .add(b'?')
    .add(b'#')
    .add(b'&');

/// Encode a single URL path segment (a WWN, a mapping id, ...)
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

/// Join `base` and any number of path entries with exactly one `/` between them.
pub fn format_url(base: &str, entries: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for entry in entries {
        let entry = entry.trim_matches('/');
        if entry.is_empty() {
            continue;
        }
        url.push('/');
        url.push_str(entry);
    }
    url
}

/// Is `value` one of `options`?
pub fn string_in_slice(value: &str, options: &[&str]) -> bool {
    options.iter().any(|option| *option == value)
}
