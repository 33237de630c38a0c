//! M3U Extended lexer/segmenter
//!
//! Walks a playlist document line by line and groups directives into raw
//! entries. Four line classes matter:
//!
//! ```text
//! #EXTM3U x-tvg-url="http://epg/guide.xml"          header (first line only)
//! #EXTINF:-1 tvg-id="bbc1" group-title="UK",BBC One  entry metadata
//! #EXTVLCOPT:http-user-agent=Mozilla/5.0            per-entry option
//! http://cdn.example/bbc1.m3u8                      stream URL
//! ```
//!
//! An entry is emitted only once its URL is seen. Metadata that is never
//! followed by a URL is dropped without a warning.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use crate::models::UNCATEGORIZED;

const HEADER_MARKER: &str = "#EXTM3U";
const METADATA_MARKER: &str = "#EXTINF:";
const OPTION_MARKER: &str = "#EXTVLCOPT:";

/// Attribute prefix stripped from metadata keys
const ATTR_PREFIX: &str = "tvg-";

/// Header attributes that carry the guide-data URL
const GUIDE_URL_ATTRS: [&str; 2] = ["x-tvg-url", "url-tvg"];

lazy_static! {
    /// Regex to normalize multiple whitespaces into single space
    static ref MULTI_SPACE_REGEX: Regex = Regex::new(r"\s{2,}").unwrap();
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).unwrap();
    /// Any URL scheme: http://, https://, rtmp://, udp://, ...
    static ref SCHEME_REGEX: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").unwrap();
}

/// One playlist item as found in the document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub display_name: String,
    pub group_title: String,
    /// Metadata attributes, keys lower-cased with `tvg-` stripped
    pub attributes: BTreeMap<String, String>,
    pub request_headers: BTreeMap<String, String>,
    pub stream_url: String,
}

/// Result of segmenting one document
#[derive(Debug, Default)]
pub struct Segmented {
    pub guide_url: Option<String>,
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Seeking,
    InMetadata,
    InOptions,
    AwaitingUrl,
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    Metadata(&'a str),
    Option(&'a str),
    Url(&'a str),
    Other,
}

fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim_start_matches('\u{feff}').trim();

    if let Some(rest) = line.strip_prefix(METADATA_MARKER) {
        LineKind::Metadata(rest)
    } else if let Some(rest) = line.strip_prefix(OPTION_MARKER) {
        LineKind::Option(rest)
    } else if SCHEME_REGEX.is_match(line) {
        LineKind::Url(line)
    } else {
        LineKind::Other
    }
}

/// Normalize text: trim and collapse multiple spaces into single space
fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    MULTI_SPACE_REGEX.replace_all(trimmed, " ").to_string()
}

/// All `name="value"` pairs of a directive line, keys lower-cased
fn parse_attributes(text: &str) -> Vec<(String, String)> {
    ATTR_REGEX
        .captures_iter(text)
        .map(|caps| {
            let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            (key.to_lowercase(), value.to_string())
        })
        .collect()
}

/// Guide URL embedded in the playlist header, if any
fn parse_header_guide_url(line: &str) -> Option<String> {
    let line = line.trim_start_matches('\u{feff}').trim();
    if !line.starts_with(HEADER_MARKER) {
        return None;
    }

    parse_attributes(line)
        .into_iter()
        .find(|(key, value)| GUIDE_URL_ATTRS.contains(&key.as_str()) && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

/// Parse an EXTINF line (without its marker) into a pending entry
/// Format: -1 tvg-id="..." tvg-name="..." tvg-logo="..." group-title="...",Title
fn parse_extinf(content: &str) -> RawEntry {
    let mut attributes = BTreeMap::new();
    for (key, value) in parse_attributes(content) {
        let key = match key.strip_prefix(ATTR_PREFIX) {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => key,
        };
        attributes.insert(key, value);
    }

    let display_name = match content.rfind(',') {
        Some(pos) => normalize_text(&content[pos + 1..]),
        None => attributes
            .get("name")
            .map(|n| normalize_text(n))
            .unwrap_or_default(),
    };

    let group_title = attributes
        .get("group-title")
        .map(|g| normalize_text(g))
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| UNCATEGORIZED.to_string());

    RawEntry {
        display_name,
        group_title,
        attributes,
        ..Default::default()
    }
}

/// Apply one EXTVLCOPT option. Only the user agent is understood.
fn apply_option(entry: &mut RawEntry, option: &str) {
    let Some((key, value)) = option.split_once('=') else {
        return;
    };

    let value = value.trim();
    if key.trim().eq_ignore_ascii_case("http-user-agent") && !value.is_empty() {
        entry
            .request_headers
            .insert("User-Agent".to_string(), value.to_string());
    }
}

/// Split a playlist document into raw entries plus the header guide URL
pub fn segment(document: &str) -> Segmented {
    let lines: Vec<&str> = document.lines().collect();
    let guide_url = lines.first().and_then(|line| parse_header_guide_url(line));

    let mut entries = Vec::new();
    let mut pending: Option<RawEntry> = None;
    let mut state = LexState::Seeking;
    let mut i = 0usize;

    loop {
        match state {
            LexState::Seeking => {
                let Some(line) = lines.get(i) else { break };
                i += 1;
                if let LineKind::Metadata(content) = classify(line) {
                    pending = Some(parse_extinf(content));
                    state = LexState::InMetadata;
                }
            }
            LexState::InMetadata => {
                state = match lines.get(i).map(|line| classify(line)) {
                    Some(LineKind::Option(_)) => LexState::InOptions,
                    _ => LexState::AwaitingUrl,
                };
            }
            LexState::InOptions => {
                while let Some(LineKind::Option(option)) = lines.get(i).map(|line| classify(line)) {
                    if let Some(entry) = pending.as_mut() {
                        apply_option(entry, option);
                    }
                    i += 1;
                }
                state = LexState::AwaitingUrl;
            }
            LexState::AwaitingUrl => {
                let Some(line) = lines.get(i) else { break };
                i += 1;
                match classify(line) {
                    LineKind::Url(url) => {
                        if let Some(mut entry) = pending.take() {
                            entry.stream_url = url.to_string();
                            entries.push(entry);
                        }
                        state = LexState::Seeking;
                    }
                    LineKind::Metadata(content) => {
                        // previous block never got a URL
                        pending = Some(parse_extinf(content));
                        state = LexState::InMetadata;
                    }
                    LineKind::Option(_) | LineKind::Other => {}
                }
            }
        }
    }

    Segmented { guide_url, entries }
}
