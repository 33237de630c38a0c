use std::collections::BTreeMap;

use crate::models::Stream;
use crate::services::m3u_parser::RawEntry;

/// Channel attributes derived from a single raw entry, before identity resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDraft {
    /// Lower-cased key, not yet remapped or namespaced
    pub identity: String,
    pub display_name: String,
    pub genre: String,
    pub artwork: Option<String>,
    pub stream: Stream,
    pub attributes: BTreeMap<String, String>,
}

fn non_empty_attr<'a>(entry: &'a RawEntry, key: &str) -> Option<&'a str> {
    entry
        .attributes
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Convert a raw entry into a channel draft
pub fn normalize(entry: RawEntry) -> ChannelDraft {
    let identity = non_empty_attr(&entry, "id")
        .unwrap_or_else(|| entry.display_name.trim())
        .to_lowercase();

    let display_name = non_empty_attr(&entry, "name")
        .map(str::to_string)
        .unwrap_or_else(|| entry.display_name.clone());

    let artwork = non_empty_attr(&entry, "logo").map(str::to_string);

    let stream = Stream {
        url: entry.stream_url,
        label: entry.display_name,
        request_headers: entry.request_headers,
    };

    ChannelDraft {
        identity,
        display_name,
        genre: entry.group_title,
        artwork,
        stream,
        attributes: entry.attributes,
    }
}
