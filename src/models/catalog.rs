use indexmap::{IndexMap, IndexSet};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Genre assigned to entries without a group attribute
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Namespace prefix for live-TV channel identities
pub const ID_PREFIX: &str = "live:";

/// One playable candidate of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub url: String,
    /// Raw per-entry name, keeps merged streams distinguishable
    pub label: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub request_headers: BTreeMap<String, String>,
}

/// Catalog unit: a live-TV channel with one or more streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub identity: String,
    pub display_name: String,
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,
    pub streams: Vec<Stream>,
    pub source_attributes: BTreeMap<String, String>,
}

impl Channel {
    /// Canonical key without the namespace prefix
    pub fn key(&self) -> &str {
        self.identity
            .strip_prefix(ID_PREFIX)
            .unwrap_or(&self.identity)
    }
}

/// Build a namespaced identity from a canonical key
pub fn namespaced_identity(key: &str) -> String {
    format!("{}{}", ID_PREFIX, key)
}

/// Aggregate result of one transformation run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub genres: IndexSet<String>,
    /// Keyed by identity, in first-seen order
    #[serde(serialize_with = "serialize_channels")]
    pub channels: IndexMap<String, Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_url: Option<String>,
}

impl CatalogSnapshot {
    #[cfg(test)]
    pub fn channel(&self, identity: &str) -> Option<&Channel> {
        self.channels.get(identity)
    }

    pub fn stream_count(&self) -> usize {
        self.channels.values().map(|c| c.streams.len()).sum()
    }

    /// Same snapshot with `guide_url` set, unless documents already supplied one
    pub fn with_fallback_guide_url(mut self, fallback: Option<&str>) -> Self {
        if self.guide_url.is_none() {
            self.guide_url = fallback.map(str::to_string);
        }
        self
    }
}

fn serialize_channels<S>(channels: &IndexMap<String, Channel>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(channels.values())
}

/// Catalog as published by the refresh service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedCatalog {
    #[serde(flatten)]
    pub snapshot: CatalogSnapshot,
    /// SHA1 of the serialized snapshot
    pub revision: String,
    pub refreshed_at: i64,
    pub source_count: usize,
    pub remap_rules: usize,
}

/// Summary returned by a manual refresh
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub channels: usize,
    pub genres: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(key: &str) -> Channel {
        Channel {
            identity: namespaced_identity(key),
            display_name: key.to_uppercase(),
            genres: vec![UNCATEGORIZED.to_string()],
            artwork: None,
            streams: vec![Stream {
                url: format!("http://cdn/{}.ts", key),
                label: key.to_string(),
                request_headers: BTreeMap::new(),
            }],
            source_attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_channel_key_strips_prefix() {
        let c = channel("chbar");
        assert_eq!(c.identity, "live:chbar");
        assert_eq!(c.key(), "chbar");
    }

    #[test]
    fn test_snapshot_serializes_channels_as_list() {
        let mut channels = IndexMap::new();
        let c = channel("news");
        channels.insert(c.identity.clone(), c);
        let mut genres = IndexSet::new();
        genres.insert(UNCATEGORIZED.to_string());

        let snapshot = CatalogSnapshot {
            genres,
            channels,
            guide_url: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json["channels"].is_array());
        assert_eq!(json["channels"][0]["identity"], "live:news");
        assert_eq!(json["channels"][0]["displayName"], "NEWS");
        assert!(json.get("guideUrl").is_none());
        assert!(json["channels"][0]["streams"][0].get("requestHeaders").is_none());
    }

    #[test]
    fn test_fallback_guide_url_only_when_absent() {
        let empty = CatalogSnapshot {
            genres: IndexSet::new(),
            channels: IndexMap::new(),
            guide_url: None,
        };
        let filled = empty.clone().with_fallback_guide_url(Some("http://epg/guide.xml"));
        assert_eq!(filled.guide_url.as_deref(), Some("http://epg/guide.xml"));

        let kept = filled.with_fallback_guide_url(Some("http://other/guide.xml"));
        assert_eq!(kept.guide_url.as_deref(), Some("http://epg/guide.xml"));
    }
}
