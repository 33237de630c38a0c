//! Catalog aggregation across source documents
//!
//! Documents are processed strictly in the given order: the first document to
//! define an identity owns the channel-level fields, later ones only add
//! streams. Each call starts from an empty catalog.

use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

use crate::models::{CatalogSnapshot, Channel, UNCATEGORIZED};
use crate::services::m3u_parser::segment;
use crate::services::normalizer::normalize;
use crate::services::remap::RuleSet;
use crate::services::resolver::{report_conflict, Origin, ResolveStats, Resolver};

/// Channels and guide URL produced by a single document
#[derive(Debug, Default)]
pub struct DocumentCatalog {
    pub guide_url: Option<String>,
    pub channels: IndexMap<String, Channel>,
    pub origins: HashMap<String, Origin>,
    pub entries: usize,
    pub stats: ResolveStats,
}

/// Run lexer, normalizer and resolver over one document
pub fn transform_document(document: &str, rules: &RuleSet) -> DocumentCatalog {
    let segmented = segment(document);
    let entries = segmented.entries.len();

    let mut resolver = Resolver::new(rules);
    for entry in segmented.entries {
        resolver.resolve(normalize(entry));
    }

    let stats = resolver.stats();
    let (channels, origins) = resolver.into_parts();
    DocumentCatalog {
        guide_url: segmented.guide_url,
        channels,
        origins,
        entries,
        stats,
    }
}

/// Outcome of one aggregation run
#[derive(Debug)]
pub struct Aggregated {
    pub snapshot: CatalogSnapshot,
    /// Remap collisions, within and across documents
    pub conflicts: usize,
}

/// Build a catalog snapshot from documents in the given order
pub fn aggregate<S: AsRef<str>>(documents: &[S], rules: &RuleSet) -> Aggregated {
    let mut genres: IndexSet<String> = IndexSet::new();
    genres.insert(UNCATEGORIZED.to_string());
    let mut channels: IndexMap<String, Channel> = IndexMap::new();
    let mut origins: HashMap<String, Origin> = HashMap::new();
    let mut guide_urls: IndexSet<String> = IndexSet::new();
    let mut conflicts = 0;

    for (index, document) in documents.iter().enumerate() {
        let doc = transform_document(document.as_ref(), rules);

        tracing::info!(
            "Source {}: {} entries -> {} channels ({} merged, {} remapped, {} conflicts)",
            index,
            doc.entries,
            doc.channels.len(),
            doc.stats.merged,
            doc.stats.remapped,
            doc.stats.conflicts
        );

        if let Some(urls) = doc.guide_url {
            for url in urls.split(',').map(str::trim).filter(|u| !u.is_empty()) {
                guide_urls.insert(url.to_string());
            }
        }

        conflicts += doc.stats.conflicts;
        let mut doc_origins = doc.origins;

        for (identity, channel) in doc.channels {
            let incoming = doc_origins.remove(&identity);
            match channels.entry(identity) {
                Entry::Occupied(mut existing) => {
                    if let (Some(owner), Some(incoming)) = (origins.get(existing.key()), incoming) {
                        if owner.conflicts_with(&incoming) {
                            let key = existing.get().key().to_string();
                            report_conflict(owner, &incoming, &key);
                            conflicts += 1;
                        }
                    }
                    existing.get_mut().streams.extend(channel.streams);
                }
                Entry::Vacant(slot) => {
                    if let Some(origin) = incoming {
                        origins.insert(slot.key().clone(), origin);
                    }
                    genres.extend(channel.genres.iter().cloned());
                    slot.insert(channel);
                }
            }
        }
    }

    let guide_url = if guide_urls.is_empty() {
        None
    } else {
        Some(guide_urls.into_iter().collect::<Vec<_>>().join(","))
    };

    Aggregated {
        snapshot: CatalogSnapshot {
            genres,
            channels,
            guide_url,
        },
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metrics;

    const SOURCE_A: &str = r#"#EXTM3U x-tvg-url="http://x/epg1"
#EXTINF:-1 tvg-id="chbar" tvg-name="Channel Bar" tvg-logo="http://l/bar.png" group-title="News",Bar HD
http://a/bar.m3u8
#EXTINF:-1 tvg-id="chfoo" group-title="Sports",Foo
http://a/foo.m3u8
#EXTINF:-1,Plain
http://a/plain.m3u8
"#;

    const SOURCE_B: &str = r#"#EXTM3U url-tvg="http://x/epg1,http://x/epg2"
#EXTINF:-1 tvg-id="chbar" group-title="Movies",Bar Backup
http://b/bar.m3u8
#EXTINF:-1 tvg-id="extra" group-title="Kids",Extra
http://b/extra.m3u8
"#;

    fn rules() -> RuleSet {
        RuleSet::parse("chfoo=chbar\n").0
    }

    #[test]
    fn test_remap_and_stream_merge_within_document() {
        let snapshot = aggregate(&[SOURCE_A], &rules()).snapshot;

        assert_eq!(snapshot.channels.len(), 2);
        let bar = snapshot.channel("live:chbar").unwrap();
        assert_eq!(bar.display_name, "Channel Bar");
        assert_eq!(bar.genres, vec!["News".to_string()]);
        assert_eq!(bar.artwork.as_deref(), Some("http://l/bar.png"));
        let urls: Vec<&str> = bar.streams.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a/bar.m3u8", "http://a/foo.m3u8"]);
        let labels: Vec<&str> = bar.streams.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Bar HD", "Foo"]);
        assert!(snapshot.channel("live:chfoo").is_none());
    }

    #[test]
    fn test_first_document_owns_channel_fields() {
        let snapshot = aggregate(&[SOURCE_A, SOURCE_B], &rules()).snapshot;

        let bar = snapshot.channel("live:chbar").unwrap();
        assert_eq!(bar.display_name, "Channel Bar");
        assert_eq!(bar.genres, vec!["News".to_string()]);
        assert_eq!(bar.streams.len(), 3);
        assert_eq!(bar.streams[2].url, "http://b/bar.m3u8");

        let ids: Vec<&str> = snapshot.channels.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["live:chbar", "live:plain", "live:extra"]);
    }

    #[test]
    fn test_remap_conflict_across_documents() {
        let first = "#EXTM3U\n#EXTINF:-1 tvg-id=\"chbar\",Bar\nhttp://a/bar\n";
        let second = "#EXTM3U\n#EXTINF:-1 tvg-id=\"chfoo\",Foo\nhttp://b/foo\n";

        let before = metrics::REMAP_CONFLICTS.get();
        let run = aggregate(&[first, second], &rules());

        assert_eq!(run.conflicts, 1);
        assert!(metrics::REMAP_CONFLICTS.get() > before);
        assert_eq!(run.snapshot.channels.len(), 1);
        let bar = run.snapshot.channel("live:chbar").unwrap();
        assert_eq!(bar.display_name, "Bar");
        let urls: Vec<&str> = bar.streams.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a/bar", "http://b/foo"]);
    }

    #[test]
    fn test_plain_duplicates_across_documents_do_not_conflict() {
        let doc = "#EXTM3U\n#EXTINF:-1 tvg-id=\"chbar\",Bar\nhttp://a/bar\n";
        let run = aggregate(&[doc, doc], &rules());

        assert_eq!(run.conflicts, 0);
        assert_eq!(run.snapshot.channel("live:chbar").unwrap().streams.len(), 2);
    }

    #[test]
    fn test_conflicts_within_document_are_counted() {
        let run = aggregate(&[SOURCE_A], &rules());
        assert_eq!(run.conflicts, 1);
    }

    #[test]
    fn test_genres_in_first_seen_order() {
        let snapshot = aggregate(&[SOURCE_A, SOURCE_B], &rules()).snapshot;

        let genres: Vec<&str> = snapshot.genres.iter().map(String::as_str).collect();
        assert_eq!(genres, vec![UNCATEGORIZED, "News", "Kids"]);
    }

    #[test]
    fn test_uncategorized_always_present() {
        let doc = "#EXTM3U\n#EXTINF:-1 group-title=\"News\",A\nhttp://cdn/a\n";
        let snapshot = aggregate(&[doc], &RuleSet::default()).snapshot;

        assert!(snapshot.genres.contains(UNCATEGORIZED));
        assert!(snapshot.genres.contains("News"));
    }

    #[test]
    fn test_default_genre() {
        let doc = "#EXTM3U\n#EXTINF:-1,A\nhttp://cdn/a\n";
        let snapshot = aggregate(&[doc], &RuleSet::default()).snapshot;

        assert_eq!(snapshot.channel("live:a").unwrap().genres, vec![UNCATEGORIZED.to_string()]);
    }

    #[test]
    fn test_guide_url_union() {
        let snapshot = aggregate(&[SOURCE_A, SOURCE_B], &rules()).snapshot;
        assert_eq!(snapshot.guide_url.as_deref(), Some("http://x/epg1,http://x/epg2"));
    }

    #[test]
    fn test_guide_url_absent() {
        let doc = "#EXTM3U\n#EXTINF:-1,A\nhttp://cdn/a\n";
        let snapshot = aggregate(&[doc, doc], &RuleSet::default()).snapshot;
        assert_eq!(snapshot.guide_url, None);
    }

    #[test]
    fn test_entry_order_decides_ownership() {
        let first = "#EXTINF:-1 tvg-id=\"x\" group-title=\"A\",One\nhttp://cdn/1\n";
        let second = "#EXTINF:-1 tvg-id=\"x\" group-title=\"B\",Two\nhttp://cdn/2\n";

        let forward = aggregate(&[format!("{}{}", first, second)], &RuleSet::default()).snapshot;
        let reverse = aggregate(&[format!("{}{}", second, first)], &RuleSet::default()).snapshot;

        assert_eq!(forward.channel("live:x").unwrap().display_name, "One");
        assert_eq!(forward.channel("live:x").unwrap().genres, vec!["A".to_string()]);
        assert_eq!(reverse.channel("live:x").unwrap().display_name, "Two");
        assert_eq!(reverse.channel("live:x").unwrap().genres, vec!["B".to_string()]);
    }

    #[test]
    fn test_idempotent_runs() {
        let first = serde_json::to_string(&aggregate(&[SOURCE_A, SOURCE_B], &rules()).snapshot).unwrap();
        let second = serde_json::to_string(&aggregate(&[SOURCE_A, SOURCE_B], &rules()).snapshot).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unique_identities_and_non_empty_streams() {
        let snapshot = aggregate(&[SOURCE_A, SOURCE_B, SOURCE_A], &rules()).snapshot;

        let mut seen = std::collections::HashSet::new();
        for channel in snapshot.channels.values() {
            assert!(seen.insert(channel.identity.clone()));
            assert!(!channel.streams.is_empty());
        }
        assert_eq!(snapshot.channel("live:chbar").unwrap().streams.len(), 5);
    }

    #[test]
    fn test_dangling_metadata_produces_no_channel() {
        let doc = "#EXTM3U\n#EXTINF:-1,Ghost\n#EXTINF:-1,Real\nhttp://cdn/real\n";
        let snapshot = aggregate(&[doc], &RuleSet::default()).snapshot;

        assert_eq!(snapshot.channels.len(), 1);
        assert!(snapshot.channel("live:ghost").is_none());
    }

    #[test]
    fn test_empty_input() {
        let documents: [&str; 0] = [];
        let snapshot = aggregate(&documents, &RuleSet::default()).snapshot;

        assert!(snapshot.channels.is_empty());
        assert_eq!(snapshot.genres.len(), 1);
        assert_eq!(snapshot.guide_url, None);
    }
}
