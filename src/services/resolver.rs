//! Identity resolution and channel merging
//!
//! Applies remap rules to each draft's identity, then either creates a new
//! channel or appends the draft's stream to the channel already holding that
//! identity. The first channel seen for an identity owns its name, genre and
//! artwork; later drafts only contribute streams.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::models::{namespaced_identity, Channel};
use crate::services::metrics;
use crate::services::normalizer::ChannelDraft;
use crate::services::remap::RuleSet;

/// What happened to a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New channel created
    Created,
    /// Stream appended to an existing channel
    Merged { conflict: bool },
    /// Draft had no usable identity
    Skipped,
}

/// Pre-remap key that created a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub key: String,
    pub remapped: bool,
}

impl Origin {
    /// Whether `incoming` landing on a channel created by `self` is a remap collision
    pub fn conflicts_with(&self, incoming: &Origin) -> bool {
        self.key != incoming.key && (self.remapped || incoming.remapped)
    }
}

/// Log and count a remap collision on `key`
pub fn report_conflict(owner: &Origin, incoming: &Origin, key: &str) {
    tracing::warn!(
        "Remap conflict: {} resolves to {} which already belongs to {}",
        incoming.key,
        key,
        owner.key
    );
    metrics::REMAP_CONFLICTS.inc();
}

/// Counters for one resolution pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub created: usize,
    pub merged: usize,
    pub remapped: usize,
    pub conflicts: usize,
    pub skipped: usize,
}

/// Resolves drafts of one document into channels keyed by identity
pub struct Resolver<'r> {
    rules: &'r RuleSet,
    channels: IndexMap<String, Channel>,
    origins: HashMap<String, Origin>,
    stats: ResolveStats,
}

impl<'r> Resolver<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self {
            rules,
            channels: IndexMap::new(),
            origins: HashMap::new(),
            stats: ResolveStats::default(),
        }
    }

    pub fn resolve(&mut self, draft: ChannelDraft) -> MergeOutcome {
        if draft.identity.is_empty() {
            tracing::debug!("Entry without identity skipped: {}", draft.stream.url);
            self.stats.skipped += 1;
            return MergeOutcome::Skipped;
        }

        let original = draft.identity;
        let (key, remapped) = match self.rules.lookup(&original) {
            Some(canonical) => {
                tracing::info!("Remapped channel {} -> {}", original, canonical);
                self.stats.remapped += 1;
                (canonical.to_lowercase(), true)
            }
            None => (original.clone(), false),
        };
        let identity = namespaced_identity(&key);

        let incoming = Origin {
            key: original,
            remapped,
        };

        if let Some(existing) = self.channels.get_mut(&identity) {
            let conflict = match self.origins.get(&identity) {
                Some(owner) if owner.conflicts_with(&incoming) => {
                    report_conflict(owner, &incoming, &key);
                    true
                }
                _ => false,
            };
            if conflict {
                self.stats.conflicts += 1;
            }

            existing.streams.push(draft.stream);
            self.stats.merged += 1;
            return MergeOutcome::Merged { conflict };
        }

        let mut attributes = draft.attributes;
        attributes.insert("id".to_string(), key.clone());
        attributes.insert("name".to_string(), draft.display_name.clone());

        let channel = Channel {
            identity: identity.clone(),
            display_name: draft.display_name,
            genres: vec![draft.genre],
            artwork: draft.artwork,
            streams: vec![draft.stream],
            source_attributes: attributes,
        };

        self.origins.insert(identity.clone(), incoming);
        self.channels.insert(identity, channel);
        self.stats.created += 1;

        MergeOutcome::Created
    }

    pub fn stats(&self) -> ResolveStats {
        self.stats
    }

    pub fn into_channels(self) -> IndexMap<String, Channel> {
        self.channels
    }

    /// Channels plus the origin of each, keyed by identity
    pub fn into_parts(self) -> (IndexMap<String, Channel>, HashMap<String, Origin>) {
        (self.channels, self.origins)
    }
}
