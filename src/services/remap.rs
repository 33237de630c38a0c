//! Channel ID remap rules
//!
//! Operator-supplied `source=canonical` lines that rewrite a playlist-derived
//! identity before channels are merged. Both sides are case-insensitive.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

/// Immutable lookup table from source key to canonical key (both lower-cased)
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, String>,
}

impl RuleSet {
    /// Parse a rule file body. Returns the rules and the number of malformed lines skipped.
    pub fn parse(text: &str) -> (Self, usize) {
        let mut rules = HashMap::new();
        let mut skipped = 0usize;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("Remap line {} skipped: missing '='", index + 1);
                skipped += 1;
                continue;
            };

            let key = key.trim().to_lowercase();
            let value = value.trim().to_lowercase();
            if key.is_empty() || value.is_empty() {
                tracing::warn!("Remap line {} skipped: empty key or value", index + 1);
                skipped += 1;
                continue;
            }

            rules.insert(key, value);
        }

        (Self { rules }, skipped)
    }

    /// Load the rule file. A missing file or any read failure yields an empty set.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        match fs::read_to_string(path).await {
            Ok(text) => {
                let (rules, skipped) = Self::parse(&text);
                tracing::info!(
                    "Loaded {} remap rules from {} ({} malformed lines skipped)",
                    rules.len(),
                    path.display(),
                    skipped
                );
                rules
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No remap file at {}, remapping disabled", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read remap file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Canonical key for `key`, if a rule exists
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.rules.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
