//! Error types for source retrieval
//!
//! The transformation engine itself never fails; the only fatal outcome of a
//! catalog run is a source document that cannot be obtained.

use thiserror::Error;

/// Failure to obtain the text of one playlist source
#[derive(Error, Debug)]
pub enum SourceError {
    /// Server answered with a non-success status
    #[error("HTTP {status} while fetching {location}")]
    Http { location: String, status: u16 },

    /// Connection, timeout or body read failure
    #[error("Network error while fetching {location}: {message}")]
    Network { location: String, message: String },

    /// Document exceeds the configured size cap
    #[error("Playlist too large: {location} is {size_mb:.1}MB (limit {limit_mb}MB)")]
    TooLarge {
        location: String,
        size_mb: f64,
        limit_mb: usize,
    },

    /// Local file could not be read
    #[error("Failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote fetch failed and no cached copy exists
    #[error("Source unavailable: {location} ({reason})")]
    Unavailable { location: String, reason: String },

    #[error("Source is not valid UTF-8: {location}")]
    InvalidUtf8 { location: String },
}

impl SourceError {
    /// Whether the failure is worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Network { .. } => true,
            SourceError::Http { status, .. } => *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let network = SourceError::Network {
            location: "http://x".to_string(),
            message: "reset".to_string(),
        };
        let throttled = SourceError::Http {
            location: "http://x".to_string(),
            status: 429,
        };
        let missing = SourceError::Http {
            location: "http://x".to_string(),
            status: 404,
        };
        assert!(network.is_transient());
        assert!(throttled.is_transient());
        assert!(!missing.is_transient());
    }

    #[test]
    fn test_error_message() {
        let err = SourceError::TooLarge {
            location: "http://x/big.m3u".to_string(),
            size_mb: 120.4,
            limit_mb: 100,
        };
        assert_eq!(
            err.to_string(),
            "Playlist too large: http://x/big.m3u is 120.4MB (limit 100MB)"
        );
    }
}
