//! Quote model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a quote.
///
/// Two namespaces exist: `local-<timestamp>-<nonce>` for records the remote
/// has not confirmed yet, and `remote-<id>` once a remote identity has been
/// adopted after a successful push (or received from a pull).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuoteId {
    /// Assigned at creation time, before the first successful push.
    Local {
        /// Creation timestamp (Unix ms)
        timestamp_ms: i64,
        /// Random disambiguator for ids created in the same millisecond
        nonce: String,
    },
    /// Identity confirmed by the remote feed.
    Remote(i64),
}

impl QuoteId {
    /// Create a fresh identifier in the `local-` namespace.
    #[must_use]
    pub fn new_local() -> Self {
        let nonce: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        Self::Local {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            nonce,
        }
    }

    /// Identifier in the `remote-` namespace for the given remote id.
    #[must_use]
    pub const fn remote(remote_id: i64) -> Self {
        Self::Remote(remote_id)
    }

    /// Whether this identifier belongs to the `remote-` namespace.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { timestamp_ms, nonce } => write!(f, "local-{timestamp_ms}-{nonce}"),
            Self::Remote(id) => write!(f, "remote-{id}"),
        }
    }
}

/// Error returned when a string is not a valid quote identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quote id: {0}")]
pub struct ParseQuoteIdError(String);

impl FromStr for QuoteId {
    type Err = ParseQuoteIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("remote-") {
            let id = rest
                .parse::<i64>()
                .map_err(|_| ParseQuoteIdError(s.to_string()))?;
            return Ok(Self::Remote(id));
        }

        if let Some(rest) = s.strip_prefix("local-") {
            let (timestamp, nonce) = rest
                .split_once('-')
                .ok_or_else(|| ParseQuoteIdError(s.to_string()))?;
            let timestamp_ms = timestamp
                .parse::<i64>()
                .map_err(|_| ParseQuoteIdError(s.to_string()))?;
            if nonce.is_empty() {
                return Err(ParseQuoteIdError(s.to_string()));
            }
            return Ok(Self::Local {
                timestamp_ms,
                nonce: nonce.to_string(),
            });
        }

        Err(ParseQuoteIdError(s.to_string()))
    }
}

impl Serialize for QuoteId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QuoteId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A quote in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Stable identifier; stays in the `local-` namespace until the remote
    /// confirms the record
    pub id: QuoteId,
    /// Quoted content
    pub text: String,
    /// Free-form category label
    pub category: String,
    /// Remote identity; `None` means "not yet synchronized"
    #[serde(default)]
    pub remote_id: Option<i64>,
    /// Last local mutation timestamp (Unix ms), informational only
    pub updated_at: i64,
}

impl Quote {
    /// Create a new local quote with a fresh `local-` identifier.
    #[must_use]
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: QuoteId::new_local(),
            text: text.into(),
            category: category.into(),
            remote_id: None,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Whether the record still awaits a successful push.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.remote_id.is_none()
    }

    /// Content equality: text and category both equal.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.text == other.text && self.category == other.category
    }
}
