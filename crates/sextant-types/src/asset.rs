//! Asset identifiers and the explicit host clock.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a pool asset (a token symbol or address string).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Build an asset id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The host's notion of "now", passed explicitly into every mutating call.
///
/// `step` is the discrete time-step (block number). At most one observation
/// is appended per asset per step; later updates in the same step overwrite
/// the last entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockClock {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Discrete time-step counter.
    pub step: u64,
}

impl BlockClock {
    /// Create a clock reading.
    pub fn new(timestamp: u64, step: u64) -> Self {
        Self { timestamp, step }
    }
}
