//! External price-feed data shape.

use serde::{Deserialize, Serialize};

/// A price-feed round as reported to third-party consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    /// Round identifier.
    pub round_id: u64,
    /// Price, scaled by the feed's `decimals()`.
    pub answer: i128,
    /// Timestamp the round started.
    pub started_at: u64,
    /// Timestamp the round was last updated.
    pub updated_at: u64,
    /// Round in which the answer was computed.
    pub answered_in_round: u64,
}
