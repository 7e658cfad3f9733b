//! Notifications emitted by the oracle.

use serde::{Deserialize, Serialize};

use crate::AssetId;

/// Emitted after every recorded observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdated {
    /// Asset whose log changed.
    pub asset: AssetId,
    /// Time-step of the update.
    pub step: u64,
    /// Timestamp of the affected observation.
    pub timestamp: u64,
    /// Price reported by the price source, before clamping (WAD).
    pub raw_price: u128,
    /// Price actually recorded (WAD).
    pub price: u128,
    /// Whether a new entry was appended (`false` = same-step overwrite).
    pub appended: bool,
    /// Index of the affected observation within the retained log.
    pub index: usize,
}

impl PriceUpdated {
    /// Whether the manipulation guard substituted the raw price.
    pub fn was_clamped(&self) -> bool {
        self.raw_price != self.price
    }
}
