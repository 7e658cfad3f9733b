//! Pool state snapshots handed to price sources on every trade.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::AssetId;

/// Reserves and pricing parameters of a pool at the moment of a trade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Asset balances, WAD-scaled.
    pub balances: BTreeMap<AssetId, u128>,
    /// Pool-type specific parameters.
    pub kind: PoolKind,
}

/// Pricing formula parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolKind {
    /// Constant-weight pool. Weights are WAD fractions.
    Weighted {
        /// Normalized weight per asset.
        weights: BTreeMap<AssetId, u128>,
    },
    /// Stable-swap pool.
    Stable {
        /// Amplification coefficient `A` (plain integer).
        amplification: u128,
        /// Invariant `D` (WAD). Solved from the balances when absent.
        invariant: Option<u128>,
    },
}

impl PoolState {
    /// Balance of `asset`, if the pool holds it.
    pub fn balance(&self, asset: &AssetId) -> Option<u128> {
        self.balances.get(asset).copied()
    }
}
