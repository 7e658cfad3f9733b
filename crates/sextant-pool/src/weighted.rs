//! Constant-weight pool spot price.
//!
//! ```text
//! price(x) = (B_ref / W_ref) / (B_x / W_x)
//! ```

use sextant_math::mul_div;
use sextant_oracle::PriceSource;
use sextant_types::{AssetId, PoolKind, PoolState, WAD};

use crate::{required_balance, source_error, PoolError, Result};

/// Prices assets of a constant-weight pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightedPriceSource;

impl WeightedPriceSource {
    /// WAD price of `asset` in `reference` units.
    pub fn spot_price(&self, asset: &AssetId, reference: &AssetId, pool: &PoolState) -> Result<u128> {
        let PoolKind::Weighted { weights } = &pool.kind else {
            return Err(PoolError::WrongPoolKind {
                expected: "weighted",
            });
        };
        let weight = |id: &AssetId| match weights.get(id) {
            Some(w) if *w > 0 => Ok(*w),
            _ => Err(PoolError::ZeroWeight(id.clone())),
        };

        let balance_asset = required_balance(pool, asset)?;
        let balance_reference = required_balance(pool, reference)?;
        let weight_asset = weight(asset)?;
        let weight_reference = weight(reference)?;

        // B_ref * W_x / W_ref, then divided by B_x.
        let scaled_reference = mul_div(balance_reference, weight_asset, weight_reference)?;
        Ok(mul_div(scaled_reference, WAD, balance_asset)?)
    }
}

impl PriceSource for WeightedPriceSource {
    fn compute_price(
        &self,
        asset: &AssetId,
        reference: &AssetId,
        pool: &PoolState,
    ) -> sextant_oracle::Result<u128> {
        self.spot_price(asset, reference, pool)
            .map_err(|err| source_error(asset, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use sextant_oracle::OracleError;

    fn pool(entries: &[(&str, u128, u128)]) -> PoolState {
        PoolState {
            balances: entries.iter().map(|(a, b, _)| (AssetId::from(*a), *b)).collect(),
            kind: PoolKind::Weighted {
                weights: entries.iter().map(|(a, _, w)| (AssetId::from(*a), *w)).collect(),
            },
        }
    }

    #[test]
    fn test_equal_weights_is_balance_ratio() {
        let state = pool(&[("X", 100 * WAD, WAD / 2), ("USD", 250 * WAD, WAD / 2)]);
        let price = WeightedPriceSource
            .spot_price(&AssetId::from("X"), &AssetId::from("USD"), &state)
            .expect("price");
        assert_eq!(price, 5 * WAD / 2);
    }

    #[test]
    fn test_eighty_twenty_pool() {
        // 80% X, 20% USD: price = (200 / 0.2) / (100 / 0.8) = 8.
        let state = pool(&[("X", 100 * WAD, 8 * WAD / 10), ("USD", 200 * WAD, 2 * WAD / 10)]);
        let price = WeightedPriceSource
            .spot_price(&AssetId::from("X"), &AssetId::from("USD"), &state)
            .expect("price");
        assert_eq!(price, 8 * WAD);
    }

    #[test]
    fn test_missing_and_zero_inputs() {
        let state = pool(&[("X", 0, WAD / 2), ("USD", WAD, 0)]);
        let source = WeightedPriceSource;
        assert_eq!(
            source.spot_price(&AssetId::from("X"), &AssetId::from("USD"), &state),
            Err(PoolError::ZeroBalance(AssetId::from("X")))
        );
        assert_eq!(
            source.spot_price(&AssetId::from("Y"), &AssetId::from("USD"), &state),
            Err(PoolError::MissingAsset(AssetId::from("Y")))
        );
        let state = pool(&[("X", WAD, WAD / 2), ("USD", WAD, 0)]);
        assert_eq!(
            source.spot_price(&AssetId::from("X"), &AssetId::from("USD"), &state),
            Err(PoolError::ZeroWeight(AssetId::from("USD")))
        );
    }

    #[test]
    fn test_wrong_pool_kind() {
        let state = PoolState {
            balances: BTreeMap::new(),
            kind: PoolKind::Stable {
                amplification: 100,
                invariant: None,
            },
        };
        let err = WeightedPriceSource
            .compute_price(&AssetId::from("X"), &AssetId::from("USD"), &state)
            .expect_err("wrong kind");
        assert!(matches!(err, OracleError::PriceSource { .. }));
    }
}
