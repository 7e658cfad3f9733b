//! Stable-swap pool invariant and marginal price.
//!
//! For `n` assets with balances `x_i`, amplification `A` and invariant `D`:
//!
//! ```text
//! A n^n S + D = A n^n D + D^(n+1) / (n^n P)      S = sum x_i, P = prod x_i
//! ```
//!
//! With `D_P = D^(n+1) / (n^n P)`, the partial derivative of the invariant
//! with respect to `x_i` is `A n^n + D_P / x_i`, and the marginal price of
//! `x` in units of `ref` is the ratio of the two partials.

use ethnum::U256;
use sextant_math::MathError;
use sextant_oracle::PriceSource;
use sextant_types::{AssetId, PoolKind, PoolState, WAD};

use crate::{required_balance, source_error, PoolError, Result};

/// Newton iterations before giving up on the invariant.
pub const MAX_INVARIANT_ROUNDS: usize = 255;

/// Prices assets of a stable-swap pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StablePriceSource;

impl StablePriceSource {
    /// WAD price of `asset` in `reference` units.
    pub fn spot_price(&self, asset: &AssetId, reference: &AssetId, pool: &PoolState) -> Result<u128> {
        let PoolKind::Stable {
            amplification,
            invariant,
        } = &pool.kind
        else {
            return Err(PoolError::WrongPoolKind { expected: "stable" });
        };

        let balance_asset = U256::from(required_balance(pool, asset)?);
        let balance_reference = U256::from(required_balance(pool, reference)?);
        let balances = nonzero_balances(pool)?;
        let d = match invariant {
            Some(d) => U256::from(*d),
            None => U256::from(stable_invariant(*amplification, &balances)?),
        };

        let ann = U256::from(amp_times_n_pow_n(*amplification, balances.len())?);
        let d_p = d_product(d, &balances);
        let wad = U256::from(WAD);

        let partial_asset = ann * wad + d_p * wad / balance_asset;
        let partial_reference = ann * wad + d_p * wad / balance_reference;
        let price = partial_asset * wad / partial_reference;
        if price > U256::from(u128::MAX) {
            return Err(PoolError::Math(MathError::Overflow("stable price")));
        }
        Ok(price.as_u128())
    }
}

impl PriceSource for StablePriceSource {
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

/// Solve the stable-swap invariant `D` for WAD balances by Newton iteration.
///
/// # Errors
///
/// - [`PoolError::InvalidAmplification`] if `amplification` is zero
/// - [`PoolError::TooFewAssets`] for fewer than two balances
/// - [`PoolError::InvariantDidNotConverge`] if iteration does not settle
pub fn stable_invariant(amplification: u128, balances: &[u128]) -> Result<u128> {
    let ann = U256::from(amp_times_n_pow_n(amplification, balances.len())?);
    let n = U256::from(balances.len() as u128);
    let sum = balances
        .iter()
        .fold(U256::ZERO, |acc, balance| acc + U256::from(*balance));
    if sum == U256::ZERO {
        return Ok(0);
    }
    if balances.contains(&0) {
        return Err(PoolError::Math(MathError::DivisionByZero(
            "stable invariant with an empty balance",
        )));
    }

    let one = U256::ONE;
    let mut d = sum;
    for round in 0..MAX_INVARIANT_ROUNDS {
        let d_p = d_product(d, balances);
        let previous = d;
        d = (ann * sum + d_p * n) * d / ((ann - one) * d + (n + one) * d_p);
        let delta = if d > previous { d - previous } else { previous - d };
        if delta <= one {
            tracing::trace!(rounds = round + 1, "stable invariant converged");
            if d > U256::from(u128::MAX) {
                return Err(PoolError::Math(MathError::Overflow("stable invariant")));
            }
            return Ok(d.as_u128());
        }
    }
    Err(PoolError::InvariantDidNotConverge)
}

/// `D^(n+1) / (n^n * prod(x))`, folded one balance at a time.
fn d_product(d: U256, balances: &[u128]) -> U256 {
    let n = U256::from(balances.len() as u128);
    balances
        .iter()
        .fold(d, |d_p, balance| d_p * d / (U256::from(*balance) * n))
}

fn amp_times_n_pow_n(amplification: u128, n: usize) -> Result<u128> {
    if amplification == 0 {
        return Err(PoolError::InvalidAmplification(amplification));
    }
    if n < 2 {
        return Err(PoolError::TooFewAssets(n));
    }
    let exponent = u32::try_from(n).map_err(|_| PoolError::TooFewAssets(n))?;
    (n as u128)
        .checked_pow(exponent)
        .and_then(|n_pow_n| n_pow_n.checked_mul(amplification))
        .ok_or(PoolError::Math(MathError::Overflow("A * n^n")))
}

fn nonzero_balances(pool: &PoolState) -> Result<Vec<u128>> {
    pool.balances
        .keys()
        .map(|asset| required_balance(pool, asset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(x: u128, y: u128, amplification: u128) -> PoolState {
        PoolState {
            balances: [(AssetId::from("X"), x), (AssetId::from("USD"), y)]
                .into_iter()
                .collect(),
            kind: PoolKind::Stable {
                amplification,
                invariant: None,
            },
        }
    }

    fn price(state: &PoolState) -> u128 {
        StablePriceSource
            .spot_price(&AssetId::from("X"), &AssetId::from("USD"), state)
            .expect("price")
    }

    #[test]
    fn test_balanced_invariant_is_sum() {
        let d = stable_invariant(100, &[1_000 * WAD, 1_000 * WAD]).expect("invariant");
        assert!(d.abs_diff(2_000 * WAD) <= 2);
    }

    #[test]
    fn test_invariant_satisfies_equation() {
        let (x, y, a) = (1_500 * WAD, 500 * WAD, 50u128);
        let d = stable_invariant(a, &[x, y]).expect("invariant") as f64;
        let (x, y, a) = (x as f64, y as f64, a as f64);
        let lhs = 4.0 * a * (x + y) + d;
        let rhs = 4.0 * a * d + d.powi(3) / (4.0 * x * y);
        assert!(((lhs - rhs) / lhs).abs() < 1e-9);
    }

    #[test]
    fn test_balanced_pool_prices_at_par() {
        let p = price(&pool(1_000 * WAD, 1_000 * WAD, 100));
        assert!(p.abs_diff(WAD) <= 2, "price {p}");
    }

    #[test]
    fn test_scarce_asset_trades_above_par() {
        let p = price(&pool(500 * WAD, 1_500 * WAD, 100));
        assert!(p > WAD);
        // Flatter than constant product (y / x = 3).
        assert!(p < 3 * WAD);
    }

    #[test]
    fn test_amplification_flattens_curve() {
        let low = price(&pool(500 * WAD, 1_500 * WAD, 1));
        let high = price(&pool(500 * WAD, 1_500 * WAD, 1_000));
        assert!(low > high && high > WAD);
    }

    #[test]
    fn test_supplied_invariant_is_used() {
        let mut state = pool(1_000 * WAD, 1_000 * WAD, 100);
        let solved = price(&state);
        state.kind = PoolKind::Stable {
            amplification: 100,
            invariant: Some(2_000 * WAD),
        };
        assert!(price(&state).abs_diff(solved) <= 2);
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(
            stable_invariant(0, &[WAD, WAD]),
            Err(PoolError::InvalidAmplification(0))
        );
        assert_eq!(stable_invariant(10, &[WAD]), Err(PoolError::TooFewAssets(1)));
        assert_eq!(stable_invariant(10, &[0, 0]).expect("empty"), 0);
        assert!(matches!(
            stable_invariant(10, &[WAD, 0]),
            Err(PoolError::Math(_))
        ));
        assert_eq!(
            StablePriceSource.spot_price(
                &AssetId::from("X"),
                &AssetId::from("USD"),
                &pool(0, WAD, 10)
            ),
            Err(PoolError::ZeroBalance(AssetId::from("X")))
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_cross_prices_are_reciprocal(
                x in 1_000u128..1_000_000,
                y in 1_000u128..1_000_000,
                amplification in 1u128..5_000,
            ) {
                let state = pool(x * WAD, y * WAD, amplification);
                let forward = StablePriceSource
                    .spot_price(&AssetId::from("X"), &AssetId::from("USD"), &state)
                    .expect("forward");
                let backward = StablePriceSource
                    .spot_price(&AssetId::from("USD"), &AssetId::from("X"), &state)
                    .expect("backward");
                let product = sextant_math::wad_mul(forward, backward).expect("product");
                prop_assert!(product.abs_diff(WAD) <= WAD / 1_000_000_000, "product {}", product);
            }
        }
    }
}
