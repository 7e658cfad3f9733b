//! Natural logarithm and exponential over WAD fixed-point values.
//!
//! Both functions reduce their argument by powers of two and evaluate a
//! short series at 36-decimal working precision in 256-bit integers, then
//! round back to 18 decimals. Results are within one WAD unit of the exact
//! value across the supported range.

use ethnum::U256;
use sextant_types::{WAD, WAD_I};

use crate::{MathError, Result};

/// Working precision of the series evaluation (10^36).
const SCALE: u128 = 1_000_000_000_000_000_000_000_000_000_000_000_000;

/// `ln(2)` at 36 decimals.
const LN2_36: i128 = 693_147_180_559_945_309_417_232_121_458_176_568;

/// Largest exponent accepted by [`exp_wad`]. `e^47` in WAD still fits a `u128`.
pub const MAX_EXP_INPUT: i128 = 47 * WAD_I;

/// Exponents below this produce less than one WAD unit and return zero.
pub const MIN_EXP_INPUT: i128 = -42 * WAD_I;

/// Natural logarithm of a positive WAD value, as a signed WAD value.
///
/// # Errors
///
/// - [`MathError::NonPositiveLog`] if `x` is zero
///
/// # Examples
///
/// ```
/// use sextant_math::ln_wad;
/// use sextant_types::WAD;
///
/// assert_eq!(ln_wad(WAD).unwrap(), 0);
/// assert!(ln_wad(WAD / 2).unwrap() < 0);
/// ```
pub fn ln_wad(x: u128) -> Result<i128> {
    if x == 0 {
        return Err(MathError::NonPositiveLog);
    }

    // x = m * 2^k with m in [1, 2).
    let mut k: i128 = 0;
    let mut m = x;
    while m >= 2 * WAD {
        m >>= 1;
        k += 1;
    }
    while m < WAD {
        m <<= 1;
        k -= 1;
    }

    // ln(m) = 2 * atanh(z), z = (m - 1) / (m + 1) in [0, 1/3).
    let scale = U256::from(SCALE);
    let one = U256::from(WAD);
    let mantissa = U256::from(m);
    let z = (mantissa - one) * scale / (mantissa + one);
    let z_squared = z * z / scale;

    let mut sum = z;
    let mut term = z;
    let mut denominator = 3u32;
    loop {
        term = term * z_squared / scale;
        if term == U256::ZERO {
            break;
        }
        sum += term / U256::from(denominator);
        denominator += 2;
    }
    let ln_mantissa = (sum * U256::from(2u32)).as_i128();

    Ok(round_div(k * LN2_36 + ln_mantissa, WAD_I))
}

/// `e^x` for a signed WAD exponent, as a WAD value.
///
/// # Errors
///
/// - [`MathError::Overflow`] if `x` exceeds [`MAX_EXP_INPUT`]
pub fn exp_wad(x: i128) -> Result<u128> {
    if x > MAX_EXP_INPUT {
        return Err(MathError::Overflow("exp_wad"));
    }
    if x < MIN_EXP_INPUT {
        return Ok(0);
    }

    // x = n * ln2 + r with |r| <= ln2 / 2.
    let x_36 = x * WAD_I;
    let n = round_div(x_36, LN2_36);
    let r = x_36 - n * LN2_36;

    let scale = U256::from(SCALE);
    let r_abs = U256::from(r.unsigned_abs());
    let mut sum = scale;
    let mut term = scale;
    let mut i = 1u32;
    loop {
        term = term * r_abs / (scale * U256::from(i));
        if term == U256::ZERO {
            break;
        }
        sum += term;
        i += 1;
    }
    if r < 0 {
        sum = scale * scale / sum;
    }

    let wad = U256::from(WAD);
    let result = if n >= 0 {
        let shifted = sum << (n as u32);
        (shifted + wad / U256::from(2u32)) / wad
    } else {
        let denominator = wad << (n.unsigned_abs() as u32);
        (sum + denominator / U256::from(2u32)) / denominator
    };

    if result > U256::from(u128::MAX) {
        return Err(MathError::Overflow("exp_wad"));
    }
    Ok(result.as_u128())
}

/// Signed division rounding half away from zero.
fn round_div(value: i128, divisor: i128) -> i128 {
    let half = divisor / 2;
    if value >= 0 {
        (value + half) / divisor
    } else {
        (value - half) / divisor
    }
}
