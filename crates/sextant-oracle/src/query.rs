//! Windowed geometric-mean queries.
//!
//! ```text
//! geomean = exp((acc(now) - acc(now - window)) / window)
//! ```
//!
//! where `acc(t)` extends the nearest observation at or before `t` with that
//! observation's log-price held constant up to `t`.

use std::collections::VecDeque;

use sextant_math::{exp_wad, ln_wad, rescale};
use sextant_types::{Observation, WAD_DECIMALS};

use crate::log::ObservationLog;
use crate::{OracleConfig, OracleError, Result};

/// A timestamp-ordered sequence that [`locate`] can search.
pub trait Timeline {
    /// Number of entries.
    fn len(&self) -> usize;

    /// Timestamp of the entry at `index` (`index < len()`).
    fn timestamp_at(&self, index: usize) -> u64;

    /// Whether the sequence has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Timeline for [u64] {
    fn len(&self) -> usize {
        <[u64]>::len(self)
    }

    fn timestamp_at(&self, index: usize) -> u64 {
        self[index]
    }
}

impl Timeline for [Observation] {
    fn len(&self) -> usize {
        <[Observation]>::len(self)
    }

    fn timestamp_at(&self, index: usize) -> u64 {
        self[index].timestamp
    }
}

impl Timeline for VecDeque<Observation> {
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn timestamp_at(&self, index: usize) -> u64 {
        self[index].timestamp
    }
}

/// Index of the latest entry whose timestamp does not exceed `target`.
///
/// `hint` seeds the lower search bound. A hint that is out of range or whose
/// timestamp is already past `target` is ignored; it can only make the search
/// faster, never change the answer.
///
/// # Errors
///
/// - [`OracleError::InsufficientHistory`] if the timeline is empty or
///   `target` is at or before its first timestamp
pub fn locate<T: Timeline + ?Sized>(timeline: &T, target: u64, hint: usize) -> Result<usize> {
    if timeline.is_empty() || target <= timeline.timestamp_at(0) {
        return Err(OracleError::InsufficientHistory { target });
    }

    let last = timeline.len() - 1;
    if target >= timeline.timestamp_at(last) {
        return Ok(last);
    }

    // Invariant: timestamp(low) <= target < timestamp(high).
    let mut low = if hint < last && timeline.timestamp_at(hint) <= target {
        hint
    } else {
        0
    };
    let mut high = last;
    while high - low > 1 {
        let mid = low + (high - low) / 2;
        let timestamp = timeline.timestamp_at(mid);
        if timestamp == target {
            return Ok(mid);
        }
        if timestamp < target {
            low = mid;
        } else {
            high = mid;
        }
    }
    Ok(low)
}

/// Accumulated log-price at `at`, holding `observation.price` constant from
/// the observation's own timestamp.
///
/// # Errors
///
/// - [`OracleError::NonMonotonicTimestamp`] if `at` precedes the observation
/// - [`OracleError::ArithmeticRange`] if the integral overflows
pub fn extrapolate(observation: &Observation, at: u64) -> Result<i128> {
    let elapsed = at
        .checked_sub(observation.timestamp)
        .ok_or(OracleError::NonMonotonicTimestamp {
            new: at,
            last: observation.timestamp,
        })?;
    if elapsed == 0 {
        return Ok(observation.accumulated_log_price);
    }
    let log_price = ln_wad(observation.price)?;
    i128::from(elapsed)
        .checked_mul(log_price)
        .and_then(|delta| observation.accumulated_log_price.checked_add(delta))
        .ok_or_else(|| {
            OracleError::ArithmeticRange(format!(
                "accumulated log-price overflow extrapolating to {at}"
            ))
        })
}

/// Time-weighted geometric-mean price over `[now - window, now]`.
///
/// The result is expressed with `config.price_decimals` fractional digits.
///
/// # Errors
///
/// - [`OracleError::InvalidPeriod`] if `window` is zero or above `config.max_window`
/// - [`OracleError::InsufficientHistory`] if the log does not reach back to `now - window`
/// - [`OracleError::NonMonotonicTimestamp`] if `now` precedes the latest observation
/// - [`OracleError::ArithmeticRange`] if the result cannot be represented
pub fn geomean_price(
    log: &ObservationLog,
    window: u64,
    now: u64,
    hint: usize,
    config: &OracleConfig,
) -> Result<u128> {
    if window == 0 || window > config.max_window {
        return Err(OracleError::InvalidPeriod {
            window,
            max_window: config.max_window,
        });
    }
    let start = now
        .checked_sub(window)
        .ok_or(OracleError::InsufficientHistory { target: 0 })?;

    let end_accumulator = extrapolate(log.last(), now)?;
    let start_index = locate(log.observations(), start, hint)?;
    let start_accumulator = extrapolate(&log.observations()[start_index], start)?;

    let mean_log_price = average_log_price(end_accumulator, start_accumulator, window)?;
    let price = exp_wad(mean_log_price)?;
    Ok(rescale(price, WAD_DECIMALS, config.price_decimals)?)
}

/// Mean log-price between two accumulator readings `window` seconds apart.
fn average_log_price(end: i128, start: i128, window: u64) -> Result<i128> {
    end.checked_sub(start)
        .and_then(|delta| delta.checked_div(i128::from(window)))
        .ok_or_else(|| {
            OracleError::ArithmeticRange(format!(
                "accumulated log-price difference out of range over {window}s"
            ))
        })
}
