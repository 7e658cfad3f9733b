//! Per-asset observation log.
//!
//! The log is seeded with a neutral observation at registration and from
//! then on only grows through [`ObservationLog::record`]. At most one entry
//! is appended per time-step; later updates in the same step overwrite the
//! last entry in place. Once `capacity` entries are held, each append drops
//! the oldest one.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use sextant_types::{BlockClock, Observation, MAX_PRICE, NEUTRAL_PRICE};

use crate::guard::clamp;
use crate::query::extrapolate;
use crate::{OracleError, Result};

/// Per-asset bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    /// Position of the asset in the pool.
    pub index: usize,
    /// Time-step of the most recent observation.
    pub last_update_step: u64,
    /// Entries appended since the seed. This is also the round of the
    /// latest entry: it keeps counting after retention drops old entries.
    pub appended_total: u64,
}

/// Outcome of one [`ObservationLog::record`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    /// The observation as now stored.
    pub observation: Observation,
    /// Its index within the retained log.
    pub index: usize,
    /// Its round: the index it would have if nothing had been dropped.
    pub round: u64,
    /// `true` if a new entry was appended, `false` for a same-step overwrite.
    pub appended: bool,
}

/// A validated update that has not been applied yet.
///
/// Produced by [`ObservationLog::prepare`]; applying it with
/// [`ObservationLog::commit`] cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingObservation {
    observation: Observation,
    step: u64,
    appended: bool,
}

impl PendingObservation {
    /// The observation that will be stored.
    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    /// Whether committing appends a new entry.
    pub fn appends(&self) -> bool {
        self.appended
    }
}

/// Ordered observation history for one asset.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    observations: VecDeque<Observation>,
    state: TokenState,
    capacity: usize,
}

impl ObservationLog {
    /// Create a log holding only the neutral seed observation.
    pub fn seeded(index: usize, clock: BlockClock, capacity: usize) -> Self {
        let mut observations = VecDeque::with_capacity(capacity.min(1_024));
        observations.push_back(Observation::new(clock.timestamp, NEUTRAL_PRICE, 0));
        Self {
            observations,
            state: TokenState {
                index,
                last_update_step: clock.step,
                appended_total: 0,
            },
            capacity: capacity.max(2),
        }
    }

    /// Record a raw spot price, clamping it first.
    ///
    /// In a new time-step the price is clamped against the last entry and
    /// appended. Within the step of the last entry it is clamped against the
    /// entry before it (the price in effect when the step began) and
    /// overwrites the last entry, whose timestamp is kept. A new step that
    /// carries the same timestamp as the last entry collapses into an
    /// overwrite as well, so timestamps stay strictly increasing.
    ///
    /// # Errors
    ///
    /// - [`OracleError::NonMonotonicTimestamp`] if `clock.timestamp` precedes the last entry
    /// - [`OracleError::ArithmeticRange`] if the clamped price cannot be stored
    pub fn record(&mut self, raw_price: u128, clock: BlockClock, max_delta: u128) -> Result<Recorded> {
        let pending = self.prepare(raw_price, clock, max_delta)?;
        Ok(self.commit(pending))
    }

    /// Validate and clamp an update without touching the log.
    ///
    /// The result is only meaningful for this log and only until the log is
    /// next modified.
    ///
    /// # Errors
    ///
    /// Same as [`record`](Self::record).
    pub fn prepare(&self, raw_price: u128, clock: BlockClock, max_delta: u128) -> Result<PendingObservation> {
        let last = *self.last();
        if clock.timestamp < last.timestamp {
            return Err(OracleError::NonMonotonicTimestamp {
                new: clock.timestamp,
                last: last.timestamp,
            });
        }

        let appended = clock.step != self.state.last_update_step && clock.timestamp > last.timestamp;
        let observation = if appended {
            let accumulated_log_price = extrapolate(&last, clock.timestamp)?;
            let price = storable(clamp(raw_price, last.price, max_delta)?)?;
            Observation::new(clock.timestamp, price, accumulated_log_price)
        } else {
            let (step_start_price, accumulated_log_price) = match self.second_to_last() {
                Some(previous) => (previous.price, extrapolate(previous, last.timestamp)?),
                None => (NEUTRAL_PRICE, last.accumulated_log_price),
            };
            let price = storable(clamp(raw_price, step_start_price, max_delta)?)?;
            Observation::new(last.timestamp, price, accumulated_log_price)
        };

        Ok(PendingObservation {
            observation,
            step: clock.step,
            appended,
        })
    }

    /// Apply an update produced by [`prepare`](Self::prepare).
    pub fn commit(&mut self, pending: PendingObservation) -> Recorded {
        let PendingObservation {
            observation,
            step,
            appended,
        } = pending;
        if appended {
            self.observations.push_back(observation);
            if self.observations.len() > self.capacity {
                self.observations.pop_front();
            }
            self.state.appended_total += 1;
        } else if let Some(slot) = self.observations.back_mut() {
            *slot = observation;
        }
        self.state.last_update_step = step;

        Recorded {
            observation,
            index: self.observations.len() - 1,
            round: self.state.appended_total,
            appended,
        }
    }

    /// The most recent observation.
    pub fn last(&self) -> &Observation {
        // A log always holds at least its seed entry.
        &self.observations[self.observations.len() - 1]
    }

    /// The oldest retained observation.
    pub fn first(&self) -> &Observation {
        &self.observations[0]
    }

    /// Observation at `index`, oldest first.
    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    /// All retained observations, oldest first.
    pub fn observations(&self) -> &VecDeque<Observation> {
        &self.observations
    }

    /// Number of retained observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always `false`: the seed entry is never removed without a successor.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Per-asset bookkeeping.
    pub fn state(&self) -> TokenState {
        self.state
    }

    /// Retention cap.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Round of the latest entry. Equals `len() - 1` until retention starts
    /// dropping entries, and keeps increasing afterwards.
    pub fn latest_round(&self) -> u64 {
        self.state.appended_total
    }

    fn second_to_last(&self) -> Option<&Observation> {
        let len = self.observations.len();
        if len >= 2 {
            self.observations.get(len - 2)
        } else {
            None
        }
    }
}

fn storable(price: u128) -> Result<u128> {
    if price == 0 || price > MAX_PRICE {
        return Err(OracleError::ArithmeticRange(format!(
            "price {price} outside storable range 1..={MAX_PRICE}"
        )));
    }
    Ok(price)
}
