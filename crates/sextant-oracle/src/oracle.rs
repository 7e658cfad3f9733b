//! The oracle engine bound to one pool.
//!
//! A [`GeomeanOracle`] owns one [`ObservationLog`] per non-reference asset.
//! Registration happens once through `&mut self`; afterwards every operation
//! takes `&self`, so the engine can be shared behind an `Arc`. Writes to an
//! asset's log hold that log's write lock for the whole update, and queries
//! hold its read lock, so a reader never sees a half-written entry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use sextant_types::{AssetId, BlockClock, Observation, PoolState, PriceUpdated};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::EventBus;
use crate::log::{ObservationLog, Recorded};
use crate::query::geomean_price;
use crate::source::PriceSource;
use crate::{OracleConfig, OracleError, Result};

/// Latest observation of an asset together with its position.
///
/// `index` addresses the retained log and is what
/// [`GeomeanOracle::get_observation`] and search hints take. `round` counts
/// every entry ever appended and never stops advancing, so it is the value
/// to expose to consumers that detect stale data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestObservation {
    /// The observation.
    pub observation: Observation,
    /// Its index within the retained log (`len - 1`).
    pub index: usize,
    /// Appends since registration; the seed is round 0.
    pub round: u64,
}

struct Registration {
    reference: AssetId,
    assets: Vec<AssetId>,
    logs: HashMap<AssetId, RwLock<ObservationLog>>,
}

/// Time-weighted geometric-mean price oracle for one pool.
pub struct GeomeanOracle {
    config: OracleConfig,
    source: Box<dyn PriceSource>,
    registration: Option<Registration>,
    events: EventBus,
}

impl GeomeanOracle {
    /// Build an unregistered oracle around a price strategy.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidConfig`] if `config` fails validation
    pub fn new(config: OracleConfig, source: impl PriceSource + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source: Box::new(source),
            registration: None,
            events: EventBus::default(),
        })
    }

    /// Bind the oracle to the pool's assets and seed one neutral observation
    /// per non-reference asset at `clock`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::AlreadyRegistered`] on a second call
    /// - [`OracleError::DuplicateAsset`] if an asset is listed twice
    /// - [`OracleError::ReferenceAssetMissing`] if `reference` is not in `assets`
    pub fn register(&mut self, assets: &[AssetId], reference: AssetId, clock: BlockClock) -> Result<()> {
        if self.registration.is_some() {
            return Err(OracleError::AlreadyRegistered);
        }
        for (position, asset) in assets.iter().enumerate() {
            if assets[..position].contains(asset) {
                return Err(OracleError::DuplicateAsset(asset.clone()));
            }
        }
        if !assets.contains(&reference) {
            return Err(OracleError::ReferenceAssetMissing(reference));
        }

        let logs = assets
            .iter()
            .enumerate()
            .filter(|(_, asset)| **asset != reference)
            .map(|(index, asset)| {
                let log = ObservationLog::seeded(index, clock, self.config.max_observations);
                (asset.clone(), RwLock::new(log))
            })
            .collect();

        info!(
            assets = assets.len(),
            reference = %reference,
            timestamp = clock.timestamp,
            step = clock.step,
            "oracle registered"
        );
        self.registration = Some(Registration {
            reference,
            assets: assets.to_vec(),
            logs,
        });
        Ok(())
    }

    /// Record the prices implied by a trade between `asset_in` and `asset_out`.
    ///
    /// Each side that is not the reference asset is priced from `pool` and
    /// recorded. The update is all-or-nothing: both logs are locked (in
    /// asset order), both updates are validated, and only then are both
    /// written and their events emitted.
    ///
    /// # Errors
    ///
    /// - [`OracleError::AssetNotRegistered`] if a non-reference side is unknown
    /// - [`OracleError::PriceSource`] if the strategy cannot price a side
    /// - any error of [`record_observation`](Self::record_observation)
    pub fn on_trade(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        pool: &PoolState,
        clock: BlockClock,
    ) -> Result<Vec<PriceUpdated>> {
        let registration = self.registration_for(asset_in)?;
        let mut sides = vec![asset_in];
        if asset_out != asset_in {
            sides.push(asset_out);
        }

        let mut priced = Vec::with_capacity(sides.len());
        for asset in sides {
            if *asset == registration.reference {
                continue;
            }
            if !registration.logs.contains_key(asset) {
                return Err(OracleError::AssetNotRegistered(asset.clone()));
            }
            let raw_price = self
                .source
                .compute_price(asset, &registration.reference, pool)?;
            priced.push((asset, raw_price));
        }

        // Lock in a fixed order so concurrent trades cannot deadlock.
        let mut order: Vec<usize> = (0..priced.len()).collect();
        order.sort_by(|a, b| priced[*a].0.cmp(priced[*b].0));
        let mut logs = Vec::with_capacity(order.len());
        for position in order {
            logs.push((position, self.write_log(priced[position].0)?));
        }

        let max_delta = self.config.max_price_delta();
        let pending = logs
            .iter()
            .map(|(position, log)| log.prepare(priced[*position].1, clock, max_delta))
            .collect::<Result<Vec<_>>>()?;
        let mut recorded: Vec<(usize, Recorded)> = logs
            .iter_mut()
            .zip(pending)
            .map(|((position, log), pending)| (*position, log.commit(pending)))
            .collect();
        drop(logs);

        recorded.sort_by_key(|(position, _)| *position);
        Ok(recorded
            .into_iter()
            .map(|(position, recorded)| {
                let (asset, raw_price) = priced[position];
                self.publish(asset, raw_price, clock, recorded)
            })
            .collect())
    }

    /// Clamp and record one raw price for `asset`.
    ///
    /// # Errors
    ///
    /// - [`OracleError::AssetNotRegistered`] if `asset` has no log
    /// - [`OracleError::NonMonotonicTimestamp`] if `clock` runs backwards
    /// - [`OracleError::ArithmeticRange`] if the price cannot be stored
    pub fn record_observation(&self, asset: &AssetId, raw_price: u128, clock: BlockClock) -> Result<PriceUpdated> {
        let recorded = {
            let mut log = self.write_log(asset)?;
            log.record(raw_price, clock, self.config.max_price_delta())?
        };
        Ok(self.publish(asset, raw_price, clock, recorded))
    }

    fn publish(&self, asset: &AssetId, raw_price: u128, clock: BlockClock, recorded: Recorded) -> PriceUpdated {
        let event = PriceUpdated {
            asset: asset.clone(),
            step: clock.step,
            timestamp: recorded.observation.timestamp,
            raw_price,
            price: recorded.observation.price,
            appended: recorded.appended,
            index: recorded.index,
        };
        if event.was_clamped() {
            warn!(
                asset = %asset,
                raw_price,
                price = event.price,
                step = clock.step,
                "price clamped by manipulation guard"
            );
        } else {
            debug!(
                asset = %asset,
                price = event.price,
                step = clock.step,
                round = recorded.round,
                appended = event.appended,
                "price recorded"
            );
        }
        self.events.emit(event.clone());
        event
    }

    /// Most recently recorded (clamped) price.
    ///
    /// This value can be pushed by up to the per-step clamp within a single
    /// step and must not be used for settlement; use
    /// [`get_geomean_price`](Self::get_geomean_price) instead.
    pub fn get_last_price(&self, asset: &AssetId) -> Result<u128> {
        Ok(self.read_log(asset)?.last().price)
    }

    /// Geometric-mean price of `asset` over `[now - window, now]`.
    pub fn get_geomean_price(&self, asset: &AssetId, window: u64, now: u64) -> Result<u128> {
        self.get_geomean_price_with_hint(asset, window, now, 0)
    }

    /// [`get_geomean_price`](Self::get_geomean_price) with a search hint: the
    /// index of an observation expected to precede `now - window`.
    pub fn get_geomean_price_with_hint(&self, asset: &AssetId, window: u64, now: u64, hint: usize) -> Result<u128> {
        let log = self.read_log(asset)?;
        geomean_price(&log, window, now, hint, &self.config)
    }

    /// Geometric-mean price together with the latest observation it was
    /// computed from, read under one lock.
    pub fn get_geomean_price_and_latest(
        &self,
        asset: &AssetId,
        window: u64,
        now: u64,
    ) -> Result<(u128, LatestObservation)> {
        let log = self.read_log(asset)?;
        let price = geomean_price(&log, window, now, 0, &self.config)?;
        Ok((price, latest_of(&log)))
    }

    /// Observation at `index` (oldest retained first).
    pub fn get_observation(&self, asset: &AssetId, index: usize) -> Result<Observation> {
        let log = self.read_log(asset)?;
        log.get(index)
            .copied()
            .ok_or(OracleError::ObservationIndexOutOfRange {
                index,
                len: log.len(),
            })
    }

    /// Latest observation, its retained index and its round.
    pub fn get_latest_observation(&self, asset: &AssetId) -> Result<LatestObservation> {
        Ok(latest_of(&*self.read_log(asset)?))
    }

    /// Subscribe to price-update notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<PriceUpdated> {
        self.events.subscribe()
    }

    /// Number of price updates recorded since construction.
    pub fn update_count(&self) -> u64 {
        self.events.sequence()
    }

    /// The frozen configuration.
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// The reference asset, once registered.
    pub fn reference_asset(&self) -> Option<&AssetId> {
        self.registration.as_ref().map(|r| &r.reference)
    }

    /// All pool assets in registration order, reference included.
    pub fn assets(&self) -> &[AssetId] {
        self.registration
            .as_ref()
            .map(|r| r.assets.as_slice())
            .unwrap_or_default()
    }

    fn registration_for(&self, asset: &AssetId) -> Result<&Registration> {
        self.registration
            .as_ref()
            .ok_or_else(|| OracleError::AssetNotRegistered(asset.clone()))
    }

    fn lock_for(&self, asset: &AssetId) -> Result<&RwLock<ObservationLog>> {
        self.registration_for(asset)?
            .logs
            .get(asset)
            .ok_or_else(|| OracleError::AssetNotRegistered(asset.clone()))
    }

    // Entries are replaced whole under the lock, so a poisoned lock still
    // guards a consistent log.
    fn read_log(&self, asset: &AssetId) -> Result<RwLockReadGuard<'_, ObservationLog>> {
        Ok(self.lock_for(asset)?.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write_log(&self, asset: &AssetId) -> Result<RwLockWriteGuard<'_, ObservationLog>> {
        Ok(self.lock_for(asset)?.write().unwrap_or_else(PoisonError::into_inner))
    }
}

fn latest_of(log: &ObservationLog) -> LatestObservation {
    LatestObservation {
        observation: *log.last(),
        index: log.len() - 1,
        round: log.latest_round(),
    }
}

impl std::fmt::Debug for GeomeanOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeomeanOracle")
            .field("config", &self.config)
            .field("reference", &self.reference_asset())
            .field("assets", &self.assets())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use sextant_types::{PoolKind, WAD};

    /// Reads the asset's price straight out of the pool's balance table.
    struct BalanceAsPrice;

    impl PriceSource for BalanceAsPrice {
        fn compute_price(&self, asset: &AssetId, _reference: &AssetId, pool: &PoolState) -> Result<u128> {
            pool.balance(asset).ok_or_else(|| OracleError::PriceSource {
                asset: asset.clone(),
                reason: "missing balance".to_string(),
            })
        }
    }

    fn pool(prices: &[(&str, u128)]) -> PoolState {
        PoolState {
            balances: prices.iter().map(|(a, p)| (AssetId::from(*a), *p)).collect(),
            kind: PoolKind::Weighted {
                weights: BTreeMap::new(),
            },
        }
    }

    fn registered() -> GeomeanOracle {
        let mut oracle = GeomeanOracle::new(OracleConfig::default(), BalanceAsPrice).expect("oracle");
        oracle
            .register(
                &[AssetId::from("A"), AssetId::from("B"), AssetId::from("C")],
                AssetId::from("B"),
                BlockClock::new(0, 0),
            )
            .expect("register");
        oracle
    }

    #[test]
    fn test_register_seeds_non_reference_assets() {
        let oracle = registered();
        assert_eq!(oracle.get_last_price(&AssetId::from("A")).expect("A"), WAD);
        assert_eq!(oracle.get_last_price(&AssetId::from("C")).expect("C"), WAD);
        assert_eq!(
            oracle.get_last_price(&AssetId::from("B")),
            Err(OracleError::AssetNotRegistered(AssetId::from("B")))
        );
        assert_eq!(oracle.reference_asset(), Some(&AssetId::from("B")));
        assert_eq!(oracle.assets().len(), 3);
    }

    #[test]
    fn test_register_twice_fails() {
        let mut oracle = registered();
        let err = oracle
            .register(&[AssetId::from("A"), AssetId::from("B")], AssetId::from("B"), BlockClock::new(1, 1))
            .unwrap_err();
        assert_eq!(err, OracleError::AlreadyRegistered);
    }

    #[test]
    fn test_register_requires_reference() {
        let mut oracle = GeomeanOracle::new(OracleConfig::default(), BalanceAsPrice).expect("oracle");
        let err = oracle
            .register(&[AssetId::from("A")], AssetId::from("B"), BlockClock::new(0, 0))
            .unwrap_err();
        assert_eq!(err, OracleError::ReferenceAssetMissing(AssetId::from("B")));
        assert!(oracle.reference_asset().is_none());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut oracle = GeomeanOracle::new(OracleConfig::default(), BalanceAsPrice).expect("oracle");
        let err = oracle
            .register(
                &[AssetId::from("A"), AssetId::from("A"), AssetId::from("B")],
                AssetId::from("B"),
                BlockClock::new(0, 0),
            )
            .unwrap_err();
        assert_eq!(err, OracleError::DuplicateAsset(AssetId::from("A")));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = OracleConfig {
            max_window: 0,
            ..OracleConfig::default()
        };
        assert!(matches!(
            GeomeanOracle::new(config, BalanceAsPrice),
            Err(OracleError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_on_trade_records_both_sides() {
        let oracle = registered();
        let events = oracle
            .on_trade(
                &AssetId::from("A"),
                &AssetId::from("C"),
                &pool(&[("A", WAD), ("C", WAD)]),
                BlockClock::new(12, 1),
            )
            .expect("trade");
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.appended));
        assert_eq!(oracle.update_count(), 2);
    }

    #[test]
    fn test_on_trade_skips_reference() {
        let oracle = registered();
        let events = oracle
            .on_trade(
                &AssetId::from("A"),
                &AssetId::from("B"),
                &pool(&[("A", WAD)]),
                BlockClock::new(12, 1),
            )
            .expect("trade");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].asset, AssetId::from("A"));
    }

    #[test]
    fn test_on_trade_unknown_asset_writes_nothing() {
        let oracle = registered();
        let err = oracle
            .on_trade(
                &AssetId::from("A"),
                &AssetId::from("Z"),
                &pool(&[("A", WAD), ("Z", WAD)]),
                BlockClock::new(12, 1),
            )
            .unwrap_err();
        assert_eq!(err, OracleError::AssetNotRegistered(AssetId::from("Z")));
        let latest = oracle.get_latest_observation(&AssetId::from("A")).expect("latest");
        assert_eq!(latest.index, 0);
    }

    #[test]
    fn test_on_trade_rejected_side_writes_neither() {
        let oracle = registered();
        let a = AssetId::from("A");
        let c = AssetId::from("C");
        oracle
            .record_observation(&c, WAD, BlockClock::new(100, 5))
            .expect("record");
        let mut rx = oracle.subscribe();

        let err = oracle
            .on_trade(&a, &c, &pool(&[("A", WAD), ("C", WAD)]), BlockClock::new(50, 3))
            .unwrap_err();
        assert_eq!(err, OracleError::NonMonotonicTimestamp { new: 50, last: 100 });
        let latest_a = oracle.get_latest_observation(&a).expect("latest");
        assert_eq!(latest_a.index, 0);
        assert_eq!(latest_a.round, 0);
        assert_eq!(oracle.get_latest_observation(&c).expect("latest").index, 1);
        assert_eq!(oracle.update_count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_on_trade_events_follow_side_order() {
        let oracle = registered();
        let events = oracle
            .on_trade(
                &AssetId::from("C"),
                &AssetId::from("A"),
                &pool(&[("A", WAD), ("C", 2 * WAD)]),
                BlockClock::new(12, 1),
            )
            .expect("trade");
        let assets: Vec<_> = events.iter().map(|e| e.asset.as_str()).collect();
        assert_eq!(assets, ["C", "A"]);
    }

    #[test]
    fn test_on_trade_before_register_fails() {
        let oracle = GeomeanOracle::new(OracleConfig::default(), BalanceAsPrice).expect("oracle");
        assert!(matches!(
            oracle.on_trade(&AssetId::from("A"), &AssetId::from("B"), &pool(&[]), BlockClock::new(1, 1)),
            Err(OracleError::AssetNotRegistered(_))
        ));
    }

    #[test]
    fn test_source_failure_propagates() {
        let oracle = registered();
        let err = oracle
            .on_trade(&AssetId::from("A"), &AssetId::from("B"), &pool(&[]), BlockClock::new(12, 1))
            .unwrap_err();
        assert!(matches!(err, OracleError::PriceSource { .. }));
    }

    #[test]
    fn test_record_emits_event() {
        let oracle = registered();
        let mut rx = oracle.subscribe();
        oracle
            .record_observation(&AssetId::from("A"), 2 * WAD, BlockClock::new(12, 1))
            .expect("record");
        let event = rx.try_recv().expect("event");
        assert_eq!(event.raw_price, 2 * WAD);
        assert_eq!(event.price, 11 * WAD / 10);
        assert!(event.was_clamped());
    }

    #[test]
    fn test_observation_introspection() {
        let oracle = registered();
        let asset = AssetId::from("A");
        oracle
            .record_observation(&asset, WAD, BlockClock::new(12, 1))
            .expect("record");
        let first = oracle.get_observation(&asset, 0).expect("seed");
        assert_eq!(first.timestamp, 0);
        let latest = oracle.get_latest_observation(&asset).expect("latest");
        assert_eq!(latest.index, 1);
        assert_eq!(latest.observation.timestamp, 12);
        assert_eq!(
            oracle.get_observation(&asset, 2),
            Err(OracleError::ObservationIndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_geomean_and_latest_agree_with_separate_reads() {
        let oracle = registered();
        let asset = AssetId::from("A");
        for step in 1..=5u64 {
            oracle
                .record_observation(&asset, WAD + u128::from(step) * WAD / 100, BlockClock::new(step * 12, step))
                .expect("record");
        }
        let (price, latest) = oracle
            .get_geomean_price_and_latest(&asset, 30, 60)
            .expect("combined");
        assert_eq!(price, oracle.get_geomean_price(&asset, 30, 60).expect("geomean"));
        assert_eq!(latest, oracle.get_latest_observation(&asset).expect("latest"));
        assert_eq!(latest.round, 5);
    }

    #[test]
    fn test_constant_price_geomean() {
        let oracle = registered();
        let asset = AssetId::from("A");
        for step in 1..=20u64 {
            oracle
                .record_observation(&asset, WAD, BlockClock::new(step * 12, step))
                .expect("record");
        }
        for window in [1, 12, 100, 239] {
            assert_eq!(oracle.get_geomean_price(&asset, window, 240).expect("geomean"), WAD);
        }
    }
}
