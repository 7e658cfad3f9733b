//! sextant-sim: replays a synthetic price path through the geomean oracle.
//!
//! The path (ramp, plateau, manipulation spike, seeded noise) is fed into a
//! weighted pool one step at a time. For every step the simulator prints the
//! raw pool price, the clamped price the oracle recorded, the arithmetic
//! sliding mean of raw prices and the oracle's geometric TWAP.

mod config;
mod run;
mod scenario;

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::SimConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SimConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("sextant={}", config.logging.level).parse()?),
        )
        .init();

    info!(
        steps = config.scenario.steps,
        window_secs = config.scenario.window_secs,
        max_delta_bps = config.oracle.max_delta_bps,
        "sextant simulation starting"
    );

    let oracle = Arc::new(run::build_oracle(&config)?);

    // Count clamped updates off the event bus while the replay runs.
    let mut updates = oracle.subscribe();
    let listener = tokio::spawn(async move {
        let mut clamped = 0u64;
        loop {
            match updates.recv().await {
                Ok(update) if update.was_clamped() => clamped += 1,
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!(missed, "event listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
        clamped
    });

    let replay_oracle = Arc::clone(&oracle);
    let replay_config = config.clone();
    let report = tokio::task::spawn_blocking(move || run::simulate(&replay_oracle, &replay_config))
        .await??;
    let total_updates = oracle.update_count();
    drop(oracle);
    let clamped = listener.await?;

    println!("step,timestamp,manipulated,raw,recorded,arithmetic_twap,geometric_twap");
    for row in &report.steps {
        let geometric = row
            .geometric
            .map(|price| format!("{price:.6}"))
            .unwrap_or_default();
        println!(
            "{},{},{},{:.6},{:.6},{:.6},{}",
            row.step,
            row.timestamp,
            row.manipulated,
            row.raw,
            row.recorded,
            row.arithmetic,
            geometric
        );
    }

    info!(
        updates = total_updates,
        clamped,
        max_arithmetic_deviation = report.max_arithmetic_deviation,
        max_geometric_deviation = report.max_geometric_deviation,
        "simulation finished"
    );
    Ok(())
}
