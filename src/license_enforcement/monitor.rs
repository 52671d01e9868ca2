use std::{future::Future, time::Duration};

use anyhow::Context as _;
use tokio::{
    select,
    signal::unix::{Signal, SignalKind, signal},
    time::{Instant, sleep_until},
};
use tracing::{error, info};

use crate::{events::EventStore, license::LicenseSource};

use super::LicenseEnforcer;

pub(crate) const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Validate the license now and then every `recheck`, until SIGINT or SIGTERM.
pub(crate) async fn monitor<L: LicenseSource, S: EventStore>(
    enforcer: &LicenseEnforcer<L, S>,
    recheck: Duration,
) -> anyhow::Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    info!(?recheck, "Monitoring license");

    let ticks = run_until(enforcer, recheck, stop_signal(&mut sigint, &mut sigterm)).await;

    info!(ticks, "Stopped monitoring license");

    Ok(())
}

async fn stop_signal(sigint: &mut Signal, sigterm: &mut Signal) {
    select! {
        _ = sigint.recv() => info!("Received SIGINT, stopping"),
        _ = sigterm.recv() => info!("Received SIGTERM, stopping"),
    }
}

/// Run ticks back to back on a fixed period until `stop` resolves. A tick in
/// progress always finishes. Returns the number of ticks run.
async fn run_until<L, S, F>(enforcer: &LicenseEnforcer<L, S>, recheck: Duration, stop: F) -> u64
where
    L: LicenseSource,
    S: EventStore,
    F: Future<Output = ()>,
{
    tokio::pin!(stop);

    let mut ticks = 0;

    loop {
        let deadline = Instant::now() + recheck;
        ticks += 1;

        match enforcer.validate().await {
            Ok(status) => info!(
                application = %status.application,
                expiration = %status.expiration,
                "License check passed"
            ),
            Err(err) => error!(%err, "License check failed, checking again in {recheck:?}"),
        }

        select! {
            () = sleep_until(deadline) => {},
            () = &mut stop => break,
        }
    }

    ticks
}
