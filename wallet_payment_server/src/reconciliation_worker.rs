use gateway_tools::AnyGateway;
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use wallet_payment_engine::{SettlementApi, SqliteDatabase};

use crate::config::ReconciliationConfig;

/// Starts the reconciliation worker, which polls the providers for intents that have been `PENDING` for longer than
/// the configured minimum age. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Intents are never expired by the worker itself. They stay `PENDING` until a provider reports a terminal status.
pub fn start_reconciliation_worker(
    api: SettlementApi<SqliteDatabase, AnyGateway>,
    config: ReconciliationConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "🔁️ Reconciliation worker started. Checking intents older than {} s every {} s",
            config.min_age.as_secs(),
            config.interval.as_secs()
        );
        loop {
            timer.tick().await;
            trace!("🔁️ Running pending intent sweep");
            match api.sweep_pending(config.min_age, config.batch_size, config.provider_spacing).await {
                Ok(summary) if summary.checked == 0 => {},
                Ok(summary) => {
                    info!(
                        "🔁️ Sweep checked {} intents: {} settled, {} closed, {} still pending, {} flagged, {} errors",
                        summary.checked,
                        summary.settled,
                        summary.closed,
                        summary.still_pending,
                        summary.flagged,
                        summary.errors
                    );
                },
                Err(e) => {
                    error!("🔁️ Error running the pending intent sweep: {e}");
                },
            }
        }
    })
}
