//! Background loops, one per enabled check.

use crate::MonitorResources;
use crate::checks::{self, CheckName};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn a loop for every check with a non-zero interval. Each loop runs its
/// check to completion before waiting for the next tick, so a slow run delays
/// the next one instead of overlapping it.
pub fn spawn_check_loops(resources: MonitorResources) -> Vec<(CheckName, JoinHandle<()>)> {
    let mut handles = Vec::new();
    for check in CheckName::ALL {
        let Some(period) = resources.config.schedule.interval_for(check) else {
            tracing::info!(
                name = "scheduler.disabled",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                check = %check,
                message = "Background loop disabled"
            );
            continue;
        };

        tracing::info!(
            name = "scheduler.started",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            check = %check,
            period_secs = period.as_secs(),
            message = "Starting background loop"
        );
        let resources = resources.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let outcome = checks::invoke(&resources, check).await;
                if !outcome.is_success() {
                    tracing::warn!(
                        name = "scheduler.invocation_failed",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        check = %check,
                        invocation_id = %outcome.invocation_id,
                        message = "Invocation failed; retrying on next tick"
                    );
                }
            }
        });
        handles.push((check, handle));
    }
    handles
}
