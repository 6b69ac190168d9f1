//! Periodic sweep scheduling

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::sweep::{CycleReport, SweepEngine};

/// Drives the sweep engine at a fixed interval
pub struct Scheduler {
    engine: Arc<SweepEngine>,
    period: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<SweepEngine>, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Run a single cycle
    pub async fn run_once(&self) -> Result<CycleReport> {
        let report = self.engine.run_cycle().await?;
        log_report(&report);
        Ok(report)
    }

    /// Run cycles until shutdown is signalled.
    ///
    /// The first cycle starts immediately. A cycle that is already running
    /// when shutdown arrives is allowed to finish, so a confirmed transfer
    /// is always recorded before the loop exits.
    pub async fn run_continuous(&self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting sweep scheduler ({}s interval)", self.period.as_secs());

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(_) => {}
                        Err(e) if e.is_retryable() => warn!("Sweep cycle skipped: {}", e),
                        Err(e) => error!("Sweep cycle failed: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Sweep scheduler shutting down");
                    break;
                }
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    if report.swept > 0 || report.failed > 0 {
        info!(
            "Cycle complete: {} checked, {} swept ({} TRX), {} failed, {} notified",
            report.checked, report.swept, report.total_swept, report.failed, report.notified
        );
    } else {
        debug!("Cycle complete: {} checked, nothing to sweep", report.checked);
    }
}
