//! The monitoring cycle.
//!
//! ```text
//! Idle -> Fetching -> Evaluating -> (Alerting) -> Sleeping -> Fetching ...
//!                                                    |
//!                                                    +-> Stopped (shutdown signal)
//! ```
//!
//! Each cycle runs inside an unwind boundary, so a failing or panicking cycle
//! is logged and the loop carries on after the normal sleep. Only the shutdown
//! signal ends the loop.

use crate::api::PriceSource;
use crate::config::Config;
use crate::error::{FetchError, PegWatchError};
use crate::notify::{self, DispatchOutcome, Notifier};
use crate::peg::alerts::AlertEngine;
use crate::peg::deviation::DeviationResult;
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Fetching,
    Evaluating,
    Alerting,
    Sleeping,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No price this cycle; evaluation and alerting were skipped.
    NoData(FetchError),
    WithinTolerance(DeviationResult),
    Alerted {
        deviation: DeviationResult,
        dispatch: DispatchOutcome,
    },
}

/// Counters accumulated over the life of the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub cycles: u64,
    pub fetch_failures: u64,
    pub alerts_sent: u64,
    pub alerts_skipped: u64,
    pub alerts_failed: u64,
    pub faulted_cycles: u64,
}

impl MonitorReport {
    fn record(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::NoData(_) => self.fetch_failures += 1,
            CycleOutcome::WithinTolerance(_) => {}
            CycleOutcome::Alerted { dispatch, .. } => match dispatch {
                DispatchOutcome::Sent => self.alerts_sent += 1,
                DispatchOutcome::Skipped { .. } => self.alerts_skipped += 1,
                DispatchOutcome::Failed(_) => self.alerts_failed += 1,
            },
        }
    }
}

pub struct Monitor<S, N> {
    config: Config,
    source: S,
    notifier: N,
    alerts: AlertEngine,
    state: MonitorState,
}

impl<S: PriceSource, N: Notifier> Monitor<S, N> {
    pub fn new(config: Config, source: S, notifier: N) -> Self {
        let alerts = AlertEngine::new(config.asset_symbol.clone(), config.threshold_percent);
        Self {
            config,
            source,
            notifier,
            alerts,
            state: MonitorState::Idle,
        }
    }

    fn transition(&mut self, next: MonitorState) {
        debug!("monitor state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// One fetch -> evaluate -> (alert) pass. Never sleeps.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, PegWatchError> {
        self.transition(MonitorState::Fetching);
        let sample = match self.source.fetch(&self.config.asset_id).await {
            Ok(sample) => sample,
            Err(e) => {
                error!("Failed to get price for {}: {}", self.config.asset_id, e);
                return Ok(CycleOutcome::NoData(e));
            }
        };

        debug!(
            "Fetched {} = {} at {}",
            sample.asset_id,
            sample.price,
            sample.fetched_at.to_rfc3339()
        );
        self.transition(MonitorState::Evaluating);
        let deviation = DeviationResult::new(sample.price, self.config.peg_price);
        if !deviation.deviation_percent.is_finite() {
            return Err(PegWatchError::Unexpected(format!(
                "non-finite deviation for price {} against peg {}",
                sample.price, self.config.peg_price
            )));
        }
        info!(
            "{} price: ${:.6}, Deviation: {:.2}%",
            self.config.asset_symbol, sample.price, deviation.deviation_percent
        );

        let Some(alert) = self.alerts.check(&deviation) else {
            return Ok(CycleOutcome::WithinTolerance(deviation));
        };

        warn!("Deviation exceeds threshold: {:.2}%", deviation.deviation_percent);
        self.transition(MonitorState::Alerting);
        let dispatch = notify::dispatch(&self.notifier, &alert).await;

        Ok(CycleOutcome::Alerted {
            deviation,
            dispatch,
        })
    }

    /// Runs cycles until `shutdown` carries `true`.
    ///
    /// Both the cycle and the inter-cycle sleep are raced against the signal.
    /// A cycle cut short by shutdown is abandoned and not counted.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> MonitorReport {
        info!(
            "Starting monitoring for {} with target price ${:.2}",
            self.config.asset_symbol, self.config.peg_price
        );
        info!("Alert threshold: {}%", self.config.threshold_percent);

        let mut report = MonitorReport::default();

        loop {
            let result = tokio::select! {
                result = AssertUnwindSafe(self.run_cycle()).catch_unwind() => result,
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown requested mid-cycle, abandoning {:?}", self.state);
                    break;
                }
            };
            match result {
                Ok(Ok(outcome)) => report.record(&outcome),
                Ok(Err(e)) => {
                    error!("Unexpected error in monitor cycle: {}", e);
                    report.faulted_cycles += 1;
                }
                Err(panic) => {
                    let e = PegWatchError::Unexpected(panic_message(panic.as_ref()));
                    error!("Monitor cycle panicked in state {:?}: {}", self.state, e);
                    report.faulted_cycles += 1;
                }
            }
            report.cycles += 1;

            self.transition(MonitorState::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        self.transition(MonitorState::Stopped);
        info!("Monitoring stopped by user");
        report
    }
}

/// Resolves once the flag is set. A dropped sender never resolves.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
