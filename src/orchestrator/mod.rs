
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::database::Database;
use crate::monitoring::types::{EpisodeChange, TransitionEvent};
use crate::monitoring::{Prober, policy, state};
use crate::notify::Notifier;

/// Counters describing what one sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Endpoints probed this sweep
    pub checked: usize,
    /// Endpoints skipped by the interval policy
    pub skipped: usize,
    /// Confirmed-offline transitions (episodes opened)
    pub alerts: usize,
    /// Offline-to-online transitions (episodes closed)
    pub recoveries: usize,
}

#[derive(Debug, Error)]
pub enum SweepError {
    /// Another sweep (scheduled or forced) holds the gate. Requests arriving
    /// while a sweep is in flight are rejected, not queued.
    #[error("a sweep is already in progress")]
    AlreadyRunning,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Main orchestrator for the sitemon sweep engine
///
/// Sweeps are the sole writer of endpoint and episode state, so at most one
/// sweep may execute at a time; the gate below serializes the scheduled timer
/// against manual force-sweeps.
pub struct Sweeper {
    database: Arc<dyn Database>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    gate: Mutex<()>,
}

impl Sweeper {
    pub fn new(
        database: Arc<dyn Database>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { database, prober, notifier, gate: Mutex::new(()) }
    }

    /// Run one sweep over all endpoints
    ///
    /// With `force` set, the interval policy is bypassed and every endpoint
    /// is probed. Returns `SweepError::AlreadyRunning` when another sweep
    /// holds the gate.
    pub async fn run_sweep(&self, force: bool) -> Result<SweepReport, SweepError> {
        let _guard = self.gate.try_lock().map_err(|_| SweepError::AlreadyRunning)?;

        let settings = self.database.get_settings().await?;
        let endpoints = self.database.list_endpoints().await?;

        let now = Utc::now();
        // Weekend/weekday decision is made once from the sweep's start time
        let interval = policy::effective_interval(&settings, Local::now().weekday());
        let threshold = settings.alert_threshold();

        let mut due = Vec::new();
        let mut report = SweepReport::default();

        for endpoint in endpoints {
            if force || policy::is_due(endpoint.last_checked_at, now, interval) {
                due.push(endpoint);
            } else {
                report.skipped += 1;
            }
        }

        // Endpoints are independent and I/O-bound; probe them concurrently
        let probes = due
            .iter()
            .map(|endpoint| self.prober.probe(&endpoint.url, endpoint.expected_text.as_deref()));
        let outcomes = futures::future::join_all(probes).await;

        let mut mutated = Vec::with_capacity(due.len());
        let mut episode_changes = Vec::new();

        for (mut endpoint, outcome) in due.into_iter().zip(outcomes) {
            // Captured before any mutation; the one-shot event behavior
            // depends on comparing against it
            let previous_status = endpoint.status;

            let eval = state::evaluate(
                previous_status,
                endpoint.first_failure_time,
                &outcome,
                now,
                threshold,
            );

            endpoint.status = eval.status;
            endpoint.first_failure_time = eval.first_failure_time;
            endpoint.last_error = eval.last_error;
            endpoint.last_checked_at = Some(now);

            match eval.event {
                Some(TransitionEvent::Alert) => {
                    report.alerts += 1;
                    episode_changes.push(EpisodeChange::Open {
                        endpoint_uuid: endpoint.uuid,
                        snapshot: endpoint.snapshot(),
                        start_time: now,
                        last_error: endpoint.last_error.clone(),
                    });
                    info!(endpoint = %endpoint.name, "endpoint confirmed OFFLINE");

                    if let Err(e) = self
                        .notifier
                        .dispatch(TransitionEvent::Alert, &endpoint, &settings, now)
                        .await
                    {
                        warn!(endpoint = %endpoint.name, error = %e, "alert dispatch failed");
                    }
                }
                Some(TransitionEvent::Recovery) => {
                    report.recoveries += 1;
                    episode_changes.push(EpisodeChange::Close {
                        endpoint_uuid: endpoint.uuid,
                        end_time: now,
                    });
                    info!(endpoint = %endpoint.name, "endpoint recovered");

                    if let Err(e) = self
                        .notifier
                        .dispatch(TransitionEvent::Recovery, &endpoint, &settings, now)
                        .await
                    {
                        warn!(endpoint = %endpoint.name, error = %e, "recovery dispatch failed");
                    }
                }
                None => {
                    debug!(
                        endpoint = %endpoint.name,
                        status = %endpoint.status,
                        error = ?endpoint.last_error,
                        "probe evaluated"
                    );
                }
            }

            report.checked += 1;
            mutated.push(endpoint);
        }

        // All mutations land together; a failed commit discards the sweep's
        // observations, which the next tick rediscovers
        self.database.commit_sweep(&mutated, &episode_changes).await?;

        Ok(report)
    }

    /// Drive scheduled sweeps on a fixed tick until the task is aborted
    ///
    /// A tick that finds the gate held (a forced sweep in flight) is skipped;
    /// the next tick picks up whatever is due.
    pub async fn run_scheduled(self: Arc<Self>, tick: Duration) {
        let mut timer = tokio::time::interval(tick);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            timer.tick().await;

            match self.run_sweep(false).await {
                Ok(report) => {
                    debug!(
                        checked = report.checked,
                        skipped = report.skipped,
                        alerts = report.alerts,
                        recoveries = report.recoveries,
                        "scheduled sweep finished"
                    );
                }
                Err(SweepError::AlreadyRunning) => {
                    debug!("sweep already in progress; skipping tick");
                }
                Err(SweepError::Failed(e)) => {
                    error!(error = %e, "scheduled sweep failed");
                }
            }
        }
    }
}
