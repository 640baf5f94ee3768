// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Scheduler
//!
//! Named-job runner driving the reconcilers on fixed intervals.
//!
//! Each job owns a timer task. A tick spawns the job's pass instead of
//! awaiting it, so a slow pass never delays the timer; overlapping passes are
//! absorbed by the reconcilers' own single-flight guards. Stopping the
//! scheduler stops the timers only: passes already running finish normally.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Periodic and manual reconciliation triggers

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::reconciler::{Reconciler, SyncOutcome};
use crate::domain::schedule::{parse_schedule, ScheduleParseError};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job '{0}' already exists")]
    JobExists(String),

    #[error("job '{0}' not found")]
    JobNotFound(String),

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleParseError),
}

/// Registered job as reported by [`Scheduler::list_jobs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub name: String,
    pub schedule: String,
    pub every: Duration,
}

struct Job {
    schedule: String,
    every: Duration,
    reconciler: Arc<dyn Reconciler>,
    /// Cancels this job's timer; `None` while the scheduler is stopped.
    timer: Option<CancellationToken>,
}

pub struct Scheduler {
    jobs: Mutex<BTreeMap<String, Job>>,
    running: Mutex<Option<CancellationToken>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(BTreeMap::new()),
            running: Mutex::new(None),
        }
    }

    /// Register `reconciler` under `name`. When the scheduler is already
    /// running, the job's timer starts immediately.
    pub fn add_job(
        &self,
        name: &str,
        schedule: &str,
        reconciler: Arc<dyn Reconciler>,
    ) -> Result<(), SchedulerError> {
        let every = parse_schedule(schedule)?;

        // Lock order: running, then jobs.
        let running = self.running.lock();
        let mut jobs = self.jobs.lock();
        if jobs.contains_key(name) {
            return Err(SchedulerError::JobExists(name.to_string()));
        }

        let mut job = Job {
            schedule: schedule.to_string(),
            every,
            reconciler,
            timer: None,
        };
        if let Some(root) = running.as_ref() {
            job.timer = Some(spawn_timer(name, &job, root));
        }
        jobs.insert(name.to_string(), job);

        info!(job = name, schedule, "Job registered");
        Ok(())
    }

    pub fn remove_job(&self, name: &str) -> Result<(), SchedulerError> {
        let job = self
            .jobs
            .lock()
            .remove(name)
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;
        if let Some(timer) = job.timer {
            timer.cancel();
        }
        info!(job = name, "Job removed");
        Ok(())
    }

    pub fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs
            .lock()
            .iter()
            .map(|(name, job)| JobInfo {
                name: name.clone(),
                schedule: job.schedule.clone(),
                every: job.every,
            })
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Start every job's timer. Must be called within a Tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            return;
        }
        let root = CancellationToken::new();

        let mut jobs = self.jobs.lock();
        for (name, job) in jobs.iter_mut() {
            job.timer = Some(spawn_timer(name, job, &root));
        }
        info!(jobs = jobs.len(), "Scheduler started");
        *running = Some(root);
    }

    /// Stop issuing ticks. In-flight passes are left to finish.
    pub fn stop(&self) {
        let Some(root) = self.running.lock().take() else {
            return;
        };
        root.cancel();
        for job in self.jobs.lock().values_mut() {
            job.timer = None;
        }
        info!("Scheduler stopped");
    }

    /// Run `name` once now without waiting for it. The handle may be awaited
    /// by callers that do want to wait.
    pub fn trigger(&self, name: &str) -> Result<JoinHandle<()>, SchedulerError> {
        let reconciler = self
            .jobs
            .lock()
            .get(name)
            .map(|job| job.reconciler.clone())
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;
        info!(job = name, "Manual trigger");
        Ok(spawn_pass(name.to_string(), reconciler))
    }
}

fn spawn_timer(name: &str, job: &Job, root: &CancellationToken) -> CancellationToken {
    let token = root.child_token();
    let stop = token.clone();
    let name = name.to_string();
    let every = job.every;
    let reconciler = job.reconciler.clone();

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    debug!(job = %name, "Job timer stopped");
                    break;
                }
                _ = ticker.tick() => {
                    spawn_pass(name.clone(), reconciler.clone());
                }
            }
        }
    });
    token
}

fn spawn_pass(name: String, reconciler: Arc<dyn Reconciler>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match reconciler.reconcile().await {
            Ok(SyncOutcome::Completed) => debug!(job = %name, "Pass completed"),
            Ok(SyncOutcome::Busy) => debug!(job = %name, "Previous pass still running"),
            Err(e) => error!(job = %name, error = %e, "Pass aborted"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::SyncError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Reconciler for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn reconcile(&self) -> Result<SyncOutcome, SyncError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(SyncOutcome::Completed)
        }
    }

    #[test]
    fn test_duplicate_and_missing_jobs() {
        let scheduler = Scheduler::new();
        let job = Arc::new(CountingJob::default());
        scheduler.add_job("exports", "@every 30s", job.clone()).unwrap();

        let err = scheduler.add_job("exports", "@every 10s", job.clone()).unwrap_err();
        assert!(matches!(err, SchedulerError::JobExists(name) if name == "exports"));

        let err = scheduler.remove_job("shares").unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound(_)));

        let err = scheduler.add_job("shares", "every so often", job).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule(_)));

        let jobs = scheduler.list_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].every, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let scheduler = Scheduler::new();
        let job = Arc::new(CountingJob::default());
        scheduler.add_job("counting", "@every 20ms", job.clone()).unwrap();

        scheduler.start();
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let after_stop = job.runs.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected at least two ticks, got {}", after_stop);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_trigger_runs_once() {
        let scheduler = Scheduler::new();
        let job = Arc::new(CountingJob::default());
        scheduler.add_job("counting", "@every 1h", job.clone()).unwrap();

        scheduler.trigger("counting").unwrap().await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert!(matches!(
            scheduler.trigger("missing"),
            Err(SchedulerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_removed_job_stops_ticking() {
        let scheduler = Scheduler::new();
        let job = Arc::new(CountingJob::default());
        scheduler.start();
        scheduler.add_job("counting", "@every 20ms", job.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;

        scheduler.remove_job("counting").unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let after_remove = job.runs.load(Ordering::SeqCst);
        assert!(after_remove >= 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), after_remove);
        scheduler.stop();
    }
}
