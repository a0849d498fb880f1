// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler runtime.
//!
//! One process owns the root directory (exclusive lock with heartbeat)
//! and drives every discovered schedule through its state machine:
//!
//! ```text
//!  disabled ←→ idle ──timer→ running ──ok──→ idle
//!                               │
//!                               ├─fail, retries left→ (delay) → running
//!                               └─fail, exhausted → error → idle (next tick)
//!  idle ←→ paused (manual)
//! ```
//!
//! State files are reloaded on every tick, so pause/resume/trigger from
//! another invocation are observed without any in-process channel.

use crate::config::MissedExecution;
use crate::discover::{discover, DiscoverError, DiscoveredSchedule};
use crate::lock::{LockError, SchedulerLock};
use crate::state::{RunRecord, ScheduleState, ScheduleStatus, StateError};
use fanout_core::{Clock, SystemClock};
use fanout_engine::{run_pipeline, RunContext};
use fanout_llm::AiInvoker;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from scheduler operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Discover(#[from] DiscoverError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Config(#[from] crate::config::ScheduleConfigError),
    #[error("no scheduled pipeline named {0:?}")]
    UnknownPipeline(String),
}

/// Scheduler knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Directory whose children are pipeline packages.
    pub root: PathBuf,
    pub poll_interval: Duration,
    pub stale_threshold: Duration,
    pub heartbeat_interval: Duration,
}

impl SchedulerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            poll_interval: Duration::from_secs(1),
            stale_threshold: crate::lock::DEFAULT_STALE_THRESHOLD,
            heartbeat_interval: Duration::from_secs(15),
        }
    }

    fanout_core::setters! {
        set {
            poll_interval: Duration,
            stale_threshold: Duration,
            heartbeat_interval: Duration,
        }
    }
}

/// A pipeline id together with its current state, for listings.
#[derive(Debug, Clone)]
pub struct ScheduleOverview {
    pub pipeline_id: String,
    pub state: ScheduleState,
}

/// The scheduler. Also usable without the run loop for one-shot
/// operations (list, status, trigger, pause, resume).
pub struct Scheduler<C: Clock = SystemClock> {
    config: SchedulerConfig,
    invoker: Arc<dyn AiInvoker>,
    clock: C,
    /// At most one pipeline run in flight across the process.
    run_guard: Arc<tokio::sync::Mutex<()>>,
}

impl Scheduler<SystemClock> {
    pub fn new(config: SchedulerConfig, invoker: Arc<dyn AiInvoker>) -> Self {
        Self::with_clock(config, invoker, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(config: SchedulerConfig, invoker: Arc<dyn AiInvoker>, clock: C) -> Self {
        Self {
            config,
            invoker,
            clock,
            run_guard: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Run the scheduler until `shutdown` fires.
    ///
    /// Refuses to start (without waiting) if a live lock exists.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SchedulerError> {
        let mut lock = SchedulerLock::acquire(
            &self.config.root,
            self.config.stale_threshold,
            self.clock.utc(),
        )?;
        let schedules = discover(&self.config.root)?;
        tracing::info!(
            count = schedules.len(),
            root = %self.config.root.display(),
            "scheduler started"
        );

        for entry in &schedules {
            if let Err(e) = self.prepare(entry) {
                tracing::error!(pipeline = %entry.pipeline_id, error = %e, "prepare failed");
            }
        }

        let mut last_heartbeat = self.clock.now();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            if self.clock.now().duration_since(last_heartbeat) >= self.config.heartbeat_interval {
                lock.heartbeat(self.clock.utc())?;
                last_heartbeat = self.clock.now();
            }

            for entry in &schedules {
                if shutdown.is_cancelled() {
                    break;
                }
                if let Err(e) = self.tick(entry).await {
                    tracing::error!(pipeline = %entry.pipeline_id, error = %e, "tick failed");
                }
            }
        }

        tracing::info!("scheduler stopped");
        Ok(())
    }

    /// Startup reconciliation: enablement, crash recovery, and the
    /// missed-run policy.
    fn prepare(&self, entry: &DiscoveredSchedule) -> Result<(), SchedulerError> {
        let now = self.clock.utc();
        let mut state = self.load_state(entry)?;
        state.enabled = entry.schedule.enabled;

        if !entry.schedule.enabled {
            state.status = ScheduleStatus::Disabled;
            state.next_run = None;
            state.save(&entry.dir)?;
            return Ok(());
        }

        // A run never survives a restart; "running" here means a crash.
        if matches!(state.status, ScheduleStatus::Disabled | ScheduleStatus::Running) {
            state.status = ScheduleStatus::Idle;
        }

        match state.next_run {
            Some(next) if next <= now => match entry.schedule.missed_execution {
                MissedExecution::Run => {
                    tracing::info!(
                        pipeline = %entry.pipeline_id,
                        missed = %next,
                        "queueing missed run immediately"
                    );
                    // Scheduled "now", so the delay window does not apply.
                    state.next_run = Some(now);
                }
                MissedExecution::Skip => {
                    state.next_run = entry.schedule.next_after(now)?;
                    tracing::info!(
                        pipeline = %entry.pipeline_id,
                        next = ?state.next_run,
                        "skipping missed run"
                    );
                }
            },
            Some(_) => {}
            None => state.next_run = entry.schedule.next_after(now)?,
        }

        state.save(&entry.dir)?;
        Ok(())
    }

    /// One poll of one schedule.
    async fn tick(&self, entry: &DiscoveredSchedule) -> Result<(), SchedulerError> {
        let now = self.clock.utc();
        let mut state = self.load_state(entry)?;

        if !state.enabled
            || matches!(state.status, ScheduleStatus::Paused | ScheduleStatus::Disabled)
        {
            return Ok(());
        }
        if state.status == ScheduleStatus::Error {
            state.status = ScheduleStatus::Idle;
            state.save(&entry.dir)?;
        }

        let Some(scheduled) = state.next_run else {
            state.next_run = entry.schedule.next_after(now)?;
            state.save(&entry.dir)?;
            return Ok(());
        };
        if scheduled > now {
            return Ok(());
        }

        if let Some(window) = entry.schedule.window {
            let max_delay = chrono::Duration::minutes(i64::from(window.max_delay_minutes));
            if now - scheduled > max_delay {
                tracing::warn!(
                    pipeline = %entry.pipeline_id,
                    scheduled = %scheduled,
                    "run is outside the delay window, skipping"
                );
                state.next_run = entry.schedule.next_after(now)?;
                state.save(&entry.dir)?;
                return Ok(());
            }
        }

        self.execute_with_retries(entry, &mut state).await?;
        state.next_run = entry.schedule.next_after(self.clock.utc())?;
        state.save(&entry.dir)?;
        Ok(())
    }

    /// Run once, retrying per the declared policy. Exhausted retries
    /// leave the schedule in `error`; the next occurrence is still
    /// scheduled by the caller.
    async fn execute_with_retries(
        &self,
        entry: &DiscoveredSchedule,
        state: &mut ScheduleState,
    ) -> Result<(), SchedulerError> {
        let policy = &entry.schedule.retry_policy;
        let attempts = policy.max_retries + 1;

        state.status = ScheduleStatus::Running;
        state.save(&entry.dir)?;

        let mut succeeded = false;
        for attempt in 1..=attempts {
            let record = self.run_once(entry).await;
            succeeded = record.success;
            state.record_run(record);
            state.save(&entry.dir)?;

            if succeeded {
                break;
            }
            if attempt < attempts {
                tracing::warn!(
                    pipeline = %entry.pipeline_id,
                    attempt,
                    of = attempts,
                    "run failed, retrying after delay"
                );
                tokio::time::sleep(Duration::from_millis(policy.delay_ms)).await;
            }
        }

        state.status = if succeeded { ScheduleStatus::Idle } else { ScheduleStatus::Error };
        if !succeeded {
            tracing::error!(pipeline = %entry.pipeline_id, attempts, "retries exhausted");
        }
        Ok(())
    }

    /// Execute the pipeline once under the process-wide run guard.
    async fn run_once(&self, entry: &DiscoveredSchedule) -> RunRecord {
        let _serial = self.run_guard.lock().await;
        let started_at = self.clock.utc();
        let started = std::time::Instant::now();
        tracing::info!(pipeline = %entry.pipeline_id, "scheduled run starting");

        let ctx = RunContext::new(Arc::clone(&self.invoker), entry.dir.clone());
        let outcome = run_pipeline(&entry.config, ctx).await;

        let completed_at = self.clock.utc();
        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(run) => {
                let error = if run.success {
                    None
                } else {
                    run.map_results
                        .iter()
                        .find_map(|r| r.error.clone())
                        .or_else(|| Some("one or more items failed".to_string()))
                };
                RunRecord {
                    started_at,
                    completed_at: Some(completed_at),
                    success: run.success,
                    duration_ms,
                    items_processed: Some(run.stats.total_items),
                    error,
                }
            }
            Err(e) => RunRecord {
                started_at,
                completed_at: Some(completed_at),
                success: false,
                duration_ms,
                items_processed: None,
                error: Some(e.to_string()),
            },
        }
    }

    // === One-shot operations (no run loop required) ===

    /// Every discovered schedule with its current state.
    pub fn list(&self) -> Result<Vec<ScheduleOverview>, SchedulerError> {
        let schedules = discover(&self.config.root)?;
        let mut overviews = Vec::with_capacity(schedules.len());
        for entry in &schedules {
            overviews.push(ScheduleOverview {
                pipeline_id: entry.pipeline_id.clone(),
                state: self.load_state(entry)?,
            });
        }
        Ok(overviews)
    }

    pub fn status(&self, pipeline_id: &str) -> Result<ScheduleState, SchedulerError> {
        let entry = self.find(pipeline_id)?;
        Ok(self.load_state(&entry)?)
    }

    pub fn history(&self, pipeline_id: &str) -> Result<Vec<RunRecord>, SchedulerError> {
        Ok(self.status(pipeline_id)?.history)
    }

    /// Run one pipeline immediately, outside its cron cadence.
    pub async fn trigger(&self, pipeline_id: &str) -> Result<RunRecord, SchedulerError> {
        let entry = self.find(pipeline_id)?;
        let mut state = self.load_state(&entry)?;

        state.status = ScheduleStatus::Running;
        state.save(&entry.dir)?;

        let record = self.run_once(&entry).await;
        state.record_run(record.clone());
        state.status = if record.success { ScheduleStatus::Idle } else { ScheduleStatus::Error };
        state.save(&entry.dir)?;
        Ok(record)
    }

    /// Manual pause; the run loop skips paused schedules.
    pub fn pause(&self, pipeline_id: &str) -> Result<(), SchedulerError> {
        let entry = self.find(pipeline_id)?;
        let mut state = self.load_state(&entry)?;
        state.status = ScheduleStatus::Paused;
        state.save(&entry.dir)?;
        Ok(())
    }

    /// Undo a pause and recompute the next occurrence.
    pub fn resume(&self, pipeline_id: &str) -> Result<(), SchedulerError> {
        let entry = self.find(pipeline_id)?;
        let mut state = self.load_state(&entry)?;
        if state.status == ScheduleStatus::Paused {
            state.status = ScheduleStatus::Idle;
        }
        state.next_run = entry.schedule.next_after(self.clock.utc())?;
        state.save(&entry.dir)?;
        Ok(())
    }

    fn find(&self, pipeline_id: &str) -> Result<DiscoveredSchedule, SchedulerError> {
        discover(&self.config.root)?
            .into_iter()
            .find(|entry| entry.pipeline_id == pipeline_id)
            .ok_or_else(|| SchedulerError::UnknownPipeline(pipeline_id.to_string()))
    }

    fn load_state(&self, entry: &DiscoveredSchedule) -> Result<ScheduleState, StateError> {
        Ok(ScheduleState::load(&entry.dir)?.unwrap_or_else(|| {
            ScheduleState::new(entry.pipeline_id.as_str(), entry.schedule.enabled)
        }))
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
