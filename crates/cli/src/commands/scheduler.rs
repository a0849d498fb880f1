// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fanout scheduler <start|list|status|trigger|pause|resume|history>`

use crate::exit_error::ExitError;
use clap::Subcommand;
use fanout_llm::{CliBackend, CliBackendConfig, DefaultLlmClient, PoolConfig};
use fanout_scheduler::{LockError, Scheduler, SchedulerConfig, SchedulerError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Subcommand)]
pub enum SchedulerCommand {
    /// Run the scheduler until interrupted
    Start {
        /// Directory whose children are pipeline packages
        root: PathBuf,
        /// Agent CLI program backing the session pool
        #[arg(long, default_value = "claude")]
        backend: String,
    },
    /// Show every discovered schedule and its state
    List { root: PathBuf },
    /// Show one schedule's full state
    Status { root: PathBuf, pipeline: String },
    /// Run one pipeline immediately, outside its cadence
    Trigger {
        root: PathBuf,
        pipeline: String,
        #[arg(long, default_value = "claude")]
        backend: String,
    },
    /// Pause a schedule (manual)
    Pause { root: PathBuf, pipeline: String },
    /// Resume a paused schedule
    Resume { root: PathBuf, pipeline: String },
    /// Show a schedule's run history
    History { root: PathBuf, pipeline: String },
}

pub async fn execute(command: SchedulerCommand) -> Result<(), ExitError> {
    match command {
        SchedulerCommand::Start { root, backend } => {
            let scheduler = build(root, &backend, true)?;
            let shutdown = CancellationToken::new();
            {
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        eprintln!("shutting down…");
                        shutdown.cancel();
                    }
                });
            }
            scheduler.run(shutdown).await.map_err(scheduler_error)
        }
        SchedulerCommand::List { root } => {
            let scheduler = build(root, "claude", false)?;
            let overviews = scheduler.list().map_err(scheduler_error)?;
            for overview in &overviews {
                let next = overview
                    .state
                    .next_run
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<24} {:<10} next: {}  runs: {}",
                    overview.pipeline_id,
                    overview.state.status.to_string(),
                    next,
                    overview.state.stats.total_runs
                );
            }
            Ok(())
        }
        SchedulerCommand::Status { root, pipeline } => {
            let scheduler = build(root, "claude", false)?;
            let state = scheduler.status(&pipeline).map_err(scheduler_error)?;
            println!("{}", pretty(&state)?);
            Ok(())
        }
        SchedulerCommand::Trigger { root, pipeline, backend } => {
            let scheduler = build(root, &backend, true)?;
            let record = scheduler.trigger(&pipeline).await.map_err(scheduler_error)?;
            println!("{}", pretty(&record)?);
            if record.success {
                Ok(())
            } else {
                Err(ExitError::failure("triggered run failed"))
            }
        }
        SchedulerCommand::Pause { root, pipeline } => {
            let scheduler = build(root, "claude", false)?;
            scheduler.pause(&pipeline).map_err(scheduler_error)?;
            println!("{pipeline} paused");
            Ok(())
        }
        SchedulerCommand::Resume { root, pipeline } => {
            let scheduler = build(root, "claude", false)?;
            scheduler.resume(&pipeline).map_err(scheduler_error)?;
            println!("{pipeline} resumed");
            Ok(())
        }
        SchedulerCommand::History { root, pipeline } => {
            let scheduler = build(root, "claude", false)?;
            let history = scheduler.history(&pipeline).map_err(scheduler_error)?;
            println!("{}", pretty(&history)?);
            Ok(())
        }
    }
}

/// Build a scheduler. Commands that will invoke the model check backend
/// availability up front and degrade with the dedicated exit code.
fn build(root: PathBuf, backend: &str, needs_backend: bool) -> Result<Scheduler, ExitError> {
    let client = DefaultLlmClient::new(
        CliBackend::new(CliBackendConfig::default().program(backend)),
        PoolConfig::default(),
    );
    if needs_backend && !client.is_available() {
        return Err(ExitError::backend_unavailable(format!(
            "LLM backend {backend:?} is not installed"
        )));
    }
    Ok(Scheduler::new(SchedulerConfig::new(root), Arc::new(client)))
}

fn scheduler_error(e: SchedulerError) -> ExitError {
    match &e {
        SchedulerError::Lock(LockError::Conflict { .. }) => ExitError::failure(e.to_string()),
        SchedulerError::UnknownPipeline(_) => ExitError::missing_prerequisite(e.to_string()),
        _ => ExitError::failure(e.to_string()),
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String, ExitError> {
    serde_json::to_string_pretty(value).map_err(|e| ExitError::failure(e.to_string()))
}
