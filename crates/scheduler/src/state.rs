// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pipeline schedule state, persisted as JSON.
//!
//! One `schedule-state.json` per pipeline directory, written atomically
//! (temp file then rename) so a crash never leaves a torn file. The
//! writer is whoever holds the scheduler lock.

use chrono::{DateTime, Utc};
use fanout_core::ScheduleId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STATE_FILE: &str = "schedule-state.json";
pub const CURRENT_STATE_VERSION: u32 = 1;
/// History is bounded; the oldest records are pruned.
pub const MAX_HISTORY: usize = 50;

/// Errors from state file handling
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Lifecycle state of one schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Idle,
    Running,
    Paused,
    Error,
    Disabled,
}

fanout_core::simple_display! {
    ScheduleStatus {
        Idle => "idle",
        Running => "running",
        Paused => "paused",
        Error => "error",
        Disabled => "disabled",
    }
}

/// Record of one completed (or failed) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counters over all runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStats {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_duration_ms: Option<u64>,
}

/// The persisted schedule state for one pipeline directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleState {
    pub version: u32,
    pub schedule_id: ScheduleId,
    pub pipeline_id: String,
    pub status: ScheduleStatus,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: ScheduleStats,
    /// Newest last; bounded at [`MAX_HISTORY`].
    #[serde(default)]
    pub history: Vec<RunRecord>,
}

impl ScheduleState {
    pub fn new(pipeline_id: impl Into<String>, enabled: bool) -> Self {
        Self {
            version: CURRENT_STATE_VERSION,
            schedule_id: ScheduleId::new(),
            pipeline_id: pipeline_id.into(),
            status: if enabled { ScheduleStatus::Idle } else { ScheduleStatus::Disabled },
            enabled,
            last_run: None,
            next_run: None,
            stats: ScheduleStats::default(),
            history: Vec::new(),
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(STATE_FILE)
    }

    /// Load the state file, if present.
    pub fn load(dir: &Path) -> Result<Option<Self>, StateError> {
        let path = Self::path(dir);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StateError::Io { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StateError::Corrupt { path, source })
    }

    /// Write atomically: serialize to a temp file in the same directory,
    /// then rename over the real one.
    pub fn save(&self, dir: &Path) -> Result<(), StateError> {
        let path = Self::path(dir);
        let tmp = dir.join(format!("{STATE_FILE}.tmp"));
        let json = serde_json::to_string_pretty(self)
            .map_err(|source| StateError::Corrupt { path: path.clone(), source })?;
        std::fs::write(&tmp, json)
            .map_err(|source| StateError::Io { path: tmp.clone(), source })?;
        std::fs::rename(&tmp, &path).map_err(|source| StateError::Io { path, source })
    }

    /// Fold one finished run into last_run, stats, and bounded history.
    pub fn record_run(&mut self, record: RunRecord) {
        self.stats.total_runs += 1;
        if record.success {
            self.stats.successful_runs += 1;
        } else {
            self.stats.failed_runs += 1;
            self.stats.last_failure = record.completed_at.or(Some(record.started_at));
        }
        let n = self.stats.total_runs;
        let prior = self.stats.average_duration_ms.unwrap_or(0);
        self.stats.average_duration_ms =
            Some((prior * (n - 1) + record.duration_ms) / n.max(1));

        self.last_run = Some(record.clone());
        self.history.push(record);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
