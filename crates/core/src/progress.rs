// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress reporting for in-flight jobs.
//!
//! Progress is emitted, never stored: the executor produces a stream of
//! [`JobProgress`] values and hosts subscribe to render them.

use serde::{Deserialize, Serialize};

/// Phase a running job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Split,
    Map,
    Reduce,
    Done,
}

crate::simple_display! {
    JobPhase {
        Split => "split",
        Map => "map",
        Reduce => "reduce",
        Done => "done",
    }
}

/// A progress snapshot for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
    pub phase: JobPhase,
    /// Label of the most recently finished item, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_item: Option<String>,
}

impl JobProgress {
    /// Phase-transition event with no per-item counts yet.
    pub fn at_phase(phase: JobPhase, total: usize) -> Self {
        let completed = if phase == JobPhase::Done { total } else { 0 };
        Self {
            completed,
            total,
            percentage: percentage(completed, total),
            phase,
            last_item: None,
        }
    }

    /// Map-phase step: one more item finished.
    pub fn map_step(completed: usize, total: usize, last_item: Option<String>) -> Self {
        Self {
            completed,
            total,
            percentage: percentage(completed, total),
            phase: JobPhase::Map,
            last_item,
        }
    }
}

fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed * 100) / total).min(100) as u8
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
