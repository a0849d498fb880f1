// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The map-reduce job: splitter + mapper + reducer + run options.

use crate::mapper::Mapper;
use crate::reducer::Reducer;
use crate::splitter::Splitter;
use fanout_core::{JobId, JobProgress};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Channel the executor emits [`JobProgress`] events on.
pub type ProgressSender = mpsc::UnboundedSender<JobProgress>;

/// Execution options for one job.
#[derive(Clone, Default)]
pub struct JobOptions {
    /// Parallel mapper budget (the limiter's K). Zero is clamped to 1.
    pub max_concurrency: usize,
    /// Per-item budget; one retry at double this on the first timeout.
    pub timeout: Duration,
    pub progress: Option<ProgressSender>,
    pub cancel: CancellationToken,
}

impl JobOptions {
    pub fn new(max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            max_concurrency,
            timeout,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    fanout_core::setters! {
        set {
            max_concurrency: usize,
            timeout: Duration,
            cancel: CancellationToken,
        }
        option {
            progress: ProgressSender,
        }
    }
}

/// A runnable map-reduce job.
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub splitter: Splitter,
    pub mapper: Arc<dyn Mapper>,
    pub reducer: Reducer,
    pub options: JobOptions,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        splitter: Splitter,
        mapper: Arc<dyn Mapper>,
        reducer: Reducer,
    ) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            splitter,
            mapper,
            reducer,
            options: JobOptions::new(5, Duration::from_secs(600)),
        }
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }
}
