// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fanout-engine: the map-reduce substrate and the pipeline executor.
//!
//! A [`Job`] is a splitter, a mapper, and a reducer; the executor runs it
//! under a bounded-parallelism budget with per-item timeout, one doubled
//! retry, cooperative cancellation, and structured progress events.
//! [`run_pipeline`] assembles a job from a validated [`PipelineConfig`]
//! and delegates to the executor.

pub mod executor;
pub mod job;
pub mod limiter;
pub mod mapper;
pub mod reducer;
pub mod run;
pub mod splitter;
pub mod tracker;

pub use executor::{run_job, ExecuteError, JobOutcome};
pub use job::{Job, JobOptions, ProgressSender};
pub use limiter::{Limiter, Settled};
pub use mapper::{build_prompt, MapCtx, Mapper, PromptMapper};
pub use reducer::{ReduceOutput, Reducer};
pub use run::{
    rendered_prompts, run_pipeline, run_pipeline_with_items, PipelineRun, RunContext, RunError,
};
pub use splitter::{SplitError, Splitter};
pub use tracker::{JobRecord, JobStatus, JobTracker, TrackerEvent};
