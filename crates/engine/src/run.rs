// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pipeline executor: validated config in, executed job out.
//!
//! Assembles the splitter/mapper/reducer from a [`PipelineConfig`] and
//! delegates to [`run_job`]. The only failures here are pre-run ones:
//! validation, item production, and the generate-without-approved-items
//! refusal. Per-item failures live inside the returned results.

use crate::executor::{run_job, ExecuteError, JobOutcome};
use crate::job::{Job, JobOptions, ProgressSender};
use crate::mapper::PromptMapper;
use crate::reducer::{ReduceOutput, Reducer};
use crate::splitter::{SplitError, Splitter};
use fanout_core::{ExecutionStats, JobId, MapResult, PipelineItem};
use fanout_llm::AiInvoker;
use fanout_pipeline::{csv_source, template, validate, PipelineConfig, ReduceSpec, ValidationError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that fail a pipeline run before any AI call
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("generate input requires an externally approved item list; \
             run the pipeline with explicit items")]
    GenerateRequiresItems,
    #[error("items are missing template variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),
    #[error(transparent)]
    Split(#[from] SplitError),
}

impl From<ExecuteError> for RunError {
    fn from(e: ExecuteError) -> Self {
        match e {
            ExecuteError::Split(split) => RunError::Split(split),
        }
    }
}

/// Collaborators and knobs for one pipeline run.
pub struct RunContext {
    pub invoker: Arc<dyn AiInvoker>,
    /// Package directory CSV paths resolve against.
    pub pipeline_dir: PathBuf,
    pub progress: Option<ProgressSender>,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(invoker: Arc<dyn AiInvoker>, pipeline_dir: impl Into<PathBuf>) -> Self {
        Self {
            invoker,
            pipeline_dir: pipeline_dir.into(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    fanout_core::setters! {
        set {
            cancel: CancellationToken,
        }
        option {
            progress: ProgressSender,
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    pub job_id: JobId,
    pub success: bool,
    pub output: ReduceOutput,
    pub map_results: Vec<MapResult>,
    pub stats: ExecutionStats,
}

impl From<JobOutcome> for PipelineRun {
    fn from(outcome: JobOutcome) -> Self {
        Self {
            job_id: outcome.job_id,
            success: outcome.success,
            output: outcome.output,
            map_results: outcome.map_results,
            stats: outcome.stats,
        }
    }
}

/// Execute a pipeline from its declared input source.
///
/// Refuses `generate` inputs: the engine never runs AI-generated items
/// that a collaborator has not explicitly approved; use
/// [`run_pipeline_with_items`] for those.
pub async fn run_pipeline(
    config: &PipelineConfig,
    ctx: RunContext,
) -> Result<PipelineRun, RunError> {
    validate(config, &ctx.pipeline_dir)?;
    if config.input.generate.is_some() {
        return Err(RunError::GenerateRequiresItems);
    }

    let splitter = splitter_from_config(config, &ctx.pipeline_dir)?;
    run_assembled(config, splitter, ctx).await
}

/// Execute a pipeline over an explicit item list, bypassing the splitter.
///
/// This is the mandatory entry point for `generate` inputs (the approved
/// list) and is also how hosts re-run a pipeline over a curated subset.
pub async fn run_pipeline_with_items(
    config: &PipelineConfig,
    items: Vec<PipelineItem>,
    ctx: RunContext,
) -> Result<PipelineRun, RunError> {
    validate(config, &ctx.pipeline_dir)?;

    let splitter = Splitter::provided(items)
        .with_parameters(config.input.parameter_pairs())
        .with_limit(config.input.limit);
    run_assembled(config, splitter, ctx).await
}

async fn run_assembled(
    config: &PipelineConfig,
    splitter: Splitter,
    ctx: RunContext,
) -> Result<PipelineRun, RunError> {
    // Materialize and check template totality now: an unresolved variable
    // anywhere fails the run before the first AI call.
    let items = splitter.split()?;
    let mut missing = Vec::new();
    for item in &items {
        for var in template::unresolved_vars(&config.map.prompt, item) {
            if !missing.contains(&var) {
                missing.push(var);
            }
        }
    }
    if !missing.is_empty() {
        return Err(RunError::MissingVariables(missing));
    }

    let mapper = PromptMapper::new(
        Arc::clone(&ctx.invoker),
        config.map.prompt.clone(),
        config.map.output.clone(),
    )
    .with_model(config.map.model.clone());

    let job = Job::new(
        config.name.clone(),
        Splitter::provided(items),
        Arc::new(mapper),
        reducer_from_config(config, &ctx.invoker),
    )
    .with_options(JobOptions {
        max_concurrency: config.map.parallel,
        timeout: config.map.timeout(),
        progress: ctx.progress,
        cancel: ctx.cancel,
    });

    tracing::info!(pipeline = %config.name, job = %job.id, "executing pipeline");
    let outcome = run_job(job).await?;
    Ok(outcome.into())
}

/// Render the prompts a run would send, without invoking anything.
///
/// This is the degraded path when the LLM backend is unavailable: the
/// host surfaces the prompts for manual use. For `generate` inputs the
/// single item-generation prompt is returned instead.
pub fn rendered_prompts(
    config: &PipelineConfig,
    pipeline_dir: &std::path::Path,
) -> Result<Vec<String>, RunError> {
    validate(config, pipeline_dir)?;
    let splitter = splitter_from_config(config, pipeline_dir)?;
    if let Some(prompt) = splitter.generation_prompt() {
        return Ok(vec![prompt]);
    }

    let items = splitter.split()?;
    let mut prompts = Vec::with_capacity(items.len());
    for item in &items {
        match crate::mapper::build_prompt(&config.map.prompt, &config.map.output, item) {
            Ok(prompt) => prompts.push(prompt),
            Err(template::TemplateError::Unresolved(vars)) => {
                return Err(RunError::MissingVariables(vars));
            }
        }
    }
    Ok(prompts)
}

fn splitter_from_config(
    config: &PipelineConfig,
    pipeline_dir: &std::path::Path,
) -> Result<Splitter, RunError> {
    let base = if let Some(items) = &config.input.items {
        Splitter::inline(items.clone())
    } else if let Some(from) = &config.input.from {
        let delimiter = from
            .delimiter
            .as_deref()
            .map(csv_source::parse_delimiter)
            .transpose()
            .map_err(|e| RunError::Split(SplitError::Csv(e)))?;
        Splitter::csv(csv_source::resolve_path(pipeline_dir, &from.path), delimiter)
    } else {
        // Unreachable after validation + the generate refusal; keep the
        // splitter's own refusal as the backstop.
        let generate = match &config.input.generate {
            Some(generate) => generate,
            None => return Err(RunError::GenerateRequiresItems),
        };
        Splitter::generate(generate.prompt.clone(), generate.schema.clone())
    };

    Ok(base
        .with_parameters(config.input.parameter_pairs())
        .with_limit(config.input.limit))
}

fn reducer_from_config(config: &PipelineConfig, invoker: &Arc<dyn AiInvoker>) -> Reducer {
    match &config.reduce {
        ReduceSpec::List => Reducer::List,
        ReduceSpec::Table { inputs } => Reducer::Table {
            inputs: *inputs,
            columns: config.map.output.clone(),
        },
        ReduceSpec::Json => Reducer::Json,
        ReduceSpec::Text { separator } => Reducer::Text { separator: separator.clone() },
        ReduceSpec::Ai { prompt, output } => Reducer::Ai {
            prompt: prompt.clone(),
            output: output.clone(),
            model: config.map.model.clone(),
            invoker: Arc::clone(invoker),
        },
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
