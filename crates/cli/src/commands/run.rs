// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fanout run <pipeline-dir>`

use crate::exit_error::ExitError;
use clap::Args;
use fanout_core::{JobProgress, PipelineItem};
use fanout_engine::{
    rendered_prompts, run_pipeline, run_pipeline_with_items, JobTracker, RunContext, RunError,
};
use fanout_llm::{CliBackend, CliBackendConfig, DefaultLlmClient, PoolConfig};
use fanout_pipeline::PipelineConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline package directory (contains pipeline.yaml)
    pub dir: PathBuf,
    /// JSON file with an approved item list (required for generate inputs)
    #[arg(long)]
    pub items: Option<PathBuf>,
    /// Write the reduced output here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Agent CLI program backing the session pool
    #[arg(long, default_value = "claude")]
    pub backend: String,
    /// Print the rendered prompts without calling the model
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: RunArgs) -> Result<(), ExitError> {
    let config = load_config(&args.dir)?;

    if args.dry_run {
        let prompts = rendered_prompts(&config, &args.dir).map_err(run_error)?;
        for (index, prompt) in prompts.iter().enumerate() {
            println!("--- prompt {} ---\n{}\n", index + 1, prompt);
        }
        return Ok(());
    }

    let client = DefaultLlmClient::new(
        CliBackend::new(CliBackendConfig::default().program(args.backend)),
        PoolConfig::default(),
    );
    if !client.is_available() {
        // Degrade: surface the prompts for manual use.
        if let Ok(prompts) = rendered_prompts(&config, &args.dir) {
            eprintln!("LLM backend not installed; prompts the run would send:\n");
            for prompt in &prompts {
                eprintln!("{prompt}\n");
            }
        }
        return Err(ExitError::backend_unavailable("LLM backend unavailable"));
    }

    let items = args.items.as_deref().map(load_items).transpose()?;

    let tracker = JobTracker::new();
    let job_id = fanout_core::JobId::new();
    let cancel =
        tracker.register(job_id, "pipeline", config.name.as_str(), Some(&config.map.prompt));

    // Ctrl-C cancels cooperatively; the run resolves with partial results.
    {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("cancelling…");
                tracker.cancel(job_id);
            }
        });
    }

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(progress_rx));

    let invoker: Arc<dyn fanout_llm::AiInvoker> = Arc::new(client);
    let ctx = RunContext::new(Arc::clone(&invoker), args.dir.clone())
        .progress(progress_tx)
        .cancel(cancel);

    let outcome = match items {
        Some(items) => run_pipeline_with_items(&config, items, ctx).await,
        None => run_pipeline(&config, ctx).await,
    };
    let _ = printer.await;

    let run = outcome.map_err(run_error)?;
    if run.success {
        tracker.complete(job_id, Some(&run.output.render()));
    } else {
        tracker.fail(job_id, "one or more items failed");
    }
    tracing::info!(
        job = %job_id,
        success = run.success,
        items = run.stats.total_items,
        map_ms = run.stats.map_phase_ms,
        "run recorded"
    );

    let rendered = run.output.render();
    match &args.output {
        Some(path) => std::fs::write(path, &rendered)
            .map_err(|e| ExitError::failure(format!("cannot write {}: {e}", path.display())))?,
        None => println!("{rendered}"),
    }

    if run.success {
        Ok(())
    } else {
        let failed = run.map_results.iter().filter(|r| !r.success).count();
        Err(ExitError::failure(format!(
            "{failed} of {} items failed",
            run.stats.total_items
        )))
    }
}

fn load_config(dir: &Path) -> Result<PipelineConfig, ExitError> {
    let path = dir.join("pipeline.yaml");
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        ExitError::missing_prerequisite(format!("cannot read {}: {e}", path.display()))
    })?;
    PipelineConfig::from_yaml(&raw).map_err(|e| ExitError::failure(e.to_string()))
}

/// Load an approved item list: a JSON array of flat objects.
fn load_items(path: &Path) -> Result<Vec<PipelineItem>, ExitError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ExitError::missing_prerequisite(format!("cannot read {}: {e}", path.display()))
    })?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| ExitError::failure(format!("invalid items file: {e}")))?;
    let array = value
        .as_array()
        .ok_or_else(|| ExitError::failure("items file must be a JSON array of objects"))?;
    array
        .iter()
        .map(|entry| {
            PipelineItem::from_json_object(entry)
                .ok_or_else(|| ExitError::failure("items file entries must be flat objects"))
        })
        .collect()
}

fn run_error(e: RunError) -> ExitError {
    match e {
        RunError::GenerateRequiresItems => ExitError::missing_prerequisite(format!(
            "{e}; pass --items <file> with the approved list"
        )),
        other => ExitError::failure(other.to_string()),
    }
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<JobProgress>) {
    while let Some(progress) = rx.recv().await {
        match progress.last_item {
            Some(item) => eprintln!(
                "[{}] {}/{} ({}%) {}",
                progress.phase, progress.completed, progress.total, progress.percentage, item
            ),
            None => eprintln!("[{}] {}/{}", progress.phase, progress.completed, progress.total),
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
