// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mappers: one item in, one [`MapResult`] out.
//!
//! A mapper never fails the batch. AI errors, parse failures, and
//! timeouts all come back as `success = false` results; only a panic is
//! a contract violation (coerced and counted by the executor).

use async_trait::async_trait;
use fanout_core::{MapResult, PipelineItem};
use fanout_llm::{AiInvoker, InvokeOptions};
use fanout_pipeline::{response, template};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-attempt context handed to the mapper by the executor.
pub struct MapCtx<'a> {
    /// Cancelled when the attempt is timed out or the job is cancelled.
    pub cancel: &'a CancellationToken,
    /// 1 on the first attempt, 2 on the doubled-timeout retry.
    pub attempt: u32,
    /// Budget for this attempt (doubled on retry).
    pub timeout: Duration,
}

#[async_trait]
pub trait Mapper: Send + Sync + 'static {
    async fn map(&self, item: &PipelineItem, ctx: MapCtx<'_>) -> MapResult;
}

/// The default mapper: renders the prompt template against the item,
/// invokes the model, and parses the reply per the declared output.
pub struct PromptMapper {
    invoker: Arc<dyn AiInvoker>,
    prompt: String,
    output: Vec<String>,
    model: Option<String>,
}

impl PromptMapper {
    pub fn new(
        invoker: Arc<dyn AiInvoker>,
        prompt: impl Into<String>,
        output: Vec<String>,
    ) -> Self {
        Self {
            invoker,
            prompt: prompt.into(),
            output,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// The full prompt for one item.
    pub fn full_prompt(&self, item: &PipelineItem) -> Result<String, template::TemplateError> {
        build_prompt(&self.prompt, &self.output, item)
    }
}

/// Render the per-item prompt: the template against the merged item, plus
/// the JSON instruction when output fields are declared.
pub fn build_prompt(
    prompt: &str,
    output: &[String],
    item: &PipelineItem,
) -> Result<String, template::TemplateError> {
    let rendered = template::render(prompt, item)?;
    if output.is_empty() {
        return Ok(rendered);
    }
    let fields = output
        .iter()
        .map(|f| format!("\"{f}\""))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "{rendered}\n\nRespond with a JSON object containing exactly these fields: \
         {fields}. Respond with only the JSON object."
    ))
}

#[async_trait]
impl Mapper for PromptMapper {
    async fn map(&self, item: &PipelineItem, ctx: MapCtx<'_>) -> MapResult {
        // Unresolved variables are checked before the run starts; hitting
        // one here still must not panic.
        let prompt = match self.full_prompt(item) {
            Ok(prompt) => prompt,
            Err(e) => return MapResult::failure(item.clone(), e.to_string()),
        };

        let opts = InvokeOptions {
            model: self.model.as_deref(),
            timeout: Some(ctx.timeout),
            cancel: Some(ctx.cancel),
        };
        let reply = match self.invoker.invoke(&prompt, opts).await {
            Ok(reply) => reply,
            Err(e) => return MapResult::failure(item.clone(), e.to_string()),
        };

        if self.output.is_empty() {
            return MapResult::text(item.clone(), reply.text);
        }

        match response::parse_output(&reply.text, &self.output) {
            Ok(output) => MapResult::success(item.clone(), output).with_raw_response(reply.text),
            Err(e) => {
                tracing::debug!(error = %e, "map reply had no parseable JSON object");
                MapResult::failure(item.clone(), e.to_string()).with_raw_response(reply.text)
            }
        }
    }
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod tests;
