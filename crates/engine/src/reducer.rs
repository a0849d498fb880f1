// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reducers: the full `MapResult` set in, one aggregated output out.
//!
//! Four deterministic shapes plus an AI reduce. The AI reduce is the only
//! fallible one, and it never loses the map results: any failure falls
//! back to the deterministic list aggregation.

use fanout_core::{MapResult, PipelineItem};
use fanout_llm::{AiInvoker, InvokeOptions};
use fanout_pipeline::{response, template};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Aggregated job output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReduceOutput {
    Markdown(String),
    Json(serde_json::Value),
    Text(String),
}

impl ReduceOutput {
    /// Render for display or file output.
    pub fn render(&self) -> String {
        match self {
            ReduceOutput::Markdown(s) | ReduceOutput::Text(s) => s.clone(),
            ReduceOutput::Json(v) => {
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            }
        }
    }
}

/// How map results are aggregated.
pub enum Reducer {
    /// Markdown: one section per item showing inputs and outputs.
    List,
    /// Markdown table over the declared output columns.
    Table { inputs: bool, columns: Vec<String> },
    /// Structured `{ results: [...] }`.
    Json,
    /// Concatenated raw responses (text-mode maps only).
    Text { separator: String },
    /// One AI call over the collected results, with a mandatory
    /// deterministic fallback.
    Ai {
        prompt: String,
        output: Vec<String>,
        model: Option<String>,
        invoker: Arc<dyn AiInvoker>,
    },
}

impl Reducer {
    pub fn kind(&self) -> &'static str {
        match self {
            Reducer::List => "list",
            Reducer::Table { .. } => "table",
            Reducer::Json => "json",
            Reducer::Text { .. } => "text",
            Reducer::Ai { .. } => "ai",
        }
    }

    pub async fn reduce(&self, results: &[MapResult], cancel: &CancellationToken) -> ReduceOutput {
        match self {
            Reducer::List => ReduceOutput::Markdown(render_list(results)),
            Reducer::Table { inputs, columns } => {
                ReduceOutput::Markdown(render_table(results, *inputs, columns))
            }
            Reducer::Json => ReduceOutput::Json(render_json(results)),
            Reducer::Text { separator } => ReduceOutput::Text(render_text(results, separator)),
            Reducer::Ai { prompt, output, model, invoker } => {
                ai_reduce(prompt, output, model.as_deref(), invoker.as_ref(), results, cancel)
                    .await
            }
        }
    }
}

fn render_list(results: &[MapResult]) -> String {
    let mut out = format!("# Results ({} items)\n", results.len());
    for (index, result) in results.iter().enumerate() {
        let label = result.item.label().unwrap_or_default();
        out.push_str(&format!("\n## Item {}: {}\n", index + 1, label));

        out.push_str("\n**Inputs:**\n");
        for (key, value) in result.item.iter() {
            out.push_str(&format!("- {}: {}\n", key, value));
        }

        if let Some(output) = &result.output {
            out.push_str("\n**Outputs:**\n");
            for (field, value) in output {
                out.push_str(&format!("- {}: {}\n", field, cell(value)));
            }
        } else if let Some(raw) = &result.raw_response {
            if result.success {
                out.push_str(&format!("\n**Response:**\n\n{}\n", raw));
            }
        }

        if let Some(error) = &result.error {
            out.push_str(&format!("\n**Error:** {}\n", error));
        }
    }
    out
}

fn render_table(results: &[MapResult], inputs: bool, columns: &[String]) -> String {
    let input_keys: Vec<String> = if inputs {
        results
            .first()
            .map(|r| r.item.keys().map(str::to_string).collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    let any_failed = results.iter().any(|r| !r.success);

    let mut header: Vec<String> = input_keys.clone();
    header.extend(columns.iter().cloned());
    if any_failed {
        header.push("error".to_string());
    }

    let mut out = String::new();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(header.len())));

    for result in results {
        let mut row: Vec<String> = Vec::with_capacity(header.len());
        for key in &input_keys {
            row.push(
                result
                    .item
                    .get(key)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        for column in columns {
            row.push(
                result
                    .output_field(column)
                    .map(cell)
                    .unwrap_or_default(),
            );
        }
        if any_failed {
            row.push(result.error.clone().unwrap_or_default());
        }
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

fn render_json(results: &[MapResult]) -> serde_json::Value {
    match serde_json::to_value(results) {
        Ok(array) => serde_json::json!({ "results": array }),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize map results");
            serde_json::json!({ "results": [] })
        }
    }
}

fn render_text(results: &[MapResult], separator: &str) -> String {
    results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.raw_response.as_deref())
        .collect::<Vec<_>>()
        .join(separator)
}

async fn ai_reduce(
    prompt: &str,
    output: &[String],
    model: Option<&str>,
    invoker: &dyn AiInvoker,
    results: &[MapResult],
    cancel: &CancellationToken,
) -> ReduceOutput {
    let results_block = serde_json::to_string_pretty(&render_json(results))
        .unwrap_or_else(|_| "[]".to_string());
    let mut vars = PipelineItem::new();
    vars.insert("RESULTS", results_block);
    vars.insert("COUNT", results.len() as f64);

    let mut rendered = match template::render(prompt, &vars) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::warn!(error = %e, "AI reduce prompt failed to render, falling back to list");
            return ReduceOutput::Markdown(render_list(results));
        }
    };
    if !output.is_empty() {
        let fields = output
            .iter()
            .map(|f| format!("\"{f}\""))
            .collect::<Vec<_>>()
            .join(", ");
        rendered.push_str(&format!(
            "\n\nRespond with a JSON object containing exactly these fields: {fields}. \
             Respond with only the JSON object."
        ));
    }

    let opts = InvokeOptions { model, timeout: None, cancel: Some(cancel) };
    match invoker.invoke(&rendered, opts).await {
        Ok(reply) if output.is_empty() => ReduceOutput::Text(reply.text),
        Ok(reply) => match response::parse_output(&reply.text, output) {
            Ok(fields) => {
                let object: serde_json::Map<String, serde_json::Value> =
                    fields.into_iter().collect();
                ReduceOutput::Json(serde_json::Value::Object(object))
            }
            Err(e) => {
                tracing::warn!(error = %e, "AI reduce reply unparseable, falling back to list");
                ReduceOutput::Markdown(render_list(results))
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "AI reduce call failed, falling back to list");
            ReduceOutput::Markdown(render_list(results))
        }
    }
}

/// Render a JSON value as a table/list cell: bare strings, compact JSON
/// for everything else, empty for null.
fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "reducer_tests.rs"]
mod tests;
