// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-item map outcomes and whole-run statistics.

use crate::item::PipelineItem;
use indexmap::IndexMap;
use serde::Serialize;

/// Outcome of mapping a single item. Immutable once the mapper returns.
///
/// A mapper never fails the batch: AI errors, timeouts, and parse failures
/// all land here as `success = false` with a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapResult {
    pub item: PipelineItem,
    pub success: bool,
    /// Declared output fields, present when the map ran in JSON mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<IndexMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Raw model response, carried in text mode (empty `output` list).
    #[serde(rename = "rawResponse", skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    /// How many attempts the executor made (1, or 2 after a timeout retry).
    #[serde(skip)]
    pub attempts: u32,
}

impl MapResult {
    /// Successful JSON-mode result.
    pub fn success(item: PipelineItem, output: IndexMap<String, serde_json::Value>) -> Self {
        Self {
            item,
            success: true,
            output: Some(output),
            error: None,
            raw_response: None,
            attempts: 1,
        }
    }

    /// Successful text-mode result carrying the raw response.
    pub fn text(item: PipelineItem, raw_response: impl Into<String>) -> Self {
        Self {
            item,
            success: true,
            output: None,
            error: None,
            raw_response: Some(raw_response.into()),
            attempts: 1,
        }
    }

    /// Failed result with a diagnostic.
    pub fn failure(item: PipelineItem, error: impl Into<String>) -> Self {
        Self {
            item,
            success: false,
            output: None,
            error: Some(error.into()),
            raw_response: None,
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Keep the raw response alongside a parsed (or failed) result.
    pub fn with_raw_response(mut self, raw: impl Into<String>) -> Self {
        self.raw_response = Some(raw.into());
        self
    }

    /// Value of one declared output field, if the map succeeded.
    pub fn output_field(&self, name: &str) -> Option<&serde_json::Value> {
        self.output.as_ref()?.get(name)
    }
}

/// Timing and count statistics for one executed job.
///
/// `failed_maps` counts mapper contract violations (a map task that
/// panicked) only; ordinary per-item failures are visible as
/// `success = false` map results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    pub total_items: usize,
    pub successful_maps: usize,
    pub failed_maps: usize,
    pub map_phase_ms: u64,
    pub reduce_phase_ms: u64,
    pub total_ms: u64,
}

crate::builder! {
    pub struct MapResultBuilder => MapResult {
        set {
            item: PipelineItem = PipelineItem::from_pairs([("title", "test")]),
            success: bool = true,
            attempts: u32 = 1,
        }
        option {
            output: IndexMap<String, serde_json::Value> = None,
            error: String = None,
            raw_response: String = None,
        }
    }
}

#[cfg(test)]
#[path = "map_result_tests.rs"]
mod tests;
