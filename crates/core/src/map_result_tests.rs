// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use indexmap::indexmap;

#[test]
fn success_carries_output() {
    let item = PipelineItem::from_pairs([("title", "A")]);
    let result = MapResult::success(
        item.clone(),
        indexmap! {"severity".to_string() => serde_json::json!("high")},
    );

    assert!(result.success);
    assert_eq!(result.item, item);
    assert_eq!(result.output_field("severity"), Some(&serde_json::json!("high")));
    assert!(result.error.is_none());
}

#[test]
fn failure_carries_diagnostic() {
    let result = MapResult::failure(PipelineItem::new(), "timed out");
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("timed out"));
    assert!(result.output.is_none());
}

#[test]
fn text_mode_carries_raw_response() {
    let result = MapResult::text(PipelineItem::new(), "hello");
    assert!(result.success);
    assert_eq!(result.raw_response.as_deref(), Some("hello"));
    assert!(result.output.is_none());
}

#[test]
fn serialization_omits_absent_fields_and_attempts() {
    let result = MapResult::text(PipelineItem::from_pairs([("a", "1")]), "hi").with_attempts(2);
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["rawResponse"], serde_json::json!("hi"));
    assert!(json.get("output").is_none());
    assert!(json.get("error").is_none());
    assert!(json.get("attempts").is_none());
}

#[test]
fn builder_defaults_are_successful() {
    let result = MapResult::builder().build();
    assert!(result.success);
    assert_eq!(result.attempts, 1);
}

#[test]
fn stats_default_to_zero() {
    let stats = ExecutionStats::default();
    assert_eq!(stats.total_items, 0);
    assert_eq!(stats.failed_maps, 0);
}
