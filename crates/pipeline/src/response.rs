// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON extraction from model replies.
//!
//! Models rarely return bare JSON. Three strategies are tried in order:
//! a direct parse, a fenced ```json block, and the first balanced
//! `{...}` span. Declared fields are then coerced: unknown fields are
//! dropped, declared-but-missing fields become `null`.

use indexmap::IndexMap;
use thiserror::Error;

/// Errors from reply parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseParseError {
    #[error("no JSON object found in response")]
    NoJsonObject,
}

/// Pull a JSON object out of free-form reply text.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    if let Some(value) = fenced_json_block(text) {
        return Some(value);
    }

    balanced_object(text)
}

/// Coerce a parsed object onto the declared fields: declared-but-missing
/// become `null`, undeclared are dropped. Order follows the declaration.
pub fn coerce_fields(
    value: &serde_json::Value,
    declared: &[String],
) -> IndexMap<String, serde_json::Value> {
    let empty = serde_json::Map::new();
    let obj = value.as_object().unwrap_or(&empty);
    declared
        .iter()
        .map(|field| {
            let v = obj.get(field).cloned().unwrap_or(serde_json::Value::Null);
            (field.clone(), v)
        })
        .collect()
}

/// Extract and coerce in one step.
pub fn parse_output(
    text: &str,
    declared: &[String],
) -> Result<IndexMap<String, serde_json::Value>, ResponseParseError> {
    let value = extract_json_object(text).ok_or(ResponseParseError::NoJsonObject)?;
    Ok(coerce_fields(&value, declared))
}

fn fenced_json_block(text: &str) -> Option<serde_json::Value> {
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        let after_fence = &rest[start + 3..];
        let (tag, body_start) = match after_fence.find('\n') {
            Some(nl) => (after_fence[..nl].trim(), &after_fence[nl + 1..]),
            None => return None,
        };
        if tag.eq_ignore_ascii_case("json") {
            let body = match body_start.find("```") {
                Some(end) => &body_start[..end],
                None => body_start,
            };
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(body.trim()) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
        rest = body_start;
    }
    None
}

/// Scan for the first balanced `{...}` span, respecting strings and
/// escapes, and try to parse it.
fn balanced_object(text: &str) -> Option<serde_json::Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + 1];
                    return serde_json::from_str::<serde_json::Value>(candidate)
                        .ok()
                        .filter(|v| v.is_object());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
