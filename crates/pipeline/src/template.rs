// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt template interpolation.
//!
//! Placeholders are `{{name}}`. Every placeholder must resolve against the
//! merged item before any AI call is made; an unresolved variable fails
//! the whole run, not the item.

use fanout_core::PipelineItem;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Regex pattern for {{variable_name}}
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
pub static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("constant regex pattern is valid")
});

/// Errors from template rendering
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unresolved template variables: {}", .0.join(", "))]
    Unresolved(Vec<String>),
}

/// Extract `{{var}}` names as a unique, ordered set.
pub fn extract_vars(template: &str) -> Vec<String> {
    let mut vars = Vec::new();
    for caps in VAR_PATTERN.captures_iter(template) {
        let name = &caps[1];
        if !vars.iter().any(|v| v == name) {
            vars.push(name.to_string());
        }
    }
    vars
}

/// Variables in `template` that `item` does not cover.
pub fn unresolved_vars(template: &str, item: &PipelineItem) -> Vec<String> {
    extract_vars(template)
        .into_iter()
        .filter(|var| !item.contains_key(var))
        .collect()
}

/// Substitute every `{{var}}` from the merged item.
///
/// Fails if any variable is unresolved; the caller checks this before
/// invoking the model.
pub fn render(template: &str, item: &PipelineItem) -> Result<String, TemplateError> {
    let missing = unresolved_vars(template, item);
    if !missing.is_empty() {
        return Err(TemplateError::Unresolved(missing));
    }

    let rendered = VAR_PATTERN.replace_all(template, |caps: &regex::Captures| {
        match item.get(&caps[1]) {
            Some(value) => value.to_string(),
            // Unreachable after the check above; keep the placeholder.
            None => caps[0].to_string(),
        }
    });
    Ok(rendered.into_owned())
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
