// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline work items.
//!
//! A [`PipelineItem`] is one unit of map work: an ordered mapping from
//! string keys to scalar values, produced by a splitter (one CSV row, one
//! inline entry, or one generated record) and carried through to the
//! reduced result.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar field value on a pipeline item.
///
/// Untagged variant order matters: bools and numbers must be tried before
/// the catch-all string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Parse a raw cell into the narrowest scalar that fits.
    ///
    /// Used by the CSV source so `limit: 3` style comparisons and JSON
    /// output keep their natural types. Leading/trailing whitespace keeps
    /// the cell textual.
    pub fn sniff(raw: &str) -> Self {
        match raw {
            "true" => return FieldValue::Bool(true),
            "false" => return FieldValue::Bool(false),
            _ => {}
        }
        if raw.trim() == raw && !raw.is_empty() {
            if let Ok(n) = raw.parse::<f64>() {
                if n.is_finite() {
                    return FieldValue::Number(n);
                }
            }
        }
        FieldValue::Text(raw.to_string())
    }

    pub fn as_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            // Whole numbers render without the trailing ".0" so templates
            // see "3", not "3.0".
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// One unit of map work: ordered string keys to scalar values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineItem {
    fields: IndexMap<String, FieldValue>,
}

impl PipelineItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an item from key/value pairs, preserving order.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Build an item from a JSON object, dropping non-scalar members.
    ///
    /// Returns `None` if `value` is not an object.
    pub fn from_json_object(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut item = PipelineItem::new();
        for (key, val) in obj {
            match val {
                serde_json::Value::Bool(b) => item.insert(key.as_str(), *b),
                serde_json::Value::Number(n) => {
                    if let Some(f) = n.as_f64() {
                        item.insert(key.as_str(), f);
                    }
                }
                serde_json::Value::String(s) => item.insert(key.as_str(), s.as_str()),
                _ => {}
            }
        }
        Some(item)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Form the item the template sees: `defaults` first (parameters),
    /// then this item's fields overlaid. Item fields always win on key
    /// collision.
    pub fn merged_with_defaults<'a, I>(&self, defaults: I) -> PipelineItem
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut merged = PipelineItem::new();
        for (name, value) in defaults {
            merged.insert(name, value);
        }
        for (key, value) in &self.fields {
            merged.fields.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Render this item as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> =
            self.fields.iter().map(|(k, v)| (k.clone(), v.as_json())).collect();
        serde_json::Value::Object(map)
    }

    /// Short human-readable label for progress events: the first field's
    /// value, truncated.
    pub fn label(&self) -> Option<String> {
        self.fields.values().next().map(|v| {
            let s = v.to_string();
            if s.chars().count() > 48 {
                let mut t: String = s.chars().take(47).collect();
                t.push('…');
                t
            } else {
                s
            }
        })
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for PipelineItem {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
