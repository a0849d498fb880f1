// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline package discovery.
//!
//! A schedulable pipeline is a child directory of the scheduler root
//! containing a `pipeline.yaml` with a `schedule:` block. Unparseable
//! packages are skipped with a warning rather than failing the scan.

use crate::config::ScheduleConfig;
use fanout_pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PIPELINE_FILE: &str = "pipeline.yaml";

/// Errors from package discovery
#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("cannot scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One schedulable pipeline package.
#[derive(Debug, Clone)]
pub struct DiscoveredSchedule {
    /// Directory name, used as the pipeline id.
    pub pipeline_id: String,
    pub dir: PathBuf,
    pub config: PipelineConfig,
    pub schedule: ScheduleConfig,
}

/// Just the schedule block of a pipeline file.
#[derive(Deserialize)]
struct ScheduleDoc {
    schedule: Option<ScheduleConfig>,
}

/// Scan `root` for schedulable pipeline packages, sorted by id.
pub fn discover(root: &Path) -> Result<Vec<DiscoveredSchedule>, DiscoverError> {
    let entries = std::fs::read_dir(root)
        .map_err(|source| DiscoverError::Io { path: root.to_path_buf(), source })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|source| DiscoverError::Io { path: root.to_path_buf(), source })?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let file = dir.join(PIPELINE_FILE);
        if !file.is_file() {
            continue;
        }
        let Some(discovered) = load_package(&dir, &file) else {
            continue;
        };
        found.push(discovered);
    }

    found.sort_by(|a, b| a.pipeline_id.cmp(&b.pipeline_id));
    Ok(found)
}

/// Load one package; `None` (with a warning) for anything unusable.
fn load_package(dir: &Path, file: &Path) -> Option<DiscoveredSchedule> {
    let raw = match std::fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "skipping unreadable pipeline");
            return None;
        }
    };

    let schedule = match serde_yaml::from_str::<ScheduleDoc>(&raw) {
        Ok(doc) => doc.schedule?,
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "skipping malformed pipeline");
            return None;
        }
    };
    if let Err(e) = schedule.check() {
        tracing::warn!(path = %file.display(), error = %e, "skipping pipeline with bad schedule");
        return None;
    }

    let config = match PipelineConfig::from_yaml(&raw) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "skipping malformed pipeline");
            return None;
        }
    };

    let pipeline_id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.name.clone());

    Some(DiscoveredSchedule {
        pipeline_id,
        dir: dir.to_path_buf(),
        config,
        schedule,
    })
}

#[cfg(test)]
#[path = "discover_tests.rs"]
mod tests;
