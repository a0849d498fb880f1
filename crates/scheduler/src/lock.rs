// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusive scheduler lock.
//!
//! Two mechanisms back each other up: an advisory `flock` (released by
//! the OS when the holder dies) and a JSON heartbeat inside the file
//! (covers filesystems where locks don't propagate between hosts). A
//! starting scheduler refuses to wait: if a live lock exists it fails
//! immediately with a conflict.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const LOCK_FILE: &str = "scheduler.lock";
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(60);

/// Errors from lock handling
#[derive(Debug, Error)]
pub enum LockError {
    #[error("scheduler already running (pid {pid} on {hostname})")]
    Conflict { pid: u32, hostname: String },
    #[error("lock file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("lock file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Contents of the lock file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub pid: u32,
    pub hostname: String,
    pub started_at: DateTime<Utc>,
    pub heartbeat: DateTime<Utc>,
}

impl LockInfo {
    fn current(now: DateTime<Utc>) -> Self {
        Self {
            pid: std::process::id(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            started_at: now,
            heartbeat: now,
        }
    }

    /// A lock is stale once its heartbeat is older than the threshold.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match (now - self.heartbeat).to_std() {
            Ok(age) => age > threshold,
            // Heartbeat in the future: clock skew, treat as live.
            Err(_) => false,
        }
    }
}

/// Held exclusive lock. Released (and the file removed) on drop.
#[derive(Debug)]
pub struct SchedulerLock {
    file: std::fs::File,
    path: PathBuf,
    info: LockInfo,
}

impl SchedulerLock {
    /// Acquire the lock in `dir`, refusing if a live holder exists.
    pub fn acquire(
        dir: &Path,
        stale_threshold: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE);
        // Open without truncating so a running holder's info is not wiped
        // before we know the lock is ours.
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Io { path: path.clone(), source })?;

        if file.try_lock_exclusive().is_err() {
            // A live process holds the flock.
            let holder = read_info(&mut file, &path).ok().flatten();
            return Err(conflict(holder));
        }

        // We hold the flock, but the file may carry a fresh heartbeat from
        // a holder on another host (shared filesystem). Garbage content is
        // treated as no holder.
        let existing = match read_info(&mut file, &path) {
            Ok(existing) => existing,
            Err(LockError::Malformed { .. }) => {
                tracing::warn!(path = %path.display(), "ignoring malformed lock file content");
                None
            }
            Err(e) => return Err(e),
        };
        if let Some(existing) = existing {
            let ours = existing.pid == std::process::id()
                && existing.hostname == LockInfo::current(now).hostname;
            if !ours && !existing.is_stale(now, stale_threshold) {
                fs2::FileExt::unlock(&file)
                    .map_err(|source| LockError::Io { path: path.clone(), source })?;
                return Err(conflict(Some(existing)));
            }
            if existing.is_stale(now, stale_threshold) {
                tracing::warn!(
                    pid = existing.pid,
                    hostname = %existing.hostname,
                    "taking over stale scheduler lock"
                );
            }
        }

        let info = LockInfo::current(now);
        let mut lock = Self { file, path, info };
        lock.write_info()?;
        Ok(lock)
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Refresh the heartbeat stamp.
    pub fn heartbeat(&mut self, now: DateTime<Utc>) -> Result<(), LockError> {
        self.info.heartbeat = now;
        self.write_info()
    }

    fn write_info(&mut self) -> Result<(), LockError> {
        let json = serde_json::to_string_pretty(&self.info)
            .map_err(|source| LockError::Malformed { path: self.path.clone(), source })?;
        let io = |source| LockError::Io { path: self.path.clone(), source };
        self.file.set_len(0).map_err(io)?;
        self.file.rewind().map_err(io)?;
        self.file.write_all(json.as_bytes()).map_err(io)?;
        self.file.flush().map_err(io)
    }
}

impl Drop for SchedulerLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

fn read_info(
    file: &mut std::fs::File,
    path: &Path,
) -> Result<Option<LockInfo>, LockError> {
    let mut raw = String::new();
    file.rewind()
        .and_then(|_| file.read_to_string(&mut raw))
        .map_err(|source| LockError::Io { path: path.to_path_buf(), source })?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| LockError::Malformed { path: path.to_path_buf(), source })
}

fn conflict(holder: Option<LockInfo>) -> LockError {
    match holder {
        Some(info) => LockError::Conflict { pid: info.pid, hostname: info.hostname },
        None => LockError::Conflict { pid: 0, hostname: "unknown".to_string() },
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
