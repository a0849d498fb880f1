// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process helpers with deadline and cancellation handling.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Errors from subprocess execution
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{what} failed to spawn: {source}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },
    #[error("{what} aborted")]
    Aborted { what: String },
    #[error("{what} I/O error: {source}")]
    Io {
        what: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run a command to completion, killing it at the deadline.
pub async fn run_with_timeout(
    cmd: Command,
    timeout: Duration,
    what: &str,
) -> Result<Output, SubprocessError> {
    run_cancellable(cmd, timeout, &CancellationToken::new(), what).await
}

/// Run a command to completion, killing it at the deadline or when the
/// token fires, whichever comes first.
pub async fn run_cancellable(
    mut cmd: Command,
    timeout: Duration,
    cancel: &CancellationToken,
    what: &str,
) -> Result<Output, SubprocessError> {
    cmd.stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| SubprocessError::Spawn {
        what: what.to_string(),
        source,
    })?;

    tokio::select! {
        result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(SubprocessError::Io { what: what.to_string(), source }),
            // kill_on_drop reaps the child once the future is dropped
            Err(_) => Err(SubprocessError::Timeout { what: what.to_string(), after: timeout }),
        },
        _ = cancel.cancelled() => Err(SubprocessError::Aborted { what: what.to_string() }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
