// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session backends: how conversational sessions are actually opened.
//!
//! The pool is generic over a [`SessionBackend`]. The production backend
//! shells out to an agent CLI and keeps conversation continuity through
//! its resume id; tests use [`FakeBackend`].

use crate::subprocess::{run_cancellable, SubprocessError};
use async_trait::async_trait;
use fanout_core::SessionId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("LLM backend not installed")]
    Unavailable,
    #[error("session spawn failed: {0}")]
    SpawnFailed(String),
    #[error("session transport error: {0}")]
    Transport(String),
    #[error("session call timed out after {0:?}")]
    Timeout(Duration),
    #[error("session call aborted")]
    Aborted,
    #[error("session protocol error: {0}")]
    Protocol(String),
}

/// One conversational session. Exclusively held by one caller at a time.
#[async_trait]
pub trait BackendSession: Send + 'static {
    fn id(&self) -> &SessionId;

    /// Issue one prompt and wait for the reply.
    ///
    /// Any error leaves the conversation state unknown; the pool destroys
    /// the session rather than returning it.
    async fn send(
        &mut self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, SessionError>;

    /// Tear the session down gracefully.
    async fn close(&mut self);
}

/// Opens sessions. Cloned freely; clones share backend configuration.
#[async_trait]
pub trait SessionBackend: Clone + Send + Sync + 'static {
    type Session: BackendSession;

    /// Whether the backend can open sessions at all (e.g. the CLI binary
    /// is installed).
    fn is_available(&self) -> bool;

    async fn open(&self, model: Option<&str>) -> Result<Self::Session, SessionError>;
}

/// Configuration for the CLI-based backend.
#[derive(Debug, Clone)]
pub struct CliBackendConfig {
    /// Program to invoke (resolved via PATH).
    pub program: String,
    /// Extra arguments prepended to every call.
    pub extra_args: Vec<String>,
    /// Working directory for the agent process.
    pub working_dir: Option<PathBuf>,
}

impl Default for CliBackendConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            extra_args: Vec::new(),
            working_dir: None,
        }
    }
}

impl CliBackendConfig {
    fanout_core::setters! {
        into {
            program: String,
        }
        set {
            extra_args: Vec<String>,
        }
        option {
            working_dir: PathBuf,
        }
    }
}

/// Production backend: one agent-CLI process per prompt, conversation
/// continuity via the CLI's resume id.
#[derive(Debug, Clone, Default)]
pub struct CliBackend {
    config: CliBackendConfig,
}

impl CliBackend {
    pub fn new(config: CliBackendConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionBackend for CliBackend {
    type Session = CliSession;

    fn is_available(&self) -> bool {
        program_on_path(&self.config.program)
    }

    async fn open(&self, model: Option<&str>) -> Result<CliSession, SessionError> {
        if !self.is_available() {
            return Err(SessionError::Unavailable);
        }
        Ok(CliSession {
            id: SessionId::new(),
            config: self.config.clone(),
            model: model.map(str::to_string),
            conversation_id: None,
        })
    }
}

/// A CLI-backed session: remembers the conversation id returned by the
/// first call and resumes it on every subsequent prompt.
#[derive(Debug)]
pub struct CliSession {
    id: SessionId,
    config: CliBackendConfig,
    model: Option<String>,
    conversation_id: Option<String>,
}

impl CliSession {
    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.extra_args);
        cmd.arg("--print").args(["--output-format", "json"]);
        if let Some(model) = &self.model {
            cmd.args(["--model", model]);
        }
        if let Some(conversation) = &self.conversation_id {
            cmd.args(["--resume", conversation]);
        }
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.arg(prompt);
        cmd
    }
}

#[async_trait]
impl BackendSession for CliSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn send(
        &mut self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, SessionError> {
        let cmd = self.command(prompt);
        let output = run_cancellable(cmd, timeout, cancel, "agent call").await.map_err(
            |e| match e {
                SubprocessError::Timeout { after, .. } => SessionError::Timeout(after),
                SubprocessError::Aborted { .. } => SessionError::Aborted,
                SubprocessError::Spawn { source, .. } => {
                    SessionError::SpawnFailed(source.to_string())
                }
                SubprocessError::Io { source, .. } => SessionError::Transport(source.to_string()),
            },
        )?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SessionError::Transport(format!(
                "agent exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply = parse_reply(&stdout)?;
        if let Some(conversation) = reply.conversation_id {
            self.conversation_id = Some(conversation);
        }
        tracing::debug!(session = %self.id, chars = reply.text.len(), "agent reply");
        Ok(reply.text)
    }

    async fn close(&mut self) {
        // Each prompt is its own process; nothing to tear down beyond
        // forgetting the conversation.
        self.conversation_id = None;
    }
}

#[derive(Debug)]
pub(crate) struct ParsedReply {
    pub text: String,
    pub conversation_id: Option<String>,
}

/// Parse the CLI's JSON reply envelope; fall back to raw text for
/// backends that print plain output.
pub(crate) fn parse_reply(stdout: &str) -> Result<ParsedReply, SessionError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(SessionError::Protocol("empty reply".to_string()));
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(obj) = value.as_object() {
            if obj.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false) {
                let msg = obj
                    .get("result")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown agent error");
                return Err(SessionError::Protocol(msg.to_string()));
            }
            let text = obj
                .get("result")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| SessionError::Protocol("reply missing result field".to_string()))?;
            let conversation_id = obj
                .get("session_id")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            return Ok(ParsedReply { text, conversation_id });
        }
    }

    Ok(ParsedReply {
        text: trimmed.to_string(),
        conversation_id: None,
    })
}

fn program_on_path(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return std::path::Path::new(program).is_file();
    }
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(program).is_file())
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{BackendSession, SessionBackend, SessionError};
    use async_trait::async_trait;
    use fanout_core::SessionId;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct FakeBackendState {
        available: bool,
        reply: String,
        latency: Option<Duration>,
        fail_opens: u32,
        fail_sends: u32,
        opened: u32,
        live: usize,
        max_live: usize,
        closed: u32,
        sends: u32,
    }

    /// Scripted backend for pool tests: counts opens/closes/live sessions
    /// and can inject latency and failures.
    #[derive(Clone)]
    pub struct FakeBackend {
        state: Arc<Mutex<FakeBackendState>>,
    }

    impl Default for FakeBackend {
        fn default() -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeBackendState {
                    available: true,
                    reply: "ok".to_string(),
                    ..Default::default()
                })),
            }
        }
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: impl Into<String>) -> Self {
            self.state.lock().reply = text.into();
            self
        }

        pub fn latency(self, latency: Duration) -> Self {
            self.state.lock().latency = Some(latency);
            self
        }

        pub fn unavailable(self) -> Self {
            self.state.lock().available = false;
            self
        }

        /// Fail the next `n` open() calls.
        pub fn fail_opens(self, n: u32) -> Self {
            self.state.lock().fail_opens = n;
            self
        }

        /// Fail the next `n` send() calls with a transport error.
        pub fn fail_sends(self, n: u32) -> Self {
            self.state.lock().fail_sends = n;
            self
        }

        pub fn opened(&self) -> u32 {
            self.state.lock().opened
        }

        pub fn closed(&self) -> u32 {
            self.state.lock().closed
        }

        pub fn sends(&self) -> u32 {
            self.state.lock().sends
        }

        /// Sessions currently alive (opened, not yet dropped or closed).
        pub fn live(&self) -> usize {
            self.state.lock().live
        }

        /// Highest number of sessions that were ever alive at once.
        pub fn max_live(&self) -> usize {
            self.state.lock().max_live
        }
    }

    #[async_trait]
    impl SessionBackend for FakeBackend {
        type Session = FakeSession;

        fn is_available(&self) -> bool {
            self.state.lock().available
        }

        async fn open(&self, _model: Option<&str>) -> Result<FakeSession, SessionError> {
            let mut state = self.state.lock();
            if !state.available {
                return Err(SessionError::Unavailable);
            }
            if state.fail_opens > 0 {
                state.fail_opens -= 1;
                return Err(SessionError::SpawnFailed("scripted open failure".to_string()));
            }
            state.opened += 1;
            state.live += 1;
            state.max_live = state.max_live.max(state.live);
            Ok(FakeSession {
                id: SessionId::new(),
                state: Arc::clone(&self.state),
                alive: true,
            })
        }
    }

    pub struct FakeSession {
        id: SessionId,
        state: Arc<Mutex<FakeBackendState>>,
        alive: bool,
    }

    #[async_trait]
    impl BackendSession for FakeSession {
        fn id(&self) -> &SessionId {
            &self.id
        }

        async fn send(
            &mut self,
            prompt: &str,
            _timeout: Duration,
            cancel: &CancellationToken,
        ) -> Result<String, SessionError> {
            let _ = prompt;
            let (latency, outcome) = {
                let mut state = self.state.lock();
                state.sends += 1;
                if state.fail_sends > 0 {
                    state.fail_sends -= 1;
                    (state.latency, Err(SessionError::Transport("scripted send failure".to_string())))
                } else {
                    (state.latency, Ok(state.reply.clone()))
                }
            };

            if let Some(latency) = latency {
                tokio::select! {
                    _ = tokio::time::sleep(latency) => {}
                    _ = cancel.cancelled() => return Err(SessionError::Aborted),
                }
            }

            outcome
        }

        async fn close(&mut self) {
            if self.alive {
                self.alive = false;
                let mut state = self.state.lock();
                state.live -= 1;
                state.closed += 1;
            }
        }
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            if self.alive {
                let mut state = self.state.lock();
                state.live -= 1;
                state.closed += 1;
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBackend, FakeSession};

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
