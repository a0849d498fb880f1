// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide LLM client.
//!
//! One client is created at the application boundary and threaded through
//! the core as an `Arc<dyn AiInvoker>`. The pool behind it is created
//! lazily on first use; `cleanup` tears everything down and marks the
//! client unavailable until it is re-initialised.

use crate::backend::{CliBackend, SessionBackend, SessionError};
use crate::invoker::{AiError, AiInvoker, AiReply, InvokeOptions};
use crate::pool::{PoolConfig, SessionPool};
use async_trait::async_trait;
use fanout_core::SessionId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The default production client: CLI-backed sessions.
pub type DefaultLlmClient = LlmClient<CliBackend>;

/// Session-pooled LLM client.
pub struct LlmClient<B: SessionBackend> {
    backend: B,
    config: PoolConfig,
    pool: Mutex<Option<Arc<SessionPool<B>>>>,
    cleaned: AtomicBool,
}

impl Default for DefaultLlmClient {
    fn default() -> Self {
        Self::new(CliBackend::default(), PoolConfig::default())
    }
}

impl<B: SessionBackend> LlmClient<B> {
    pub fn new(backend: B, config: PoolConfig) -> Self {
        Self {
            backend,
            config,
            pool: Mutex::new(None),
            cleaned: AtomicBool::new(false),
        }
    }

    /// Initialise the pool. Idempotent; also clears a prior `cleanup`.
    pub fn init(&self) -> Arc<SessionPool<B>> {
        self.cleaned.store(false, Ordering::SeqCst);
        let mut pool = self.pool.lock();
        match &*pool {
            Some(existing) => Arc::clone(existing),
            None => {
                let created = Arc::new(SessionPool::new(self.backend.clone(), self.config.clone()));
                *pool = Some(Arc::clone(&created));
                created
            }
        }
    }

    /// Whether calls can be served: the backend is installed and the
    /// client has not been torn down.
    pub fn is_available(&self) -> bool {
        !self.cleaned.load(Ordering::SeqCst) && self.backend.is_available()
    }

    /// Send one prompt through a pooled session.
    pub async fn send(&self, prompt: &str, opts: InvokeOptions<'_>) -> Result<AiReply, AiError> {
        if self.cleaned.load(Ordering::SeqCst) {
            return Err(AiError::Unavailable);
        }
        if !self.backend.is_available() {
            return Err(AiError::Unavailable);
        }
        let pool = self.init();
        let (text, session_id) = pool
            .send(prompt, opts.model, opts.timeout, opts.cancel)
            .await
            .map_err(ai_error)?;
        Ok(AiReply {
            text,
            session_id: Some(session_id),
        })
    }

    /// Cancel the in-flight call on one session.
    pub fn abort_session(&self, id: &SessionId) -> bool {
        let pool = self.pool.lock();
        match &*pool {
            Some(pool) => pool.abort(id),
            None => false,
        }
    }

    /// Cancel all sessions and mark the client unavailable until
    /// re-initialised via [`LlmClient::init`].
    pub async fn cleanup(&self) {
        self.cleaned.store(true, Ordering::SeqCst);
        let pool = { self.pool.lock().take() };
        if let Some(pool) = pool {
            pool.cleanup().await;
        }
    }
}

fn ai_error(e: SessionError) -> AiError {
    match e {
        SessionError::Unavailable => AiError::Unavailable,
        SessionError::Timeout(after) => AiError::Timeout(after),
        SessionError::Aborted => AiError::Aborted,
        SessionError::SpawnFailed(m) | SessionError::Transport(m) | SessionError::Protocol(m) => {
            AiError::Backend(m)
        }
    }
}

#[async_trait]
impl<B: SessionBackend> AiInvoker for LlmClient<B> {
    async fn invoke(&self, prompt: &str, opts: InvokeOptions<'_>) -> Result<AiReply, AiError> {
        self.send(prompt, opts).await
    }

    fn is_available(&self) -> bool {
        LlmClient::is_available(self)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
