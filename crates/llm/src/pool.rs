// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded pool of warm LLM sessions.
//!
//! At most `max_sessions` sessions exist at a time; callers wait FIFO for
//! a free slot. A leased session is returned to the idle set on success
//! and destroyed on any error (the conversation state after a failure is
//! unknown). An idle reaper destroys sessions untouched for longer than
//! the idle timeout.

use crate::backend::{BackendSession, SessionBackend, SessionError};
use fanout_core::SessionId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum concurrent sessions (process-wide cap on LLM parallelism).
    pub max_sessions: usize,
    /// Idle sessions older than this are reaped.
    pub idle_timeout: Duration,
    /// How often the reaper scans the idle set.
    pub reap_interval: Duration,
    /// How long `cleanup` waits for in-flight calls before force-destroying.
    pub shutdown_grace: Duration,
    /// Call timeout applied when the caller does not pass one.
    pub default_call_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 5,
            idle_timeout: Duration::from_secs(300),
            reap_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            default_call_timeout: Duration::from_secs(600),
        }
    }
}

impl PoolConfig {
    fanout_core::setters! {
        set {
            max_sessions: usize,
            idle_timeout: Duration,
            reap_interval: Duration,
            shutdown_grace: Duration,
            default_call_timeout: Duration,
        }
    }
}

struct IdleEntry<S> {
    session: S,
    model: Option<String>,
    last_used: Instant,
}

struct PoolShared<B: SessionBackend> {
    idle: Mutex<VecDeque<IdleEntry<B::Session>>>,
    /// Abort handles for sessions currently held by a lease.
    active: Mutex<HashMap<SessionId, CancellationToken>>,
}

/// The session pool. Cheap to share via `Arc`.
pub struct SessionPool<B: SessionBackend> {
    backend: B,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    shared: Arc<PoolShared<B>>,
    closed: CancellationToken,
}

impl<B: SessionBackend> SessionPool<B> {
    pub fn new(backend: B, config: PoolConfig) -> Self {
        let shared = Arc::new(PoolShared {
            idle: Mutex::new(VecDeque::new()),
            active: Mutex::new(HashMap::new()),
        });
        let closed = CancellationToken::new();
        spawn_reaper::<B>(
            Arc::clone(&shared),
            closed.clone(),
            config.reap_interval,
            config.idle_timeout,
        );
        Self {
            backend,
            semaphore: Arc::new(Semaphore::new(config.max_sessions.max(1))),
            config,
            shared,
            closed,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Acquire a session for exclusive use. Waits FIFO when the pool is at
    /// capacity.
    pub async fn acquire(&self, model: Option<&str>) -> Result<SessionLease<B>, SessionError> {
        if self.closed.is_cancelled() {
            return Err(SessionError::Unavailable);
        }
        let permit = tokio::select! {
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| SessionError::Unavailable)?
            }
            _ = self.closed.cancelled() => return Err(SessionError::Unavailable),
        };

        // Prefer the most recently used idle session with a matching model.
        let reused = {
            let mut idle = self.shared.idle.lock();
            let pos = idle
                .iter()
                .rposition(|entry| entry.model.as_deref() == model);
            pos.and_then(|p| idle.remove(p))
        };

        let session = match reused {
            Some(entry) => entry.session,
            None => {
                // Keep the total session count within the cap: evict the
                // oldest idle session (it has a non-matching model) before
                // opening a new one.
                let evicted = {
                    let mut idle = self.shared.idle.lock();
                    let total = idle.len() + self.shared.active.lock().len();
                    if total >= self.config.max_sessions {
                        idle.pop_front()
                    } else {
                        None
                    }
                };
                if let Some(mut entry) = evicted {
                    entry.session.close().await;
                }
                self.backend.open(model).await?
            }
        };

        let id = *session.id();
        let abort = CancellationToken::new();
        self.shared.active.lock().insert(id, abort.clone());
        tracing::debug!(session = %id, "session leased");

        Ok(SessionLease {
            id,
            session: Some(session),
            model: model.map(str::to_string),
            abort,
            shared: Arc::clone(&self.shared),
            _permit: permit,
        })
    }

    /// Acquire, send, and release (or destroy on error) in one call.
    pub async fn send(
        &self,
        prompt: &str,
        model: Option<&str>,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(String, SessionId), SessionError> {
        let timeout = timeout.unwrap_or(self.config.default_call_timeout);
        let mut lease = self.acquire(model).await?;
        let id = lease.session_id();
        match lease.send(prompt, timeout, cancel).await {
            Ok(text) => {
                lease.release();
                Ok((text, id))
            }
            Err(e) => {
                lease.destroy().await;
                Err(e)
            }
        }
    }

    /// Cancel the in-flight call on a leased session, if any.
    ///
    /// The holder observes an `Aborted` error and destroys the session.
    pub fn abort(&self, id: &SessionId) -> bool {
        match self.shared.active.lock().get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of sessions currently leased out.
    pub fn active_count(&self) -> usize {
        self.shared.active.lock().len()
    }

    /// Number of idle sessions waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().len()
    }

    /// Cancel everything and tear the pool down.
    ///
    /// Waits up to the shutdown grace period for leased sessions to
    /// observe their aborts, then drains the idle set. Never blocks
    /// indefinitely.
    pub async fn cleanup(&self) {
        self.closed.cancel();
        {
            let active = self.shared.active.lock();
            for token in active.values() {
                token.cancel();
            }
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        while !self.shared.active.lock().is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let drained: Vec<_> = self.shared.idle.lock().drain(..).collect();
        for mut entry in drained {
            entry.session.close().await;
        }
        tracing::debug!("session pool cleaned up");
    }
}

/// Exclusive hold on one session.
///
/// Every lease ends in exactly one of: `release` (back to the idle set),
/// `destroy` (graceful teardown), or drop (abrupt teardown when the
/// holder's future is cancelled). The pool slot is freed in all three.
pub struct SessionLease<B: SessionBackend> {
    id: SessionId,
    session: Option<B::Session>,
    model: Option<String>,
    abort: CancellationToken,
    shared: Arc<PoolShared<B>>,
    _permit: OwnedSemaphorePermit,
}

impl<B: SessionBackend> SessionLease<B> {
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Issue one prompt on the leased session.
    pub async fn send(
        &mut self,
        prompt: &str,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, SessionError> {
        let abort = self.abort.clone();
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Err(SessionError::Transport("lease already consumed".to_string())),
        };
        match cancel {
            Some(external) => tokio::select! {
                result = session.send(prompt, timeout, &abort) => result,
                _ = external.cancelled() => Err(SessionError::Aborted),
            },
            None => session.send(prompt, timeout, &abort).await,
        }
    }

    /// Return the session to the idle set for reuse.
    pub fn release(mut self) {
        if let Some(session) = self.session.take() {
            self.shared.active.lock().remove(session.id());
            self.shared.idle.lock().push_back(IdleEntry {
                session,
                model: self.model.take(),
                last_used: Instant::now(),
            });
        }
    }

    /// Tear the session down instead of returning it.
    pub async fn destroy(mut self) {
        if let Some(mut session) = self.session.take() {
            self.shared.active.lock().remove(session.id());
            tracing::debug!(session = %session.id(), "session destroyed");
            session.close().await;
        }
    }
}

impl<B: SessionBackend> Drop for SessionLease<B> {
    fn drop(&mut self) {
        // Abrupt path: the holder's future was dropped. The session is
        // torn down by its own Drop; the permit frees the slot.
        if let Some(session) = self.session.take() {
            self.shared.active.lock().remove(session.id());
        }
    }
}

fn spawn_reaper<B: SessionBackend>(
    shared: Arc<PoolShared<B>>,
    closed: CancellationToken,
    reap_interval: Duration,
    idle_timeout: Duration,
) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(reap_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = closed.cancelled() => break,
            }
            let expired: Vec<IdleEntry<B::Session>> = {
                let mut idle = shared.idle.lock();
                let mut keep = VecDeque::with_capacity(idle.len());
                let mut expired = Vec::new();
                while let Some(entry) = idle.pop_front() {
                    if entry.last_used.elapsed() > idle_timeout {
                        expired.push(entry);
                    } else {
                        keep.push_back(entry);
                    }
                }
                *idle = keep;
                expired
            };
            for mut entry in expired {
                tracing::debug!(session = %entry.session.id(), "reaping idle session");
                entry.session.close().await;
            }
        }
    });
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
