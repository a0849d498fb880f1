// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The AI invoker contract.
//!
//! A single async call: prompt in, reply or error out. The contract never
//! panics and never hides failure in a side channel; everything a caller
//! needs to know is in the `Result`. The session-pooled client is one
//! implementation; test code substitutes [`FakeInvoker`].

use async_trait::async_trait;
use fanout_core::SessionId;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors an invocation can surface.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("LLM backend unavailable")]
    Unavailable,
    #[error("AI call timed out after {0:?}")]
    Timeout(Duration),
    #[error("AI call aborted")]
    Aborted,
    #[error("backend error: {0}")]
    Backend(String),
}

/// A successful reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiReply {
    pub text: String,
    /// Session that served the call, when a pooled session was used.
    pub session_id: Option<SessionId>,
}

impl AiReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), session_id: None }
    }
}

/// Per-call options. Unknown concerns simply have no field here.
#[derive(Clone, Copy, Default)]
pub struct InvokeOptions<'a> {
    pub model: Option<&'a str>,
    pub timeout: Option<Duration>,
    pub cancel: Option<&'a CancellationToken>,
}

/// The one contract every higher layer depends on.
#[async_trait]
pub trait AiInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str, opts: InvokeOptions<'_>) -> Result<AiReply, AiError>;

    /// Whether the backend can serve calls at all. Callers degrade
    /// gracefully (e.g. surface the prompt for manual use) when false.
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{AiError, AiInvoker, AiReply, InvokeOptions};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    enum Scripted {
        Reply(String),
        Error(String),
    }

    struct Rule {
        needle: String,
        outcome: Scripted,
    }

    struct FakeState {
        rules: Vec<Rule>,
        default_reply: String,
        latency: Option<Duration>,
        prompts: Vec<String>,
        fail_remaining: u32,
        available: bool,
    }

    /// Tracks how many invocations are in flight and the highest the
    /// count ever reached. The guard decrements even when the call's
    /// future is dropped mid-flight (timeout or cancellation).
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    struct GaugeGuard<'a>(&'a Gauge);

    impl Gauge {
        fn enter(&self) -> GaugeGuard<'_> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
            GaugeGuard(self)
        }
    }

    impl Drop for GaugeGuard<'_> {
        fn drop(&mut self) {
            self.0.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Scripted invoker for tests.
    ///
    /// Replies are matched by prompt substring, in registration order;
    /// unmatched prompts get the default reply. Records every prompt and
    /// the maximum observed concurrency.
    #[derive(Clone)]
    pub struct FakeInvoker {
        state: Arc<Mutex<FakeState>>,
        gauge: Arc<Gauge>,
    }

    impl Default for FakeInvoker {
        fn default() -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeState {
                    rules: Vec::new(),
                    default_reply: "ok".to_string(),
                    latency: None,
                    prompts: Vec::new(),
                    fail_remaining: 0,
                    available: true,
                })),
                gauge: Arc::new(Gauge::default()),
            }
        }
    }

    impl FakeInvoker {
        pub fn new() -> Self {
            Self::default()
        }

        /// Reply with `text` when the prompt contains `needle`.
        pub fn reply(self, needle: impl Into<String>, text: impl Into<String>) -> Self {
            self.state.lock().rules.push(Rule {
                needle: needle.into(),
                outcome: Scripted::Reply(text.into()),
            });
            self
        }

        /// Fail with a backend error when the prompt contains `needle`.
        pub fn reply_error(self, needle: impl Into<String>, error: impl Into<String>) -> Self {
            self.state.lock().rules.push(Rule {
                needle: needle.into(),
                outcome: Scripted::Error(error.into()),
            });
            self
        }

        /// Reply for prompts no rule matches (default `"ok"`).
        pub fn default_reply(self, text: impl Into<String>) -> Self {
            self.state.lock().default_reply = text.into();
            self
        }

        /// Sleep this long before every reply.
        pub fn latency(self, latency: Duration) -> Self {
            self.state.lock().latency = Some(latency);
            self
        }

        /// Fail the next `n` calls with a backend error, then recover.
        pub fn fail_times(self, n: u32) -> Self {
            self.state.lock().fail_remaining = n;
            self
        }

        /// Report the backend as uninstalled.
        pub fn unavailable(self) -> Self {
            self.state.lock().available = false;
            self
        }

        /// Every prompt received so far, in call order.
        pub fn prompts(&self) -> Vec<String> {
            self.state.lock().prompts.clone()
        }

        pub fn call_count(&self) -> usize {
            self.state.lock().prompts.len()
        }

        /// Highest number of calls that were ever in flight at once.
        pub fn max_in_flight(&self) -> usize {
            self.gauge.max.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiInvoker for FakeInvoker {
        async fn invoke(
            &self,
            prompt: &str,
            opts: InvokeOptions<'_>,
        ) -> Result<AiReply, AiError> {
            let _in_flight = self.gauge.enter();

            let (latency, outcome) = {
                let mut state = self.state.lock();
                state.prompts.push(prompt.to_string());

                if !state.available {
                    return Err(AiError::Unavailable);
                }
                if state.fail_remaining > 0 {
                    state.fail_remaining -= 1;
                    (state.latency, Err(AiError::Backend("scripted failure".to_string())))
                } else {
                    let outcome = state
                        .rules
                        .iter()
                        .find(|r| prompt.contains(&r.needle))
                        .map(|r| match &r.outcome {
                            Scripted::Reply(text) => Ok(AiReply::new(text.clone())),
                            Scripted::Error(e) => Err(AiError::Backend(e.clone())),
                        })
                        .unwrap_or_else(|| Ok(AiReply::new(state.default_reply.clone())));
                    (state.latency, outcome)
                }
            };

            if let Some(latency) = latency {
                match opts.cancel {
                    Some(cancel) => tokio::select! {
                        _ = tokio::time::sleep(latency) => {}
                        _ = cancel.cancelled() => return Err(AiError::Aborted),
                    },
                    None => tokio::time::sleep(latency).await,
                }
            }

            outcome
        }

        fn is_available(&self) -> bool {
            self.state.lock().available
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeInvoker;

#[cfg(test)]
#[path = "invoker_tests.rs"]
mod tests;
