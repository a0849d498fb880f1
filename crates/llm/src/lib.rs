// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fanout-llm: the LLM client, session pool, and invoker contract.
//!
//! Everything above this crate talks to the model through one narrow
//! surface: [`AiInvoker`]. The default implementation multiplexes calls
//! onto a bounded pool of warm conversational sessions; tests substitute
//! [`FakeInvoker`] and never touch a real backend.

pub mod backend;
pub mod client;
pub mod invoker;
pub mod pool;
pub mod subprocess;

pub use backend::{BackendSession, CliBackend, CliBackendConfig, SessionBackend, SessionError};
pub use client::{DefaultLlmClient, LlmClient};
pub use invoker::{AiError, AiInvoker, AiReply, InvokeOptions};
pub use pool::{PoolConfig, SessionPool};

#[cfg(any(test, feature = "test-support"))]
pub use backend::FakeBackend;
#[cfg(any(test, feature = "test-support"))]
pub use invoker::FakeInvoker;
