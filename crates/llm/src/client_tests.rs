// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::FakeBackend;

#[tokio::test]
async fn pool_is_created_lazily_on_first_send() {
    let backend = FakeBackend::new().reply("hi");
    let client = LlmClient::new(backend.clone(), PoolConfig::default());
    assert_eq!(backend.opened(), 0);

    let reply = client.send("p", InvokeOptions::default()).await.unwrap();
    assert_eq!(reply.text, "hi");
    assert!(reply.session_id.is_some());
    assert_eq!(backend.opened(), 1);
}

#[tokio::test]
async fn init_is_idempotent() {
    let client = LlmClient::new(FakeBackend::new(), PoolConfig::default());
    let a = client.init();
    let b = client.init();
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn unavailable_backend_degrades_without_error_panics() {
    let client = LlmClient::new(FakeBackend::new().unavailable(), PoolConfig::default());
    assert!(!client.is_available());
    let err = client.send("p", InvokeOptions::default()).await.unwrap_err();
    assert!(matches!(err, AiError::Unavailable));
}

#[tokio::test]
async fn cleanup_marks_unavailable_until_reinit() {
    let backend = FakeBackend::new();
    let client = LlmClient::new(backend.clone(), PoolConfig::default());
    client.send("p", InvokeOptions::default()).await.unwrap();

    client.cleanup().await;
    assert!(!client.is_available());
    assert!(matches!(
        client.send("p", InvokeOptions::default()).await,
        Err(AiError::Unavailable)
    ));
    assert_eq!(backend.live(), 0);

    client.init();
    assert!(client.is_available());
    client.send("p", InvokeOptions::default()).await.unwrap();
}

#[tokio::test]
async fn invoker_trait_object_works() {
    let client: Arc<dyn AiInvoker> = Arc::new(LlmClient::new(
        FakeBackend::new().reply("via trait"),
        PoolConfig::default(),
    ));
    let reply = client.invoke("p", InvokeOptions::default()).await.unwrap();
    assert_eq!(reply.text, "via trait");
}

#[tokio::test]
async fn abort_session_without_pool_is_a_noop() {
    let client = LlmClient::new(FakeBackend::new(), PoolConfig::default());
    assert!(!client.abort_session(&fanout_core::SessionId::new()));
}
