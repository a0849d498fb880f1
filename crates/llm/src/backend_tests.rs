// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_reply_json_envelope() {
    let reply = parse_reply(r#"{"result": "hello", "session_id": "conv-1"}"#).unwrap();
    assert_eq!(reply.text, "hello");
    assert_eq!(reply.conversation_id.as_deref(), Some("conv-1"));
}

#[test]
fn parse_reply_plain_text_fallback() {
    let reply = parse_reply("just text\n").unwrap();
    assert_eq!(reply.text, "just text");
    assert!(reply.conversation_id.is_none());
}

#[test]
fn parse_reply_error_envelope() {
    let err = parse_reply(r#"{"is_error": true, "result": "rate limited"}"#).unwrap_err();
    assert!(matches!(err, SessionError::Protocol(ref m) if m == "rate limited"));
}

#[test]
fn parse_reply_missing_result_field() {
    let err = parse_reply(r#"{"session_id": "x"}"#).unwrap_err();
    assert!(matches!(err, SessionError::Protocol(_)));
}

#[test]
fn parse_reply_empty_is_protocol_error() {
    assert!(matches!(parse_reply("  \n"), Err(SessionError::Protocol(_))));
}

#[test]
fn parse_reply_json_array_falls_back_to_text() {
    let reply = parse_reply("[1, 2, 3]").unwrap();
    assert_eq!(reply.text, "[1, 2, 3]");
}

#[test]
fn cli_backend_unavailable_for_missing_program() {
    let backend = CliBackend::new(CliBackendConfig::default().program("no-such-agent-binary"));
    assert!(!backend.is_available());
}

#[tokio::test]
async fn cli_backend_open_refuses_when_unavailable() {
    let backend = CliBackend::new(CliBackendConfig::default().program("no-such-agent-binary"));
    let err = backend.open(None).await.unwrap_err();
    assert!(matches!(err, SessionError::Unavailable));
}

#[tokio::test]
async fn fake_backend_counts_sessions() {
    let backend = FakeBackend::new().reply("hi");
    let mut session = backend.open(None).await.unwrap();
    assert_eq!(backend.opened(), 1);
    assert_eq!(backend.live(), 1);

    let text = session
        .send("p", std::time::Duration::from_secs(1), &tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "hi");

    session.close().await;
    assert_eq!(backend.live(), 0);
    assert_eq!(backend.closed(), 1);
}

#[tokio::test]
async fn fake_session_drop_counts_as_close() {
    let backend = FakeBackend::new();
    {
        let _session = backend.open(None).await.unwrap();
        assert_eq!(backend.live(), 1);
    }
    assert_eq!(backend.live(), 0);
    assert_eq!(backend.closed(), 1);
}
