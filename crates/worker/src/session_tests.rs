use super::*;
use crate::provider::mock::MockTransport;
use std::time::Duration;

fn new_session(transport: Arc<MockTransport>) -> (Arc<RealtimeSession>, mpsc::Receiver<SessionEvent>) {
    let (tx, rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let session = RealtimeSession::new(
        "test-model".to_string(),
        transport,
        Duration::from_millis(20),
        3,
        tx,
        &cancel,
    );
    (session, rx)
}

#[tokio::test]
async fn connect_transitions_to_open() {
    let transport = Arc::new(MockTransport::new());
    let (session, _rx) = new_session(transport);
    let result = session.connect().await;
    assert!(result.is_ok());
    assert_eq!(session.state().await, SessionState::Open);
}

#[tokio::test]
async fn retries_through_transient_failures() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_next(2);
    let (session, _rx) = new_session(transport.clone());
    let result = session.connect().await;
    assert!(result.is_ok());
    assert_eq!(transport.connects(), 3);
}

#[tokio::test]
async fn persistent_failure_marks_session_errored() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_next(10);
    let (session, _rx) = new_session(transport);
    let result = session.connect().await;
    assert!(result.is_err());
    assert_eq!(session.state().await, SessionState::Error);
}

#[tokio::test]
async fn send_message_fails_when_not_open() {
    let transport = Arc::new(MockTransport::new());
    let (session, _rx) = new_session(transport);
    let result = session.send_message(serde_json::json!({"text": "hi"})).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn pause_then_resume_reconnects_and_increments_count() {
    let transport = Arc::new(MockTransport::new());
    let (session, _rx) = new_session(transport);
    session.connect().await.unwrap();
    assert_eq!(session.connection_count().await, 1);
    session.pause().await;
    assert_eq!(session.state().await, SessionState::Paused);
    session.resume().await.unwrap();
    assert_eq!(session.state().await, SessionState::Open);
    assert_eq!(session.connection_count().await, 2);
}

#[tokio::test]
async fn close_transitions_to_closed() {
    let transport = Arc::new(MockTransport::new());
    let (session, _rx) = new_session(transport);
    session.connect().await.unwrap();
    session.close().await;
    assert_eq!(session.state().await, SessionState::Closed);
}
