//! Tests for ERROR frame handling.
//!
//! These tests verify:
//! - ServerError creation and fields
//! - Display and Error trait implementations
//! - How a rejected handshake surfaces through ConnError

use stompline::{Command, ConnError, Frame, ServerError};

fn error_frame(message: &str) -> Frame {
    Frame::new(Command::Error).header("message", message)
}

// ============================================================================
// ServerError tests
// ============================================================================

#[test]
fn server_error_from_frame_basic() {
    let frame = error_frame("malformed frame received").header("content-type", "text/plain");

    let err = ServerError::from_frame(frame);

    assert_eq!(err.message, "malformed frame received");
    assert!(err.body.is_none());
    assert!(err.receipt_id.is_none());
}

#[test]
fn server_error_from_frame_with_body() {
    let frame = error_frame("authentication failed")
        .set_body(b"Invalid credentials provided".to_vec());

    let err = ServerError::from_frame(frame);

    assert_eq!(err.message, "authentication failed");
    assert_eq!(err.body, Some("Invalid credentials provided".to_string()));
}

#[test]
fn server_error_from_frame_with_receipt_id() {
    let frame = error_frame("invalid destination").header("receipt-id", "msg-12345");

    let err = ServerError::from_frame(frame);

    assert_eq!(err.receipt_id, Some("msg-12345".to_string()));
}

#[test]
fn server_error_from_frame_no_message_header() {
    let err = ServerError::from_frame(Frame::new(Command::Error));
    assert_eq!(err.message, "unknown error");
}

#[test]
fn server_error_from_frame_preserves_original() {
    let frame = error_frame("test error")
        .header("custom-header", "custom-value")
        .set_body(b"body content".to_vec());

    let err = ServerError::from_frame(frame);

    assert_eq!(err.frame.command, Command::Error);
    assert_eq!(err.frame.get_header("custom-header"), Some("custom-value"));
    assert_eq!(err.frame.body, b"body content");
}

#[test]
fn server_error_display_with_and_without_body() {
    let bare = ServerError::from_frame(error_frame("connection refused"));
    assert_eq!(bare.to_string(), "STOMP server error: connection refused");

    let detailed =
        ServerError::from_frame(error_frame("protocol error").set_body(b"details here".to_vec()));
    assert_eq!(
        detailed.to_string(),
        "STOMP server error: protocol error (details here)"
    );
}

#[test]
fn server_error_is_error_trait() {
    let err = ServerError::from_frame(error_frame("test"));
    let _: &dyn std::error::Error = &err;
}

#[test]
fn server_error_clone_and_eq() {
    let err1 = ServerError::from_frame(error_frame("test").set_body(b"body".to_vec()));
    let err2 = err1.clone();
    assert_eq!(err1, err2);
    assert_eq!(err1, ServerError::from_frame(error_frame("test").set_body(b"body".to_vec())));
    assert_ne!(err1, ServerError::from_frame(error_frame("other")));
}

#[test]
fn server_error_binary_body_returns_none() {
    let frame = error_frame("binary error").set_body(vec![0xFF, 0xFE, 0x00, 0x01]);

    let err = ServerError::from_frame(frame);

    assert_eq!(err.message, "binary error");
    assert!(err.body.is_none());
    assert_eq!(err.frame.body.len(), 4);
}

// ============================================================================
// ConnError wrapping
// ============================================================================

#[test]
fn server_rejected_displays_server_error() {
    let err = ConnError::ServerRejected(ServerError::from_frame(
        error_frame("auth failed").set_body(b"bad passcode".to_vec()),
    ));
    assert_eq!(err.to_string(), "STOMP server error: auth failed (bad passcode)");

    match err {
        ConnError::ServerRejected(e) => assert_eq!(e.message, "auth failed"),
        other => panic!("expected ServerRejected, got {:?}", other),
    }
}
