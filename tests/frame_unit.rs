//! Unit tests for the Frame struct.

use stompline::{Command, Frame};

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn frame_new_creates_empty() {
    let frame = Frame::new(Command::Send);
    assert_eq!(frame.command, Command::Send);
    assert!(frame.headers.is_empty());
    assert!(frame.body.is_empty());
}

#[test]
fn command_parses_from_wire_name() {
    let cmd: Command = "MESSAGE".parse().unwrap();
    assert_eq!(cmd, Command::Message);
    assert_eq!(cmd.to_string(), "MESSAGE");
}

#[test]
fn unknown_command_name_is_rejected() {
    assert!("NACK".parse::<Command>().is_err());
    assert!("".parse::<Command>().is_err());
}

// =============================================================================
// Builder Pattern Tests
// =============================================================================

#[test]
fn frame_header_builder_single() {
    let frame = Frame::new(Command::Send).header("destination", "/queue/test");
    assert_eq!(frame.headers.len(), 1);
    assert_eq!(
        frame.headers[0],
        ("destination".to_string(), "/queue/test".to_string())
    );
}

#[test]
fn frame_header_builder_multiple() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/test")
        .header("content-type", "text/plain")
        .header("custom-header", "custom-value");
    assert_eq!(frame.headers.len(), 3);
    assert_eq!(frame.get_header("content-type"), Some("text/plain"));
    assert_eq!(frame.get_header("custom-header"), Some("custom-value"));
}

#[test]
fn frame_header_last_write_wins() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/first")
        .header("destination", "/queue/second");
    assert_eq!(frame.headers.len(), 1);
    assert_eq!(frame.get_header("destination"), Some("/queue/second"));
}

#[test]
fn frame_header_keys_are_case_sensitive() {
    let frame = Frame::new(Command::Send)
        .header("Destination", "upper")
        .header("destination", "lower");
    assert_eq!(frame.headers.len(), 2);
    assert_eq!(frame.get_header("Destination"), Some("upper"));
}

#[test]
fn frame_set_body_bytes() {
    let frame = Frame::new(Command::Send).set_body(vec![1, 2, 3, 4, 5]);
    assert_eq!(frame.body, vec![1, 2, 3, 4, 5]);
}

#[test]
fn frame_receipt_adds_header() {
    let frame = Frame::new(Command::Ack)
        .header("message-id", "m1")
        .receipt("m1");
    assert_eq!(frame.get_header("receipt"), Some("m1"));
}

#[test]
fn frame_builder_chain() {
    let frame = Frame::new(Command::Send)
        .header("destination", "/queue/test")
        .header("content-type", "application/json")
        .set_body(b"{\"key\": \"value\"}".to_vec());

    assert_eq!(frame.command, Command::Send);
    assert_eq!(frame.headers.len(), 2);
    assert_eq!(frame.body, b"{\"key\": \"value\"}");
    assert_eq!(frame.body_text(), "{\"key\": \"value\"}");
}

#[test]
fn frame_get_header_missing() {
    let frame = Frame::new(Command::Receipt);
    assert_eq!(frame.get_header("receipt-id"), None);
}

#[test]
fn frame_display_summarizes() {
    let frame = Frame::new(Command::Message)
        .header("message-id", "m1")
        .set_body(b"abc".to_vec());
    let s = frame.to_string();
    assert!(s.contains("Command: MESSAGE"));
    assert!(s.contains("message-id: m1"));
    assert!(s.contains("Body (3 bytes)"));
}
