use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::frame::Frame;

/// Errors returned by `Connection` operations.
#[derive(Error, Debug)]
pub enum ConnError {
    /// I/O-level error on an established channel
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Malformed or unrecognized frame
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Transport establishment failed (DNS, TCP connect, TLS handshake)
    #[error("connect error: {0}")]
    Connect(#[source] io::Error),
    /// The broker did not answer CONNECT within the configured bound
    #[error("connect timeout: no CONNECTED received within {0:?}")]
    ConnectTimeout(Duration),
    /// A write was attempted on a closed or half-shut channel
    #[error("send error: {0}")]
    Send(String),
    /// The connection was torn down while the operation was outstanding
    #[error("connection closed")]
    ConnectionClosed,
    /// The broker answered CONNECT with an ERROR frame
    #[error("{0}")]
    ServerRejected(ServerError),
    /// Receipt timeout error
    #[error("receipt timeout: no RECEIPT received for '{0}' within timeout")]
    ReceiptTimeout(String),
    /// The connection locator could not be parsed
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
    /// The operation is not valid in the connection's current phase or mode
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// An ERROR frame received from the broker.
///
/// `message` comes from the `message` header (or `"unknown error"` when the
/// broker omitted it); `body` carries the detailed description, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub message: String,
    pub body: Option<String>,
    pub receipt_id: Option<String>,
    pub frame: Frame,
}

impl ServerError {
    pub fn from_frame(frame: Frame) -> Self {
        let message = frame
            .get_header("message")
            .unwrap_or("unknown error")
            .to_string();
        // A body that is not valid UTF-8 is left on `frame` only.
        let body = if frame.body.is_empty() {
            None
        } else {
            String::from_utf8(frame.body.clone()).ok()
        };
        let receipt_id = frame.get_header("receipt-id").map(str::to_string);
        Self {
            message,
            body,
            receipt_id,
            frame,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STOMP server error: {}", self.message)?;
        if let Some(body) = &self.body {
            write!(f, " ({})", body)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}
