use std::fmt;
use std::str::FromStr;

use crate::error::ConnError;

/// The closed set of STOMP commands understood by this client.
///
/// The first nine are sent by the client, the last five are sent by the
/// broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Send,
    Subscribe,
    Unsubscribe,
    Begin,
    Commit,
    Abort,
    Ack,
    Disconnect,
    Connected,
    Message,
    Receipt,
    Error,
    Disconnected,
}

impl Command {
    /// Wire name of the command (e.g. `"SEND"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Ack => "ACK",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnected => "DISCONNECTED",
        }
    }

    /// Returns `true` for commands only a broker originates.
    pub fn is_server_command(&self) -> bool {
        matches!(
            self,
            Command::Connected
                | Command::Message
                | Command::Receipt
                | Command::Error
                | Command::Disconnected
        )
    }
}

impl FromStr for Command {
    type Err = ConnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = match s {
            "CONNECT" => Command::Connect,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "ACK" => Command::Ack,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECTED" => Command::Disconnected,
            other => {
                return Err(ConnError::Protocol(format!("unknown command '{}'", other)));
            }
        };
        Ok(cmd)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
///
/// `Frame` contains the command, the headers (key/value pairs with unique
/// keys) and the raw body bytes. Header keys are unique: setting a key that
/// is already present replaces its value, so the last write wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command (e.g. CONNECT, SEND, SUBSCRIBE)
    pub command: Command,
    /// Headers as (key, value) pairs, keys unique
    pub headers: Vec<(String, String)>,
    /// Raw body bytes; empty when the frame carries no body
    pub body: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given command and empty headers/body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Set a header (builder style).
    ///
    /// Parameters
    /// - `key`: header name (converted to `String`).
    /// - `value`: header value (converted to `String`). Written verbatim on
    ///   the wire, so it must not contain a newline.
    ///
    /// If `key` is already present its value is replaced in place.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set a header on an existing frame; last write wins.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key, value)),
        }
    }

    /// Set the frame body (builder style).
    ///
    /// Parameters
    /// - `body`: raw body bytes. Accepts any type convertible into `Vec<u8>`.
    ///   The body must not contain a NUL byte since NUL terminates the frame.
    pub fn set_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Request a RECEIPT from the broker for this frame.
    pub fn receipt(self, receipt_id: impl Into<String>) -> Self {
        self.header("receipt", receipt_id)
    }

    /// Get the value of a header by name (case-sensitive).
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Body interpreted as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        for (k, v) in &self.headers {
            writeln!(f, "{}: {}", k, v)?;
        }
        writeln!(f, "Body ({} bytes)", self.body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_round_trip() {
        for cmd in [
            Command::Connect,
            Command::Send,
            Command::Subscribe,
            Command::Unsubscribe,
            Command::Begin,
            Command::Commit,
            Command::Abort,
            Command::Ack,
            Command::Disconnect,
            Command::Connected,
            Command::Message,
            Command::Receipt,
            Command::Error,
            Command::Disconnected,
        ] {
            assert_eq!(cmd.as_str().parse::<Command>().unwrap(), cmd);
        }
    }

    #[test]
    fn lowercase_command_is_rejected() {
        assert!(matches!(
            "send".parse::<Command>(),
            Err(ConnError::Protocol(_))
        ));
    }

    #[test]
    fn server_commands() {
        assert!(Command::Message.is_server_command());
        assert!(Command::Disconnected.is_server_command());
        assert!(!Command::Disconnect.is_server_command());
        assert!(!Command::Ack.is_server_command());
    }

    #[test]
    fn header_replaces_existing_key() {
        let f = Frame::new(Command::Send)
            .header("destination", "/queue/a")
            .header("session", "S1")
            .header("destination", "/queue/b");
        assert_eq!(f.headers.len(), 2);
        assert_eq!(f.get_header("destination"), Some("/queue/b"));
    }
}
