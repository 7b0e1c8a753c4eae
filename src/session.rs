use std::collections::HashMap;

use crate::error::ConnError;
use crate::frame::{Command, Frame};
use crate::locator::Credentials;
use crate::options::ConnectOptions;

/// Lifecycle phase of a connection.
///
/// `Disconnected → Connecting → Connected → Disconnecting → Disconnected`,
/// with `Failed` reachable from any phase when the transport breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Failed,
}

/// Subscription acknowledgement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// The broker considers a message consumed on delivery; never ack.
    Auto,
    /// Every delivered MESSAGE must be acknowledged with `ack`.
    Client,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
        }
    }
}

/// Per-connection session state plus the builders for outgoing frames.
///
/// Mutated by the reader (CONNECTED, teardown) and by the command
/// builders before a frame is written.
#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    session_id: Option<String>,
    /// destination -> ack mode of the active subscription
    subscriptions: HashMap<String, AckMode>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Disconnected,
            session_id: None,
            subscriptions: HashMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn ack_mode(&self, destination: &str) -> Option<AckMode> {
        self.subscriptions.get(destination).copied()
    }

    pub(crate) fn begin_connect(&mut self) {
        self.phase = Phase::Connecting;
        self.session_id = None;
        self.subscriptions.clear();
    }

    /// Record a CONNECTED frame. Ignored unless a handshake is in progress.
    pub(crate) fn on_connected(&mut self, session_id: Option<&str>) -> bool {
        if self.phase != Phase::Connecting {
            return false;
        }
        self.session_id = session_id.map(str::to_string);
        self.phase = Phase::Connected;
        true
    }

    pub(crate) fn begin_disconnect(&mut self) {
        if matches!(self.phase, Phase::Connecting | Phase::Connected) {
            self.phase = Phase::Disconnecting;
        }
    }

    /// Reset after an orderly disconnect. A failed session keeps `Failed`.
    pub(crate) fn finish_disconnect(&mut self) {
        if self.phase != Phase::Failed {
            self.phase = Phase::Disconnected;
        }
        self.session_id = None;
        self.subscriptions.clear();
    }

    pub(crate) fn fail(&mut self) {
        self.phase = Phase::Failed;
        self.session_id = None;
        self.subscriptions.clear();
    }

    fn require_session(&self) -> Result<&str, ConnError> {
        if self.phase != Phase::Connected {
            return Err(ConnError::InvalidState(format!(
                "connection is {:?}, not Connected",
                self.phase
            )));
        }
        // Brokers that omit the `session` header still get an (empty) one.
        Ok(self.session_id.as_deref().unwrap_or(""))
    }

    /// Build the CONNECT frame.
    ///
    /// `login`/`passcode` are included when credentials are given; option
    /// headers follow, custom headers last.
    pub fn connect_frame(options: &ConnectOptions, credentials: Option<&Credentials>) -> Frame {
        let mut f = Frame::new(Command::Connect);
        if let Some(c) = credentials {
            f.set_header("login", &c.login);
            f.set_header("passcode", &c.passcode);
        }
        if let Some(v) = &options.accept_version {
            f.set_header("accept-version", v);
        }
        if let Some(h) = &options.host {
            f.set_header("host", h);
        }
        if let Some(id) = &options.client_id {
            f.set_header("client-id", id);
        }
        merge(&mut f, &options.headers);
        f
    }

    /// SEND with `destination` and `session`, then the caller's headers.
    pub fn send_frame(
        &self,
        destination: &str,
        body: impl Into<Vec<u8>>,
        headers: &[(String, String)],
    ) -> Result<Frame, ConnError> {
        let session = self.require_session()?;
        let mut f = Frame::new(Command::Send)
            .header("destination", destination)
            .header("session", session)
            .set_body(body);
        merge(&mut f, headers);
        Ok(f)
    }

    /// SUBSCRIBE with `destination`, `session` and `ack`, then the caller's
    /// headers. The ack mode is remembered for the destination.
    pub fn subscribe_frame(
        &mut self,
        destination: &str,
        ack: AckMode,
        headers: &[(String, String)],
    ) -> Result<Frame, ConnError> {
        let session = self.require_session()?;
        let mut f = Frame::new(Command::Subscribe)
            .header("destination", destination)
            .header("session", session)
            .header("ack", ack.as_str());
        merge(&mut f, headers);
        self.subscriptions.insert(destination.to_string(), ack);
        Ok(f)
    }

    pub fn unsubscribe_frame(&mut self, destination: &str) -> Result<Frame, ConnError> {
        let session = self.require_session()?;
        let f = Frame::new(Command::Unsubscribe)
            .header("destination", destination)
            .header("session", session);
        self.subscriptions.remove(destination);
        Ok(f)
    }

    /// BEGIN, COMMIT or ABORT tagged with `transaction`.
    pub fn transaction_frame(&self, command: Command, transaction: &str) -> Result<Frame, ConnError> {
        if !matches!(command, Command::Begin | Command::Commit | Command::Abort) {
            return Err(ConnError::InvalidState(format!(
                "{} is not a transaction command",
                command
            )));
        }
        self.require_session()?;
        Ok(Frame::new(command).header("transaction", transaction))
    }

    pub fn ack_frame(&self, message_id: &str, transaction: Option<&str>) -> Result<Frame, ConnError> {
        self.require_session()?;
        let mut f = Frame::new(Command::Ack).header("message-id", message_id);
        if let Some(tx) = transaction {
            f.set_header("transaction", tx);
        }
        Ok(f)
    }

    pub fn disconnect_frame(&self) -> Frame {
        let mut f = Frame::new(Command::Disconnect);
        if let Some(s) = &self.session_id {
            f.set_header("session", s);
        }
        f
    }
}

fn merge(frame: &mut Frame, headers: &[(String, String)]) {
    for (k, v) in headers {
        frame.set_header(k, v);
    }
}
