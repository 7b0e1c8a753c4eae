use std::sync::Arc;
use std::time::Duration;

use crate::dispatcher::{DeliveryMode, FrameHandler};

/// Default bound on the CONNECT → CONNECTED handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Options controlling how a `Connection` is established and how inbound
/// frames are delivered.
///
/// Built with a fluent API:
///
/// ```ignore
/// let opts = ConnectOptions::default()
///     .connect_timeout(Duration::from_secs(2))
///     .host("/")
///     .header("client-name", "billing");
/// ```
#[derive(Clone)]
pub struct ConnectOptions {
    /// How long `connect` waits for CONNECTED.
    pub connect_timeout: Duration,
    /// Inline handler callbacks or a pull queue. Defaults to `Queue`.
    pub delivery: DeliveryMode,
    /// Optional `accept-version` header for CONNECT.
    pub accept_version: Option<String>,
    /// Optional `host` header (virtual host) for CONNECT.
    pub host: Option<String>,
    /// Optional `client-id` header for CONNECT.
    pub client_id: Option<String>,
    /// Additional CONNECT headers, applied after all of the above.
    pub headers: Vec<(String, String)>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            delivery: DeliveryMode::Queue,
            accept_version: None,
            host: None,
            client_id: None,
            headers: Vec::new(),
        }
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Deliver frames by invoking `handler` on the reader task.
    pub fn with_handler(mut self, handler: Arc<dyn FrameHandler>) -> Self {
        self.delivery = DeliveryMode::Callback(handler);
        self
    }

    /// Deliver MESSAGE frames to a queue drained by `Connection::receive`.
    pub fn with_queue(mut self) -> Self {
        self.delivery = DeliveryMode::Queue;
        self
    }

    pub fn accept_version(mut self, version: impl Into<String>) -> Self {
        self.accept_version = Some(version.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("connect_timeout", &self.connect_timeout)
            .field("delivery", &self.delivery)
            .field("accept_version", &self.accept_version)
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("headers", &self.headers)
            .finish()
    }
}
