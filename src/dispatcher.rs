use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{ConnError, ServerError};
use crate::frame::{Command, Frame};
use crate::session::{AckMode, Phase, SessionState};

/// Notification points for broker frames in callback delivery mode.
///
/// Every method runs inline on the connection's reader task, so handlers
/// must return promptly: a slow handler delays every later frame. To call
/// back into the connection (for example to `ack` a message), clone the
/// `Connection` and spawn a task.
pub trait FrameHandler: Send + Sync {
    /// CONNECTED arrived; `session_id` is empty if the broker sent none.
    fn on_connected(&self, _session_id: &str) {}
    /// DISCONNECTED arrived.
    fn on_disconnected(&self) {}
    /// MESSAGE arrived.
    fn on_message(&self, _message_id: &str, _body: &[u8]) {}
    /// RECEIPT arrived.
    fn on_receipt(&self, _receipt_id: &str) {}
    /// ERROR arrived; `description` is the frame body.
    fn on_error(&self, _message: &str, _description: &str) {}
    /// The transport failed. Called at most once per connection.
    fn on_connection_lost(&self, _error: &ConnError) {}
}

/// How decoded frames reach the application. Fixed when connecting.
#[derive(Clone)]
pub enum DeliveryMode {
    /// Invoke the handler on the reader task.
    Callback(Arc<dyn FrameHandler>),
    /// Queue MESSAGE frames for `Connection::receive`.
    Queue,
}

impl fmt::Debug for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Callback(_) => f.write_str("Callback"),
            DeliveryMode::Queue => f.write_str("Queue"),
        }
    }
}

/// A MESSAGE frame handed out by `Connection::receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Value of the `message-id` header (empty if the broker omitted it)
    pub message_id: String,
    /// Ack mode of the subscription to the message's destination, if this
    /// connection subscribed to it
    pub ack: Option<AckMode>,
    pub frame: Frame,
}

impl Message {
    pub fn body(&self) -> &[u8] {
        &self.frame.body
    }

    /// `true` when the message came through an `AckMode::Client`
    /// subscription and must be passed to `Connection::ack`.
    pub fn requires_ack(&self) -> bool {
        self.ack == Some(AckMode::Client)
    }

    pub fn destination(&self) -> Option<&str> {
        self.frame.get_header("destination")
    }
}

/// Alias for pending receipt map: receipt-id -> senders to notify when received.
///
/// Several waits may share one receipt-id (e.g. the same message acked
/// twice); a matching RECEIPT resolves all of them.
pub(crate) type PendingReceipts = HashMap<String, Vec<oneshot::Sender<()>>>;

type HandshakeSender = oneshot::Sender<Result<(), ConnError>>;

/// Routes decoded frames and resolves synchronous waits.
///
/// Only the reader task calls `dispatch`, `protocol_error` and `fail`, so
/// frames are handled in wire order. Teardown (`fail` or `close`) happens
/// once; it wakes the handshake waiter, drops every pending receipt sender
/// and closes the delivery queue, so all waiters observe
/// `ConnError::ConnectionClosed`.
pub(crate) struct Dispatcher {
    mode: DeliveryMode,
    session: Arc<Mutex<SessionState>>,
    handshake: Mutex<Option<HandshakeSender>>,
    pending_receipts: Mutex<PendingReceipts>,
    queue_tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    closed: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher. In queue mode the receiving side of the
    /// delivery queue is returned alongside it.
    pub(crate) fn new(
        mode: DeliveryMode,
        session: Arc<Mutex<SessionState>>,
    ) -> (Self, Option<mpsc::UnboundedReceiver<Message>>) {
        let (queue_tx, queue_rx) = match mode {
            DeliveryMode::Queue => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(rx))
            }
            DeliveryMode::Callback(_) => (None, None),
        };
        let dispatcher = Self {
            mode,
            session,
            handshake: Mutex::new(None),
            pending_receipts: Mutex::new(HashMap::new()),
            queue_tx: Mutex::new(queue_tx),
            closed: AtomicBool::new(false),
        };
        (dispatcher, queue_rx)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_queue_mode(&self) -> bool {
        matches!(self.mode, DeliveryMode::Queue)
    }

    /// Register the CONNECT → CONNECTED wait.
    pub(crate) async fn register_handshake(&self) -> oneshot::Receiver<Result<(), ConnError>> {
        let (tx, rx) = oneshot::channel();
        *self.handshake.lock().await = Some(tx);
        rx
    }

    /// Register interest in a RECEIPT whose `receipt-id` equals `receipt_id`.
    pub(crate) async fn register_receipt(
        &self,
        receipt_id: &str,
    ) -> Result<oneshot::Receiver<()>, ConnError> {
        let mut receipts = self.pending_receipts.lock().await;
        if self.is_closed() {
            return Err(ConnError::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        receipts.entry(receipt_id.to_string()).or_default().push(tx);
        Ok(rx)
    }

    /// Drop the correlations for `receipt_id` whose waiter has gone away.
    /// Other waits on the same id stay registered.
    pub(crate) async fn forget_receipt(&self, receipt_id: &str) {
        let mut receipts = self.pending_receipts.lock().await;
        if let Some(waiters) = receipts.get_mut(receipt_id) {
            waiters.retain(|tx| !tx.is_closed());
            if waiters.is_empty() {
                receipts.remove(receipt_id);
            }
        }
    }

    /// Route one decoded broker frame.
    pub(crate) async fn dispatch(&self, frame: Frame) {
        if !frame.command.is_server_command() {
            warn!("ignoring client command {} sent by broker", frame.command);
            return;
        }
        match frame.command {
            Command::Connected => self.on_connected(frame).await,
            Command::Message => self.on_message(frame).await,
            Command::Receipt => self.on_receipt(frame).await,
            Command::Error => self.on_error(frame).await,
            Command::Disconnected => {
                info!("broker sent DISCONNECTED");
                self.session.lock().await.finish_disconnect();
                if let DeliveryMode::Callback(handler) = &self.mode {
                    handler.on_disconnected();
                }
                self.close().await;
            }
            _ => {}
        }
    }

    async fn on_connected(&self, frame: Frame) {
        let session_id = frame.get_header("session");
        let accepted = self.session.lock().await.on_connected(session_id);
        if !accepted {
            debug!("ignoring CONNECTED outside of a handshake");
            return;
        }
        info!(session = session_id.unwrap_or(""), "STOMP session established");
        if let Some(tx) = self.handshake.lock().await.take() {
            let _ = tx.send(Ok(()));
        }
        if let DeliveryMode::Callback(handler) = &self.mode {
            handler.on_connected(session_id.unwrap_or(""));
        }
    }

    async fn on_message(&self, frame: Frame) {
        let message_id = frame.get_header("message-id").unwrap_or("").to_string();
        match &self.mode {
            DeliveryMode::Callback(handler) => handler.on_message(&message_id, &frame.body),
            DeliveryMode::Queue => {
                let ack = match frame.get_header("destination") {
                    Some(dest) => self.session.lock().await.ack_mode(dest),
                    None => None,
                };
                let queue = self.queue_tx.lock().await;
                let delivered = queue
                    .as_ref()
                    .map(|tx| {
                        tx.send(Message {
                            message_id,
                            ack,
                            frame,
                        })
                        .is_ok()
                    })
                    .unwrap_or(false);
                if !delivered {
                    debug!("delivery queue closed; dropping MESSAGE");
                }
            }
        }
    }

    async fn on_receipt(&self, frame: Frame) {
        let receipt_id = frame.get_header("receipt-id").unwrap_or("");
        let waiters = self
            .pending_receipts
            .lock()
            .await
            .remove(receipt_id)
            .unwrap_or_default();
        let correlated = !waiters.is_empty();
        for tx in waiters {
            let _ = tx.send(());
        }
        match &self.mode {
            DeliveryMode::Callback(handler) => handler.on_receipt(receipt_id),
            DeliveryMode::Queue if !correlated => {
                debug!(receipt_id, "discarding uncorrelated RECEIPT");
            }
            DeliveryMode::Queue => {}
        }
    }

    async fn on_error(&self, frame: Frame) {
        let err = ServerError::from_frame(frame);
        let connecting = self.session.lock().await.phase() == Phase::Connecting;
        if connecting {
            if let Some(tx) = self.handshake.lock().await.take() {
                let _ = tx.send(Err(ConnError::ServerRejected(err.clone())));
            }
        }
        match &self.mode {
            DeliveryMode::Callback(handler) => {
                handler.on_error(&err.message, err.body.as_deref().unwrap_or(""))
            }
            DeliveryMode::Queue => warn!("{}", err),
        }
    }

    /// Report an undecodable frame. Fatal during the handshake, otherwise
    /// the frame is discarded.
    pub(crate) async fn protocol_error(&self, err: ConnError) {
        let connecting = self.session.lock().await.phase() == Phase::Connecting;
        if connecting {
            if let Some(tx) = self.handshake.lock().await.take() {
                warn!("malformed frame during handshake: {}", err);
                let _ = tx.send(Err(err));
                return;
            }
        }
        warn!("discarding malformed frame: {}", err);
    }

    /// Connection-level error sink: the transport broke. Surfaces `cause`
    /// once, marks the session failed and wakes every waiter.
    pub(crate) async fn fail(&self, cause: ConnError) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!("connection lost: {}", cause);
        self.session.lock().await.fail();
        self.wake_all().await;
        if let DeliveryMode::Callback(handler) = &self.mode {
            handler.on_connection_lost(&cause);
        }
    }

    /// Orderly teardown; wakes every waiter. Idempotent.
    pub(crate) async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.wake_all().await;
    }

    async fn wake_all(&self) {
        if let Some(tx) = self.handshake.lock().await.take() {
            let _ = tx.send(Err(ConnError::ConnectionClosed));
        }
        // Dropping the senders resolves each waiter with a RecvError.
        self.pending_receipts.lock().await.clear();
        self.queue_tx.lock().await.take();
    }
}
