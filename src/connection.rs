use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::{self, StompCodec};
use crate::dispatcher::{Dispatcher, Message};
use crate::error::ConnError;
use crate::frame::{Command, Frame};
use crate::framer::ByteFramer;
use crate::locator::{Credentials, Locator};
use crate::options::ConnectOptions;
use crate::session::{AckMode, Phase, SessionState};
use crate::transport;

/// Serialized write side of the channel.
type Writer = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, StompCodec>;

/// How long `disconnect` waits for the reader task before aborting it.
const READER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Bound on each teardown step that touches the write side (DISCONNECT,
/// writer lock, sink close). A broker that stops reading cannot stall
/// `disconnect` for longer than this per step.
const TEARDOWN_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// High-level connection object that manages a single STOMP session.
///
/// `connect` opens the channel, spawns the reader task and completes the
/// CONNECT handshake. The reader task is the only code that reads from the
/// channel: it frames and decodes every inbound frame and hands it to the
/// dispatcher, which either calls the registered `FrameHandler` or queues
/// MESSAGE frames for [`Connection::receive`], depending on
/// `ConnectOptions::delivery`.
///
/// Writes from any number of cloned handles are serialized behind a mutex.
/// `Connection` is cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct Connection {
    writer: Arc<Mutex<Option<Writer>>>,
    session: Arc<Mutex<SessionState>>,
    dispatcher: Arc<Dispatcher>,
    /// Delivery queue, shared behind a mutex so cloned handles may call
    /// `receive` concurrently. `None` in callback mode.
    inbound_rx: Option<Arc<Mutex<mpsc::UnboundedReceiver<Message>>>>,
    shutdown_tx: broadcast::Sender<()>,
    reader: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Connection {
    /// Connect to the broker named by `locator`.
    ///
    /// Parameters
    /// - `locator`: `tcp://[login:passcode@]host[:port]` or the `tcps://`
    ///   equivalent for TLS.
    /// - `credentials`: explicit login/passcode. When `None`, credentials
    ///   embedded in the locator are used, if any.
    /// - `options`: handshake timeout, delivery mode and CONNECT headers.
    ///
    /// Fails with `InvalidLocator`, `Connect` (transport), `ConnectTimeout`,
    /// `ServerRejected` (ERROR instead of CONNECTED) or `ConnectionClosed`.
    pub async fn connect(
        locator: &str,
        credentials: Option<Credentials>,
        options: ConnectOptions,
    ) -> Result<Self, ConnError> {
        let locator: Locator = locator.parse()?;
        let credentials = credentials.or_else(|| locator.credentials.clone());
        let channel = transport::open(&locator).await?;
        info!("channel to {} open", locator);
        Self::connect_with_stream(channel, credentials, options).await
    }

    /// Run the STOMP handshake over an already-open duplex stream.
    ///
    /// This is the entry point for custom transports (and for tests, which
    /// use `tokio::io::duplex`).
    pub async fn connect_with_stream<S>(
        stream: S,
        credentials: Option<Credentials>,
        options: ConnectOptions,
    ) -> Result<Self, ConnError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let writer: Writer = FramedWrite::new(Box::new(write_half), StompCodec::new());

        let session = Arc::new(Mutex::new(SessionState::new()));
        session.lock().await.begin_connect();

        let (dispatcher, inbound_rx) = Dispatcher::new(options.delivery.clone(), session.clone());
        let dispatcher = Arc::new(dispatcher);
        let handshake = dispatcher.register_handshake().await;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let frames = FramedRead::new(read_half, ByteFramer::new());
        let reader = tokio::spawn(reader_loop(
            frames,
            dispatcher.clone(),
            shutdown_tx.subscribe(),
        ));

        let conn = Connection {
            writer: Arc::new(Mutex::new(Some(writer))),
            session,
            dispatcher,
            inbound_rx: inbound_rx.map(|rx| Arc::new(Mutex::new(rx))),
            shutdown_tx,
            reader: Arc::new(Mutex::new(Some(reader))),
        };

        let connect = SessionState::connect_frame(&options, credentials.as_ref());
        if let Err(e) = conn.write(connect).await {
            conn.teardown().await;
            return Err(match e {
                ConnError::Io(io) => ConnError::Connect(io),
                other => other,
            });
        }

        let result = match tokio::time::timeout(options.connect_timeout, handshake).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(ConnError::ConnectionClosed),
            Err(_) => Err(ConnError::ConnectTimeout(options.connect_timeout)),
        };

        match result {
            Ok(()) => Ok(conn),
            Err(e) => {
                warn!("STOMP handshake failed: {}", e);
                conn.teardown().await;
                Err(e)
            }
        }
    }

    /// Session id assigned by the broker, if it sent one.
    pub async fn session_id(&self) -> Option<String> {
        self.session.lock().await.session_id().map(str::to_string)
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> Phase {
        self.session.lock().await.phase()
    }

    fn ensure_open(&self) -> Result<(), ConnError> {
        if self.dispatcher.is_closed() {
            return Err(ConnError::Send("connection closed".into()));
        }
        Ok(())
    }

    /// Write one frame; writers are mutually exclusive.
    ///
    /// A write waiting for the lock or blocked on backpressure is abandoned
    /// with `ConnError::Send` when teardown broadcasts shutdown, releasing
    /// the writer lock.
    async fn write(&self, frame: Frame) -> Result<(), ConnError> {
        let mut shutdown = self.shutdown_tx.subscribe();
        let send = async {
            let mut guard = self.writer.lock().await;
            let sink = guard
                .as_mut()
                .ok_or_else(|| ConnError::Send("channel closed".into()))?;
            debug!(command = %frame.command, "sending frame");
            sink.send(frame).await.map_err(ConnError::Io)
        };
        tokio::select! {
            res = send => res,
            _ = shutdown.recv() => Err(ConnError::Send("connection closed".into())),
        }
    }

    /// Send an arbitrary frame as-is.
    ///
    /// Write failures are reported as `ConnError::Send`; they do not tear
    /// the connection down.
    pub async fn send_frame(&self, frame: Frame) -> Result<(), ConnError> {
        self.ensure_open()?;
        self.write(frame).await.map_err(as_send_error)
    }

    /// Publish `body` to `destination`.
    pub async fn send(&self, destination: &str, body: impl Into<Vec<u8>>) -> Result<(), ConnError> {
        self.send_with_headers(destination, body, Vec::new()).await
    }

    /// Publish with extra headers (e.g. `transaction`, `content-type`).
    ///
    /// Extra headers are applied after `destination` and `session`, so a
    /// colliding key replaces the mandatory value.
    pub async fn send_with_headers(
        &self,
        destination: &str,
        body: impl Into<Vec<u8>>,
        headers: Vec<(String, String)>,
    ) -> Result<(), ConnError> {
        self.ensure_open()?;
        let frame = self
            .session
            .lock()
            .await
            .send_frame(destination, body, &headers)?;
        self.send_frame(frame).await
    }

    /// Subscribe to a destination.
    ///
    /// With `AckMode::Client` every MESSAGE from this subscription must be
    /// acknowledged with [`Connection::ack`]; with `AckMode::Auto` it must
    /// not be.
    pub async fn subscribe(&self, destination: &str, ack: AckMode) -> Result<(), ConnError> {
        self.subscribe_with_headers(destination, ack, Vec::new())
            .await
    }

    /// Subscribe using optional extra headers (selectors, broker extensions).
    pub async fn subscribe_with_headers(
        &self,
        destination: &str,
        ack: AckMode,
        extra_headers: Vec<(String, String)>,
    ) -> Result<(), ConnError> {
        self.ensure_open()?;
        let frame = self
            .session
            .lock()
            .await
            .subscribe_frame(destination, ack, &extra_headers)?;
        self.send_frame(frame).await
    }

    pub async fn unsubscribe(&self, destination: &str) -> Result<(), ConnError> {
        self.ensure_open()?;
        let frame = self.session.lock().await.unsubscribe_frame(destination)?;
        self.send_frame(frame).await
    }

    /// Helper to send a transaction frame (BEGIN, COMMIT, or ABORT).
    async fn send_transaction_frame(
        &self,
        command: Command,
        transaction_id: &str,
    ) -> Result<(), ConnError> {
        self.ensure_open()?;
        let frame = self
            .session
            .lock()
            .await
            .transaction_frame(command, transaction_id)?;
        self.send_frame(frame).await
    }

    /// Begin a transaction.
    ///
    /// The broker owns transaction semantics; the client only tags frames.
    /// Pass `("transaction", id)` to `send_with_headers`, or the id to
    /// `ack`, to enlist work, then `commit` or `abort`.
    pub async fn begin(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.send_transaction_frame(Command::Begin, transaction_id)
            .await
    }

    pub async fn commit(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.send_transaction_frame(Command::Commit, transaction_id)
            .await
    }

    pub async fn abort(&self, transaction_id: &str) -> Result<(), ConnError> {
        self.send_transaction_frame(Command::Abort, transaction_id)
            .await
    }

    /// Acknowledge a message delivered under an `AckMode::Client`
    /// subscription, optionally inside `transaction`.
    pub async fn ack(&self, message_id: &str, transaction: Option<&str>) -> Result<(), ConnError> {
        self.ensure_open()?;
        let frame = self.session.lock().await.ack_frame(message_id, transaction)?;
        self.send_frame(frame).await
    }

    /// Acknowledge a message and wait until the broker confirms it.
    ///
    /// The ACK carries `receipt:<message_id>` and the call waits for a
    /// RECEIPT whose `receipt-id` equals `message_id`. Each call owns its
    /// own correlation, so MESSAGE frames arriving meanwhile keep flowing
    /// to `receive` or the handler.
    ///
    /// Returns `ReceiptTimeout` if no matching RECEIPT arrives within
    /// `timeout`, and `ConnectionClosed` if the connection is torn down
    /// first.
    pub async fn ack_confirmed(
        &self,
        message_id: &str,
        transaction: Option<&str>,
        timeout: Duration,
    ) -> Result<(), ConnError> {
        self.ensure_open()?;
        let frame = self
            .session
            .lock()
            .await
            .ack_frame(message_id, transaction)?
            .receipt(message_id);

        let rx = self.dispatcher.register_receipt(message_id).await?;
        if let Err(e) = self.send_frame(frame).await {
            drop(rx);
            self.dispatcher.forget_receipt(message_id).await;
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ConnError::ConnectionClosed),
            Err(_) => {
                self.dispatcher.forget_receipt(message_id).await;
                Err(ConnError::ReceiptTimeout(message_id.to_string()))
            }
        }
    }

    /// Wait for the next MESSAGE (queue delivery mode only).
    ///
    /// Returns `ConnectionClosed` once the connection is disconnected or
    /// fails, including for calls already waiting at that moment.
    pub async fn receive(&self) -> Result<Message, ConnError> {
        let rx = self.inbound_rx.as_ref().ok_or_else(|| {
            ConnError::InvalidState("receive() requires queue delivery mode".into())
        })?;
        let mut rx = rx.lock().await;
        rx.recv().await.ok_or(ConnError::ConnectionClosed)
    }

    /// Returns `true` when MESSAGE frames are delivered through `receive`.
    pub fn is_queue_mode(&self) -> bool {
        self.dispatcher.is_queue_mode()
    }

    /// Disconnect from the broker. Best effort: never fails.
    ///
    /// Wakes every task blocked in `receive` or `ack_confirmed` with
    /// `ConnectionClosed` first, then sends DISCONNECT if the session is
    /// live, stops the reader and closes the channel. Each write-side step
    /// is time-bounded, so a broker that stopped reading cannot stall it.
    pub async fn disconnect(&self) {
        let notice = {
            let mut session = self.session.lock().await;
            let live = session.phase() == Phase::Connected;
            session.begin_disconnect();
            live.then(|| session.disconnect_frame())
        };
        self.dispatcher.close().await;

        if let Some(frame) = notice {
            match tokio::time::timeout(TEARDOWN_WRITE_TIMEOUT, self.write(frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("DISCONNECT not delivered: {}", e),
                Err(_) => debug!("DISCONNECT not delivered: write side stalled"),
            }
        }
        self.teardown().await;
        self.session.lock().await.finish_disconnect();
        info!("disconnected");
    }

    async fn teardown(&self) {
        // Also releases writers blocked on backpressure.
        let _ = self.shutdown_tx.send(());
        self.dispatcher.close().await;

        match tokio::time::timeout(TEARDOWN_WRITE_TIMEOUT, self.writer.lock()).await {
            Ok(mut guard) => {
                if let Some(mut sink) = guard.take() {
                    match tokio::time::timeout(TEARDOWN_WRITE_TIMEOUT, sink.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!("closing channel: {}", e),
                        Err(_) => debug!("closing channel: flush stalled; dropping sink"),
                    }
                }
            }
            Err(_) => warn!("writer lock still held after shutdown; leaving sink open"),
        }

        if let Some(mut handle) = self.reader.lock().await.take() {
            if tokio::time::timeout(READER_JOIN_TIMEOUT, &mut handle).await.is_err() {
                debug!("reader did not stop in time; aborting");
                handle.abort();
            }
        }
    }
}

fn as_send_error(e: ConnError) -> ConnError {
    match e {
        ConnError::Io(io) => ConnError::Send(io.to_string()),
        other => other,
    }
}

/// Reader task: the single consumer of the channel's read side.
///
/// Frames arrive in wire order and are decoded and dispatched one at a
/// time. A malformed frame is reported and skipped; end-of-stream or a read
/// error ends the task through `Dispatcher::fail`.
async fn reader_loop<R>(
    mut frames: FramedRead<R, ByteFramer>,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: broadcast::Receiver<()>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                debug!("reader stopping on shutdown");
                dispatcher.close().await;
                break;
            }
            item = frames.next() => {
                match item {
                    Some(Ok(raw)) => match codec::decode(&raw) {
                        Ok(frame) => {
                            debug!(command = %frame.command, "received frame");
                            dispatcher.dispatch(frame).await;
                        }
                        Err(e) => dispatcher.protocol_error(e).await,
                    },
                    Some(Err(e)) => {
                        dispatcher.fail(ConnError::Io(e)).await;
                        break;
                    }
                    None => {
                        dispatcher.fail(ConnError::ConnectionClosed).await;
                        break;
                    }
                }
            }
        }
    }
}
