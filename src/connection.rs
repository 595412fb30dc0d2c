//! Public connection handle.
//!
//! [`Connection::connect`] validates the URL, spawns the transport driver,
//! and returns immediately in the `Connecting` state. Consumers then pick
//! their style: suspend on [`Connection::await_ready`] and pull messages
//! through a [`MessageCursor`], or register push callbacks with
//! [`Connection::on_message`] / [`Connection::on_closed`] /
//! [`Connection::on_error`].

use crate::core::ConnectionCore;
use crate::cursor::MessageCursor;
use crate::error::{Result, WsLinkError};
use crate::event_handlers::CloseEvent;
use crate::message::WsMessage;
use crate::state::ConnectionState;
use crate::transport::{self, LinkCmd};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CMD_CHANNEL_CAPACITY: usize = 256;

/// Tunables for establishing a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Upper bound on the handshake (TCP + TLS + WebSocket upgrade).
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// A client WebSocket connection.
///
/// Cheap to query, safe to share behind an `Arc`. Dropping the last handle
/// closes the underlying socket; messages already received stay drainable
/// through existing cursors.
pub struct Connection {
    core: Arc<ConnectionCore>,
    cmd_tx: mpsc::Sender<LinkCmd>,
    _driver: Option<JoinHandle<()>>,
}

impl Connection {
    /// Open a connection to `url` with default options.
    ///
    /// `protocols` become the `Sec-WebSocket-Protocol` offer; `headers`
    /// are added to the upgrade request verbatim. Returns as soon as the
    /// handshake has been *started*: the connection is `Connecting` and
    /// [`await_ready`](Self::await_ready) reports how it resolved.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(url: &str, protocols: &[&str], headers: &[(&str, &str)]) -> Result<Self> {
        Self::connect_with(url, protocols, headers, ConnectOptions::default())
    }

    /// Open a connection with explicit [`ConnectOptions`].
    pub fn connect_with(
        url: &str,
        protocols: &[&str],
        headers: &[(&str, &str)],
        options: ConnectOptions,
    ) -> Result<Self> {
        let protocols: Vec<String> = protocols.iter().map(|p| p.to_string()).collect();
        let headers: Vec<(String, String)> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let request = transport::build_request(url, &protocols, &headers)?;

        log::debug!("[ws-link] connecting to {}", url);
        let core = Arc::new(ConnectionCore::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let driver = tokio::spawn(transport::run_transport(
            request,
            options.connect_timeout,
            core.clone(),
            cmd_rx,
        ));

        Ok(Self {
            core,
            cmd_tx,
            _driver: Some(driver),
        })
    }

    /// Suspend until the connection leaves `Connecting`.
    ///
    /// Resolves with [`ConnectionState::Open`] on a successful handshake,
    /// or [`ConnectionState::Closed`] when the attempt failed; a failed
    /// connect is not an error here; inspect
    /// [`close_event`](Self::close_event) or register
    /// [`on_error`](Self::on_error) for the cause. Returns immediately if
    /// the state is already known. Any number of callers may wait
    /// concurrently.
    pub async fn await_ready(&self) -> ConnectionState {
        self.core.await_ready().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.core.state()
    }

    /// Sub-protocol negotiated during the handshake, if any.
    ///
    /// `None` until the connection opens, and `None` afterwards when the
    /// server did not pick one.
    pub fn sub_protocol(&self) -> Option<String> {
        self.core.sub_protocol()
    }

    /// Terminal close information, once the connection has closed.
    pub fn close_event(&self) -> Option<CloseEvent> {
        self.core.close_event()
    }

    /// Send one message.
    ///
    /// Fails with [`WsLinkError::NotOpen`] unless the connection is
    /// currently `Open`; sends are never buffered across the handshake.
    pub async fn send(&self, msg: impl Into<WsMessage>) -> Result<()> {
        let state = self.core.state();
        if state != ConnectionState::Open {
            return Err(WsLinkError::NotOpen { state });
        }
        self.cmd_tx
            .send(LinkCmd::Send(msg.into()))
            .await
            .map_err(|_| WsLinkError::Transport("connection task is gone".to_string()))
    }

    /// Close the connection with code 1000 (normal closure).
    pub async fn close(&self) -> Result<()> {
        self.close_with(transport::CLOSE_CODE_NORMAL, None).await
    }

    /// Close the connection with an explicit code and optional reason.
    ///
    /// Idempotent: once the connection is `Closing` or `Closed`, further
    /// calls are no-ops. The state moves to `Closing` immediately; `Closed`
    /// (and the `on_closed` notification) follows when the close handshake
    /// completes on the wire.
    pub async fn close_with(&self, code: u16, reason: Option<&str>) -> Result<()> {
        if !self.core.request_close() {
            return Ok(());
        }
        let cmd = LinkCmd::Close {
            code,
            reason: reason.map(str::to_owned),
        };
        if self.cmd_tx.send(cmd).await.is_err() {
            // Transport already gone; the terminal state is (or will be)
            // recorded by its shutdown path.
            log::debug!("[ws-link] close requested after transport exit");
        }
        Ok(())
    }

    /// Create an independent pull cursor over inbound messages.
    ///
    /// The cursor sees every message arriving from this call onward, in
    /// arrival order, and yields `None` once the connection has closed and
    /// its queue is drained. Each call returns a fresh, independent cursor.
    pub fn messages(&self) -> MessageCursor {
        self.core.new_cursor()
    }

    /// Register a push handler for inbound messages.
    ///
    /// The first handler ever registered is immediately replayed all
    /// messages that arrived before any handler existed; later handlers
    /// see only subsequent messages. Handlers run on the transport task in
    /// arrival order and must not block; they also must not register
    /// further handlers or create cursors from inside the callback.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(WsMessage) + Send + Sync + 'static,
    {
        self.core.add_push_subscriber(Arc::new(handler));
    }

    /// Register a handler for the terminal close event.
    ///
    /// Fires at most once. Handlers registered after the connection
    /// already closed are never invoked; check [`state`](Self::state) and
    /// [`close_event`](Self::close_event) when registering late.
    pub fn on_closed<F>(&self, handler: F)
    where
        F: Fn(&CloseEvent) + Send + Sync + 'static,
    {
        self.core.add_closed_handler(Arc::new(handler));
    }

    /// Register a handler for transport errors.
    ///
    /// Errors are advisory: message delivery continues until the
    /// connection actually closes.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&WsLinkError) + Send + Sync + 'static,
    {
        self.core.add_error_handler(Arc::new(handler));
    }
}
