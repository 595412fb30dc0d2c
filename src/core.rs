//! Adaptation core: the four transport signals wired to state, gate,
//! hub, and notifiers.
//!
//! The core owns everything that is connection-scoped and in-memory. The
//! transport driver ([`crate::transport`]) pushes the signals in; the
//! public [`Connection`](crate::connection::Connection) handle and any
//! number of cursors pull results out. Tests drive the core directly,
//! without a socket.

use crate::cursor::MessageCursor;
use crate::error::WsLinkError;
use crate::event_handlers::{CloseEvent, Notifiers, OnClosedCallback, OnErrorCallback};
use crate::hub::{MessageHub, OnMessageCallback};
use crate::message::WsMessage;
use crate::readiness::ReadyGate;
use crate::state::{ConnectionState, StateCell};

pub(crate) struct ConnectionCore {
    state: StateCell,
    gate: ReadyGate,
    hub: MessageHub,
    notifiers: Notifiers,
}

impl ConnectionCore {
    pub(crate) fn new() -> Self {
        Self {
            state: StateCell::new(),
            gate: ReadyGate::new(),
            hub: MessageHub::new(),
            notifiers: Notifiers::new(),
        }
    }

    // ── Inbound transport signals ───────────────────────────────────────

    /// Transport "opened": Connecting → Open, resume readiness waiters.
    pub(crate) fn handle_opened(&self, sub_protocol: Option<String>) {
        if self.state.mark_open(sub_protocol) {
            log::debug!("[ws-link] connection open");
            self.gate.release();
        }
    }

    /// Transport "message": fan out in arrival order.
    pub(crate) fn handle_message(&self, msg: WsMessage) {
        self.hub.dispatch(msg);
    }

    /// Transport "closed": terminal. Resumes readiness waiters (a
    /// connection that failed before opening still releases the gate),
    /// ends every cursor, and notifies closed handlers exactly once.
    pub(crate) fn handle_closed(&self, code: u16, reason: Option<String>) {
        let event = CloseEvent::new(code, reason);
        if !self.state.mark_closed(event.clone()) {
            return;
        }
        log::debug!("[ws-link] connection closed: {}", event);
        self.gate.release();
        self.hub.close();
        self.notifiers.emit_closed(&event);
    }

    /// Transport "error": routed to error handlers only. Not a message,
    /// not a close. Delivery continues until a "closed" signal arrives.
    pub(crate) fn handle_error(&self, err: WsLinkError) {
        log::warn!("[ws-link] transport error: {}", err);
        self.notifiers.emit_error(&err);
    }

    // ── Consumer-facing surface ─────────────────────────────────────────

    /// Suspend until the connection leaves `Connecting`, then report what
    /// it became. Returns immediately when the state is already known.
    pub(crate) async fn await_ready(&self) -> ConnectionState {
        if self.state.state() == ConnectionState::Connecting {
            self.gate.wait().await;
        }
        self.state.state()
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.state()
    }

    pub(crate) fn sub_protocol(&self) -> Option<String> {
        self.state.sub_protocol()
    }

    pub(crate) fn close_event(&self) -> Option<CloseEvent> {
        self.state.close_event()
    }

    /// Record a local close request. Returns `false` when the connection
    /// is already Closing/Closed, making `close()` idempotent.
    pub(crate) fn request_close(&self) -> bool {
        self.state.mark_closing()
    }

    pub(crate) fn add_push_subscriber(&self, handler: OnMessageCallback) {
        self.hub.add_push_subscriber(handler);
    }

    pub(crate) fn new_cursor(&self) -> MessageCursor {
        self.hub.new_cursor()
    }

    pub(crate) fn add_closed_handler(&self, handler: OnClosedCallback) {
        self.notifiers.add_closed(handler);
    }

    pub(crate) fn add_error_handler(&self, handler: OnErrorCallback) {
        self.notifiers.add_error(handler);
    }
}
