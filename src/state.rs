//! Connection lifecycle state.
//!
//! One [`StateCell`] exists per logical connection. External callers are
//! read-only; mutations happen only on the internal lifecycle handlers in
//! [`crate::core`]. Transitions are monotonic: there is no way out of
//! `Closed`.

use crate::event_handlers::CloseEvent;
use std::fmt;
use std::sync::RwLock;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The transport handshake has not completed yet.
    Connecting,
    /// The connection is established and messages may flow.
    Open,
    /// A local `close()` was requested but the transport has not yet
    /// confirmed it.
    Closing,
    /// Terminal. Captured close code/reason are available via
    /// [`Connection::close_event`](crate::connection::Connection::close_event).
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

struct StateInner {
    state: ConnectionState,
    sub_protocol: Option<String>,
    close_event: Option<CloseEvent>,
}

/// Shared lifecycle cell: current state, negotiated sub-protocol, and the
/// terminal close event once known.
pub(crate) struct StateCell {
    inner: RwLock<StateInner>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(StateInner {
                state: ConnectionState::Connecting,
                sub_protocol: None,
                close_event: None,
            }),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.inner.read().unwrap().state
    }

    pub(crate) fn sub_protocol(&self) -> Option<String> {
        self.inner.read().unwrap().sub_protocol.clone()
    }

    pub(crate) fn close_event(&self) -> Option<CloseEvent> {
        self.inner.read().unwrap().close_event.clone()
    }

    /// Connecting → Open, capturing the negotiated sub-protocol.
    ///
    /// Returns `false` (and changes nothing) from any other state; an
    /// "opened" signal racing a local close or arriving after Closed is
    /// ignored.
    pub(crate) fn mark_open(&self, sub_protocol: Option<String>) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.state != ConnectionState::Connecting {
            return false;
        }
        inner.state = ConnectionState::Open;
        inner.sub_protocol = sub_protocol;
        true
    }

    /// Connecting/Open → Closing. Returns `false` when already
    /// Closing or Closed, making local `close()` idempotent.
    pub(crate) fn mark_closing(&self) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                inner.state = ConnectionState::Closing;
                true
            },
            ConnectionState::Closing | ConnectionState::Closed => false,
        }
    }

    /// Any non-terminal state → Closed, capturing code and reason.
    ///
    /// Returns `false` when already Closed so the terminal notification
    /// fires exactly once.
    pub(crate) fn mark_closed(&self, event: CloseEvent) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.state == ConnectionState::Closed {
            return false;
        }
        inner.state = ConnectionState::Closed;
        inner.close_event = Some(event);
        true
    }
}
