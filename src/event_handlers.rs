//! Terminal and error event multicast.
//!
//! Callback-based hooks for connection lifecycle signals:
//!
//! - `on_closed`: fired once, when the connection reaches its terminal state
//! - `on_error`: fired for every transport error
//!
//! Handlers run in registration order. There is no replay: a handler
//! registered after the terminal event already fired is never invoked.
//! Terminal state stays queryable via
//! [`Connection::state`](crate::connection::Connection::state) and
//! [`Connection::close_event`](crate::connection::Connection::close_event),
//! so late registrants are expected to check state first.

use crate::error::WsLinkError;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Terminal close information delivered to `on_closed` handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// WebSocket close code (e.g. 1000 = normal, 1006 = abnormal).
    pub code: u16,
    /// Optional close reason, decoded as UTF-8 text.
    pub reason: Option<String>,
}

impl CloseEvent {
    /// Create a close event.
    pub fn new(code: u16, reason: Option<String>) -> Self {
        Self { code, reason }
    }
}

impl fmt::Display for CloseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) if !reason.is_empty() => {
                write!(f, "closed with code {}: {}", self.code, reason)
            },
            _ => write!(f, "closed with code {}", self.code),
        }
    }
}

/// Type alias for the on_closed callback.
pub(crate) type OnClosedCallback = Arc<dyn Fn(&CloseEvent) + Send + Sync>;

/// Type alias for the on_error callback.
pub(crate) type OnErrorCallback = Arc<dyn Fn(&WsLinkError) + Send + Sync>;

/// Multicast registries for terminal/error signals.
///
/// Registration and emission take the same lock, but handlers themselves
/// run on a snapshot taken outside it, so a handler may register further
/// handlers without deadlocking.
#[derive(Default)]
pub(crate) struct Notifiers {
    closed: Mutex<Vec<OnClosedCallback>>,
    error: Mutex<Vec<OnErrorCallback>>,
}

impl Notifiers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_closed(&self, handler: OnClosedCallback) {
        self.closed.lock().unwrap().push(handler);
    }

    pub(crate) fn add_error(&self, handler: OnErrorCallback) {
        self.error.lock().unwrap().push(handler);
    }

    /// Invoke every registered closed handler, in registration order.
    pub(crate) fn emit_closed(&self, event: &CloseEvent) {
        let handlers: Vec<OnClosedCallback> = self.closed.lock().unwrap().clone();
        for handler in handlers {
            handler(event);
        }
    }

    /// Invoke every registered error handler, in registration order.
    pub(crate) fn emit_error(&self, error: &WsLinkError) {
        let handlers: Vec<OnErrorCallback> = self.error.lock().unwrap().clone();
        for handler in handlers {
            handler(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn closed_handlers_run_in_registration_order() {
        let notifiers = Notifiers::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            notifiers.add_closed(Arc::new(move |_| {
                order.lock().unwrap().push(tag);
            }));
        }

        notifiers.emit_closed(&CloseEvent::new(1000, None));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn error_handlers_see_every_error() {
        let notifiers = Notifiers::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        notifiers.add_error(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        notifiers.emit_error(&WsLinkError::Transport("boom".to_string()));
        notifiers.emit_error(&WsLinkError::Transport("boom again".to_string()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handler_registered_after_emit_never_fires() {
        let notifiers = Notifiers::new();
        notifiers.emit_closed(&CloseEvent::new(1006, None));

        let fired = Arc::new(AtomicUsize::new(0));
        let marker = fired.clone();
        notifiers.add_closed(Arc::new(move |_| {
            marker.fetch_add(1, Ordering::SeqCst);
        }));

        // No replay: the terminal event already happened.
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn close_event_display_includes_reason() {
        let with_reason = CloseEvent::new(1001, Some("going away".to_string()));
        assert_eq!(with_reason.to_string(), "closed with code 1001: going away");
        let without = CloseEvent::new(1006, None);
        assert_eq!(without.to_string(), "closed with code 1006");
    }
}
