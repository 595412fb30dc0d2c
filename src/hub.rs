//! Message fan-out hub.
//!
//! Receives the ordered inbound stream from the transport and distributes
//! each message to all registered push subscribers (in registration order)
//! and to every live pull cursor. Until the first push subscriber appears,
//! messages accumulate in a single shared backlog; that backlog is drained
//! exactly once into the first subscriber, then buffering for the push
//! class stops for good. Pull cursors are independent of the backlog: each
//! observes the stream from the moment it was created.
//!
//! Registration and dispatch take the same lock, so they are mutually
//! exclusive even when the surrounding runtime lets them race. The
//! transport delivers serially, so per-subscriber order is exactly the
//! transport order. Push handlers run under the hub lock and therefore
//! must not register subscribers or create cursors from inside the
//! callback.

use crate::cursor::{CursorShared, MessageCursor};
use crate::message::WsMessage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Type alias for a push message handler.
pub(crate) type OnMessageCallback = Arc<dyn Fn(WsMessage) + Send + Sync>;

struct HubInner {
    /// Push handlers in registration order.
    push_subs: Vec<OnMessageCallback>,
    /// Messages buffered while no push subscriber exists yet.
    backlog: VecDeque<WsMessage>,
    /// Live pull cursors; pruned when the consumer side is dropped.
    cursors: Vec<Arc<Mutex<CursorShared>>>,
    closed: bool,
}

pub(crate) struct MessageHub {
    inner: Mutex<HubInner>,
}

impl MessageHub {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner {
                push_subs: Vec::new(),
                backlog: VecDeque::new(),
                cursors: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Register a push handler.
    ///
    /// The first subscriber is synchronously replayed everything the hub
    /// buffered so far, in arrival order, before live delivery begins;
    /// later subscribers see only messages arriving after they register.
    pub(crate) fn add_push_subscriber(&self, handler: OnMessageCallback) {
        let mut inner = self.inner.lock().unwrap();
        if inner.push_subs.is_empty() {
            let backlog = std::mem::take(&mut inner.backlog);
            for msg in backlog {
                handler(msg);
            }
        }
        inner.push_subs.push(handler);
    }

    /// Create an independent pull cursor.
    ///
    /// The cursor sees every message dispatched from this point on. A
    /// cursor created after the hub closed is born terminal and yields
    /// end-of-stream immediately.
    pub(crate) fn new_cursor(&self) -> MessageCursor {
        let mut inner = self.inner.lock().unwrap();
        let shared = Arc::new(Mutex::new(CursorShared::new(inner.closed)));
        if !inner.closed {
            inner.cursors.push(shared.clone());
        }
        MessageCursor::new(shared)
    }

    /// Distribute one inbound message. Called once per transport message,
    /// in transport order.
    pub(crate) fn dispatch(&self, msg: WsMessage) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            log::debug!("[ws-link] dropping message dispatched after close");
            return;
        }

        if inner.push_subs.is_empty() {
            inner.backlog.push_back(msg.clone());
        } else {
            for handler in &inner.push_subs {
                handler(msg.clone());
            }
        }

        // Prune cursors whose consumer handle is gone.
        inner.cursors.retain(|c| Arc::strong_count(c) > 1);
        for cursor in &inner.cursors {
            CursorShared::deliver(cursor, msg.clone());
        }
    }

    /// Terminal shutdown: mark every cursor closed and wake pending
    /// waiters with end-of-stream. Queued messages stay drainable.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return;
        }
        inner.closed = true;
        for cursor in inner.cursors.drain(..) {
            CursorShared::close(&cursor);
        }
    }
}
