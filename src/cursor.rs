//! Pull adapter: single-consumer, suspend-based iteration over messages.
//!
//! Each cursor owns a private FIFO queue plus at most one armed waiter.
//! The hub's dispatch path always appends to the queue and uses the
//! waiter purely as a wake signal; a resumed [`MessageCursor::next`] pops
//! the queue itself. Messages therefore never sit inside the wake channel
//! and cannot be lost when a suspended `next()` is cancelled. Cursors
//! never share state with push subscribers or with each other.

use crate::error::{Result, WsLinkError};
use crate::message::WsMessage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Per-cursor state shared between the cursor handle and the hub.
pub(crate) struct CursorShared {
    /// Messages that arrived while no waiter was armed, in arrival order.
    queue: VecDeque<WsMessage>,
    /// One-shot wake handle for a caller suspended in `next()`.
    waiter: Option<oneshot::Sender<()>>,
    /// Set when the connection reached its terminal state.
    closed: bool,
}

impl CursorShared {
    pub(crate) fn new(closed: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            waiter: None,
            closed,
        }
    }

    /// Deliver one message to this cursor: queue it FIFO, then wake the
    /// armed waiter if any. Called from the hub's dispatch path.
    pub(crate) fn deliver(shared: &Mutex<CursorShared>, msg: WsMessage) {
        let mut cursor = shared.lock().unwrap();
        // The message always goes through the queue; the waiter only
        // carries a wake. A next() cancelled after this wake leaves the
        // message queued for the following call instead of losing it.
        cursor.queue.push_back(msg);
        if let Some(tx) = cursor.waiter.take() {
            let _ = tx.send(());
        }
    }

    /// Mark the cursor terminal and wake a pending waiter, if any, with
    /// end-of-stream. Queued messages stay drainable.
    pub(crate) fn close(shared: &Mutex<CursorShared>) {
        let mut cursor = shared.lock().unwrap();
        cursor.closed = true;
        // Dropping the sender resumes the waiter, which re-checks the
        // queue and the closed flag and reports end-of-stream.
        cursor.waiter = None;
    }
}

/// Clears a waiter this `next()` call armed if the future is dropped
/// before being resumed, so a cancelled wait never leaks.
struct WaiterGuard<'a> {
    shared: &'a Mutex<CursorShared>,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        // On the completed paths the waiter slot is already empty (taken
        // by deliver/close); on cancellation this removes the stale one.
        self.shared.lock().unwrap().waiter = None;
    }
}

/// Single-consumer pull view over a connection's inbound messages.
///
/// Created via [`Connection::messages`](crate::connection::Connection::messages).
/// The cursor observes every message dispatched from the moment it was
/// created, in transport order.
///
/// # Examples
///
/// ```rust,no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let conn = ws_link::Connection::connect("ws://localhost:3000/ws", &[], &[])?;
/// conn.await_ready().await;
///
/// let mut messages = conn.messages();
/// while let Some(msg) = messages.next().await? {
///     println!("got: {:?}", msg);
/// }
/// // next() returned None: connection closed and the queue is drained.
/// # Ok(())
/// # }
/// ```
pub struct MessageCursor {
    shared: Arc<Mutex<CursorShared>>,
}

impl MessageCursor {
    pub(crate) fn new(shared: Arc<Mutex<CursorShared>>) -> Self {
        Self { shared }
    }

    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` once the connection is closed *and* this
    /// cursor's queue is drained, never before. Messages queued before
    /// the terminal state remain retrievable after it.
    ///
    /// At most one `next()` may be outstanding per cursor; the `&mut self`
    /// receiver enforces that statically, and an armed leftover waiter is
    /// rejected with [`WsLinkError::CursorBusy`] rather than corrupting
    /// delivery. Dropping the returned future (cancellation) releases the
    /// pending waiter; a message that raced the cancellation stays queued
    /// for the following call.
    pub async fn next(&mut self) -> Result<Option<WsMessage>> {
        loop {
            let rx = {
                let mut cursor = self.shared.lock().unwrap();
                if cursor.closed && cursor.queue.is_empty() {
                    return Ok(None);
                }
                if let Some(msg) = cursor.queue.pop_front() {
                    return Ok(Some(msg));
                }
                if cursor.waiter.is_some() {
                    return Err(WsLinkError::CursorBusy);
                }
                let (tx, rx) = oneshot::channel();
                cursor.waiter = Some(tx);
                rx
            };

            let _guard = WaiterGuard {
                shared: &self.shared,
            };
            // Ok: a delivery queued a message and woke us. Err: the hub
            // closed this cursor while we waited. Either way the queue
            // and the closed flag decide on the next pass.
            let _ = rx.await;
        }
    }
}
