//! Suspend-until-open synchronization.
//!
//! Any number of tasks may wait on the gate; all of them are resumed
//! exactly once when the connection leaves `Connecting` (whether it opened
//! or failed straight to `Closed`). After the first release the pending
//! set is gone for good and later waits return immediately.

use std::sync::Mutex;
use tokio::sync::oneshot;

pub(crate) struct ReadyGate {
    /// Pending resume handles. `None` once the gate has been released.
    waiters: Mutex<Option<Vec<oneshot::Sender<()>>>>,
}

impl ReadyGate {
    pub(crate) fn new() -> Self {
        Self {
            waiters: Mutex::new(Some(Vec::new())),
        }
    }

    /// Resume every pending waiter. Idempotent; only the first call does
    /// anything.
    pub(crate) fn release(&self) {
        let pending = self.waiters.lock().unwrap().take();
        if let Some(pending) = pending {
            for tx in pending {
                // A dropped receiver just means that waiter was cancelled.
                let _ = tx.send(());
            }
        }
    }

    /// Suspend until [`release`](Self::release) runs. Returns immediately
    /// if the gate was already released.
    pub(crate) async fn wait(&self) {
        let rx = {
            let mut guard = self.waiters.lock().unwrap();
            match guard.as_mut() {
                Some(pending) => {
                    let (tx, rx) = oneshot::channel();
                    pending.push(tx);
                    rx
                },
                None => return,
            }
        };
        // An error here means release() raced our registration and already
        // consumed the sender list; either way the gate is open.
        let _ = rx.await;
    }
}
