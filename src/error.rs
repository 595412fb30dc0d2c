//! Error types for the ws-link client.

use crate::state::ConnectionState;
use thiserror::Error;

/// Errors surfaced by the ws-link adaptation layer.
///
/// Every error has exactly one sink: it is either returned from the call
/// that caused it (`NotOpen`, `CursorBusy`, `Configuration`) or routed to
/// the registered error handlers (`Transport`, `Timeout`). Nothing is
/// silently swallowed.
#[derive(Debug, Clone, Error)]
pub enum WsLinkError {
    /// The underlying transport reported a failure. Routed to error
    /// handlers; by itself this does not end message delivery, only a
    /// "closed" signal does.
    #[error("transport error: {0}")]
    Transport(String),

    /// `send()` was attempted while the connection is not open.
    /// Raised synchronously, before any transport call.
    #[error("cannot send while connection is {state}")]
    NotOpen {
        /// State observed at the time of the call.
        state: ConnectionState,
    },

    /// A second `next()` was started on a cursor that already has one
    /// outstanding. The cursor supports at most one pending wait.
    #[error("cursor already has an outstanding next() call")]
    CursorBusy,

    /// Invalid connect input (URL, protocol list, or header).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Timed out establishing the transport connection.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WsLinkError>;
