//! Async WebSocket client with pull-based message iteration.
//!
//! `ws-link` wraps a [`tokio-tungstenite`] connection behind a small,
//! consumer-driven surface. Instead of wiring up callbacks for everything,
//! callers can treat the connection as a sequence: wait for readiness, then
//! pull messages one at a time until the stream ends.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use ws_link::{Connection, ConnectionState};
//!
//! let conn = Connection::connect("wss://example.com/feed", &["chat.v2"], &[])?;
//! if conn.await_ready().await != ConnectionState::Open {
//!     return Err("connect failed".into());
//! }
//!
//! conn.send("hello").await?;
//! let mut messages = conn.messages();
//! while let Some(msg) = messages.next().await? {
//!     println!("received: {:?}", msg);
//! }
//! // The stream ended: the connection closed and the queue is drained.
//! println!("{:?}", conn.close_event());
//! # Ok(())
//! # }
//! ```
//!
//! Push-style consumption is available too: [`Connection::on_message`]
//! multicasts every inbound message to registered handlers, with a one-time
//! replay of anything that arrived before the first handler existed.
//! [`Connection::on_closed`] and [`Connection::on_error`] cover lifecycle
//! and transport-error signals.
//!
//! [`tokio-tungstenite`]: https://docs.rs/tokio-tungstenite

mod connection;
mod core;
mod cursor;
mod error;
mod event_handlers;
mod hub;
mod message;
mod readiness;
mod state;
mod transport;

pub use connection::{ConnectOptions, Connection};
pub use cursor::MessageCursor;
pub use error::{Result, WsLinkError};
pub use event_handlers::CloseEvent;
pub use message::WsMessage;
pub use state::ConnectionState;
