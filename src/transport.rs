//! Transport collaborator: owns the `tokio-tungstenite` stream.
//!
//! A single background task performs the handshake, reads frames, executes
//! outbound send/close commands, and translates everything into the four
//! core signals (`opened`, `message`, `closed`, `error`). Wire concerns
//! (ping/pong replies, close handshake, TLS) stay in here; the adaptation
//! core never sees them.

use crate::core::ConnectionCore;
use crate::error::{Result, WsLinkError};
use crate::message::WsMessage;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    handshake::client::Request,
    http::header::{HeaderName, HeaderValue, SEC_WEBSOCKET_PROTOCOL},
    protocol::frame::coding::CloseCode,
    protocol::{CloseFrame, Message},
};
use url::Url;

/// Maximum accepted inbound text message size (64 MiB).
const MAX_WS_TEXT_MESSAGE_BYTES: usize = 64 << 20;

/// Normal closure, the default for a locally initiated close.
pub(crate) const CLOSE_CODE_NORMAL: u16 = 1000;

/// Close code reported when the stream ends without a close frame.
pub(crate) const CLOSE_CODE_ABNORMAL: u16 = 1006;

/// Close code reported when the peer's close frame carried no status.
pub(crate) const CLOSE_CODE_NO_STATUS: u16 = 1005;

/// Outbound commands from the public handle to the transport task.
pub(crate) enum LinkCmd {
    /// Send one application message.
    Send(WsMessage),
    /// Start the close handshake with the given code and reason.
    Close { code: u16, reason: Option<String> },
}

/// Build the HTTP upgrade request: URL validation, requested
/// sub-protocols, caller-supplied headers.
pub(crate) fn build_request(
    url: &str,
    protocols: &[String],
    headers: &[(String, String)],
) -> Result<Request> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| WsLinkError::Configuration(format!("invalid URL '{}': {}", url, e)))?;

    match parsed.scheme() {
        "ws" | "wss" => {},
        other => {
            return Err(WsLinkError::Configuration(format!(
                "unsupported scheme '{}'; expected ws:// or wss://",
                other
            )));
        },
    }
    if parsed.host_str().is_none() {
        return Err(WsLinkError::Configuration(format!(
            "URL '{}' must include a host",
            url
        )));
    }

    let mut request = parsed.as_str().into_client_request().map_err(|e| {
        WsLinkError::Configuration(format!("failed to build WebSocket request: {}", e))
    })?;

    if !protocols.is_empty() {
        let joined = protocols.join(",");
        let value = HeaderValue::from_str(&joined).map_err(|e| {
            WsLinkError::Configuration(format!("invalid sub-protocol list '{}': {}", joined, e))
        })?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| WsLinkError::Configuration(format!("invalid header '{}': {}", name, e)))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            WsLinkError::Configuration(format!("invalid value for header '{}': {}", name, e))
        })?;
        request.headers_mut().insert(header_name, header_value);
    }

    Ok(request)
}

fn outbound_frame(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(s) => Message::Text(s.into()),
        WsMessage::Binary(b) => Message::Binary(b),
    }
}

/// The background task driving one connection.
///
/// Lifecycle:
/// 1. Perform the handshake (bounded by `connect_timeout`) and signal
///    `opened` with the negotiated sub-protocol.
/// 2. Loop: read frames and execute commands until the stream ends.
/// 3. Signal `closed` exactly once (the core ignores duplicates): from
///    the peer's close frame when there is one, otherwise as an abnormal
///    closure.
pub(crate) async fn run_transport(
    request: Request,
    connect_timeout: Duration,
    core: Arc<ConnectionCore>,
    mut cmd_rx: mpsc::Receiver<LinkCmd>,
) {
    let connected = match tokio::time::timeout(connect_timeout, connect_async(request)).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            let msg = format!("connection failed: {}", e);
            core.handle_error(WsLinkError::Transport(msg.clone()));
            core.handle_closed(CLOSE_CODE_ABNORMAL, Some(msg));
            return;
        },
        Err(_) => {
            let msg = format!("connection timeout ({:?})", connect_timeout);
            core.handle_error(WsLinkError::Timeout(msg.clone()));
            core.handle_closed(CLOSE_CODE_ABNORMAL, Some(msg));
            return;
        },
    };
    let (mut ws_stream, response) = connected;

    let sub_protocol = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    core.handle_opened(sub_protocol);

    // False once the public handle is gone and close has been initiated.
    let mut cmd_open = true;
    // Code/reason of a close this side requested. After we send a close
    // frame, tungstenite may consume the peer's reply internally and end
    // the stream with `None`; that end is the requested close completing,
    // not an abnormal one.
    let mut local_close: Option<(u16, Option<String>)> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if cmd_open => match cmd {
                Some(LinkCmd::Send(msg)) => {
                    if let Err(e) = ws_stream.send(outbound_frame(msg)).await {
                        core.handle_error(WsLinkError::Transport(format!(
                            "send failed: {}", e
                        )));
                    }
                },
                Some(LinkCmd::Close { code, reason }) => {
                    log::debug!("[ws-link] sending close frame (code={})", code);
                    local_close = Some((code, reason.clone()));
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.unwrap_or_default().into(),
                    };
                    if let Err(e) = ws_stream.close(Some(frame)).await {
                        log::debug!("[ws-link] close frame send failed: {}", e);
                    }
                    // Keep reading until the peer confirms the close.
                },
                None => {
                    // Handle dropped: close the socket, then drain so any
                    // live cursors still observe the terminal signal.
                    cmd_open = false;
                    local_close = Some((CLOSE_CODE_NORMAL, None));
                    let _ = ws_stream.close(None).await;
                },
            },
            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > MAX_WS_TEXT_MESSAGE_BYTES {
                        core.handle_error(WsLinkError::Transport(format!(
                            "text message too large ({} bytes > {} bytes)",
                            text.len(),
                            MAX_WS_TEXT_MESSAGE_BYTES
                        )));
                    } else {
                        core.handle_message(WsMessage::Text(text.as_str().to_string()));
                    }
                },
                Some(Ok(Message::Binary(data))) => {
                    core.handle_message(WsMessage::Binary(data));
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => {
                            let reason = if f.reason.is_empty() {
                                None
                            } else {
                                Some(f.reason.as_str().to_string())
                            };
                            (u16::from(f.code), reason)
                        },
                        None => (CLOSE_CODE_NO_STATUS, None),
                    };
                    core.handle_closed(code, reason);
                    // Keep polling: tungstenite finishes the close
                    // handshake and then yields None.
                },
                Some(Ok(Message::Ping(payload))) => {
                    // tokio-tungstenite auto-responds, but be explicit.
                    let _ = ws_stream.send(Message::Pong(payload)).await;
                },
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {},
                Some(Err(e)) => {
                    core.handle_error(WsLinkError::Transport(e.to_string()));
                    core.handle_closed(CLOSE_CODE_ABNORMAL, None);
                    return;
                },
                None => {
                    match local_close.take() {
                        Some((code, reason)) => core.handle_closed(code, reason),
                        None => core.handle_closed(CLOSE_CODE_ABNORMAL, None),
                    }
                    return;
                },
            },
        }
    }
}
