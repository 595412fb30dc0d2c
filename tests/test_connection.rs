//! End-to-end tests against loopback WebSocket servers.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use ws_link::{Connection, ConnectionState, WsLinkError, WsMessage};

type ServerStream = WebSocketStream<TcpStream>;

/// Start a one-connection server that accepts the first offered
/// sub-protocol and hands the upgraded stream to `handler`.
async fn start_server<F, Fut>(handler: F) -> String
where
    F: FnOnce(ServerStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_hdr_async(stream, |req: &Request, mut resp: Response| {
            if let Some(offer) = req.headers().get("sec-websocket-protocol") {
                let first = offer
                    .to_str()
                    .unwrap()
                    .split(',')
                    .next()
                    .unwrap()
                    .trim()
                    .to_string();
                resp.headers_mut()
                    .insert("sec-websocket-protocol", first.parse().unwrap());
            }
            Ok(resp)
        })
        .await
        .unwrap();
        handler(ws).await;
    });
    format!("ws://{}", addr)
}

async fn echo_until_close(mut ws: ServerStream) {
    while let Some(Ok(frame)) = ws.next().await {
        match frame {
            Message::Text(_) | Message::Binary(_) => {
                if ws.send(frame).await.is_err() {
                    break;
                }
            },
            Message::Close(_) => {
                let _ = ws.close(None).await;
                break;
            },
            _ => {},
        }
    }
}

#[tokio::test]
async fn ready_reports_open_and_negotiated_subprotocol() {
    let url = start_server(echo_until_close).await;

    let conn = Connection::connect(&url, &["chat.v2", "chat.v1"], &[]).unwrap();
    assert_eq!(conn.state(), ConnectionState::Connecting);
    assert_eq!(conn.sub_protocol(), None);

    assert_eq!(conn.await_ready().await, ConnectionState::Open);
    assert_eq!(conn.sub_protocol(), Some("chat.v2".to_string()));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn cursor_pulls_messages_then_terminates() {
    let url = start_server(|mut ws| async move {
        // Wait for the client's go-ahead so its cursor exists first.
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(t))) if t.as_str() == "go" => break,
                Some(Ok(_)) => continue,
                _ => return,
            }
        }
        ws.send(Message::Text("a".into())).await.unwrap();
        ws.send(Message::Text("b".into())).await.unwrap();
        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        }))
        .await
        .unwrap();
        while ws.next().await.is_some() {}
    })
    .await;

    let conn = Connection::connect(&url, &[], &[]).unwrap();
    assert_eq!(conn.await_ready().await, ConnectionState::Open);

    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
    conn.on_closed(move |event| {
        let _ = closed_tx.send(event.clone());
    });

    let mut messages = conn.messages();
    conn.send("go").await.unwrap();

    assert_eq!(messages.next().await.unwrap(), Some(WsMessage::text("a")));
    assert_eq!(messages.next().await.unwrap(), Some(WsMessage::text("b")));
    assert_eq!(messages.next().await.unwrap(), None);

    assert_eq!(conn.state(), ConnectionState::Closed);
    let event = conn.close_event().unwrap();
    assert_eq!(event.code, 1000);
    assert_eq!(event.reason.as_deref(), Some("bye"));

    let notified = tokio::time::timeout(Duration::from_secs(1), closed_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notified.code, 1000);
    assert!(closed_rx.try_recv().is_err(), "on_closed fired more than once");
}

#[tokio::test]
async fn push_handler_receives_text_and_binary_echo() {
    let url = start_server(echo_until_close).await;

    let conn = Connection::connect(&url, &[], &[]).unwrap();
    assert_eq!(conn.await_ready().await, ConnectionState::Open);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    conn.on_message(move |msg| {
        let _ = seen_tx.send(msg);
    });

    conn.send("ping").await.unwrap();
    conn.send(vec![0xDEu8, 0xAD]).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, WsMessage::text("ping"));

    let second = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, WsMessage::binary(vec![0xDEu8, 0xAD]));

    conn.close().await.unwrap();
}

#[tokio::test]
async fn refused_connection_resolves_ready_with_closed() {
    // Bind then drop to obtain a port with nothing listening.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("ws://127.0.0.1:{}", port);

    let conn = Connection::connect(&url, &[], &[]).unwrap();
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    conn.on_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let state = tokio::time::timeout(Duration::from_secs(5), conn.await_ready())
        .await
        .expect("await_ready must resolve on a failed connect");
    assert_eq!(state, ConnectionState::Closed);
    assert_eq!(conn.close_event().unwrap().code, 1006);
    assert!(errors.load(Ordering::SeqCst) >= 1, "error handler never fired");
}

#[tokio::test]
async fn send_while_connecting_is_rejected() {
    // A TCP listener that accepts but never answers the upgrade keeps the
    // connection in Connecting.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(stream);
    });

    let conn = Connection::connect(&format!("ws://{}", addr), &[], &[]).unwrap();
    match conn.send("too early").await {
        Err(WsLinkError::NotOpen { state }) => assert_eq!(state, ConnectionState::Connecting),
        other => panic!("expected NotOpen, got {:?}", other),
    }
}

#[tokio::test]
async fn close_over_wire_is_idempotent_and_notifies_once() {
    let url = start_server(echo_until_close).await;

    let conn = Connection::connect(&url, &[], &[]).unwrap();
    assert_eq!(conn.await_ready().await, ConnectionState::Open);

    let closed = Arc::new(AtomicUsize::new(0));
    let counter = closed.clone();
    conn.on_closed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut messages = conn.messages();
    conn.close_with(1000, Some("done")).await.unwrap();
    conn.close().await.unwrap();
    conn.close_with(1002, Some("ignored")).await.unwrap();

    // The cursor terminates once the close handshake completes.
    let end = tokio::time::timeout(Duration::from_secs(2), messages.next())
        .await
        .expect("cursor must terminate after close")
        .unwrap();
    assert_eq!(end, None);

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.close_event().unwrap().code, 1000);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn locally_requested_close_code_is_reported() {
    let url = start_server(echo_until_close).await;

    let conn = Connection::connect(&url, &[], &[]).unwrap();
    assert_eq!(conn.await_ready().await, ConnectionState::Open);

    let mut messages = conn.messages();
    conn.close_with(4000, Some("shutting down")).await.unwrap();

    let end = tokio::time::timeout(Duration::from_secs(2), messages.next())
        .await
        .expect("cursor must terminate after close")
        .unwrap();
    assert_eq!(end, None);

    // The terminal event carries the code this side asked for, whether
    // the peer's close reply surfaced as a frame or the stream just
    // ended after the handshake.
    assert_eq!(conn.close_event().unwrap().code, 4000);
}

#[tokio::test]
async fn custom_headers_reach_the_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (header_tx, header_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut header_tx = Some(header_tx);
        let ws = accept_hdr_async(stream, move |req: &Request, resp: Response| {
            let value = req
                .headers()
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let _ = header_tx.take().unwrap().send(value);
            Ok(resp)
        })
        .await
        .unwrap();
        echo_until_close(ws).await;
    });

    let conn = Connection::connect(
        &format!("ws://{}", addr),
        &[],
        &[("x-api-key", "secret")],
    )
    .unwrap();
    assert_eq!(conn.await_ready().await, ConnectionState::Open);

    let seen = tokio::time::timeout(Duration::from_secs(2), header_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.as_deref(), Some("secret"));

    conn.close().await.unwrap();
}
