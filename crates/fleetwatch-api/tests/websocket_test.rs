#![allow(clippy::unwrap_used)]
// Integration tests for `WsConnector` against an in-process tungstenite server.

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use fleetwatch_api::protocol::{ClientMessage, ServerMessage, SUBPROTOCOL};
use fleetwatch_api::{SocketConnector, SocketFrame, SubscriptionSocket, WsConnector};

// ── Helpers ─────────────────────────────────────────────────────────

struct Handshake {
    protocol: Option<String>,
    authorization: Option<String>,
}

/// Accept one connection, run the graphql-ws happy path, then close with `close_code`.
async fn spawn_server(close_code: u16) -> (Url, oneshot::Receiver<Handshake>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut seen = None;
        let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            let header = |name: &str| {
                req.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            };
            seen = Some(Handshake {
                protocol: header("sec-websocket-protocol"),
                authorization: header("authorization"),
            });
            resp.headers_mut()
                .insert("sec-websocket-protocol", HeaderValue::from_static(SUBPROTOCOL));
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        let _ = tx.send(seen.unwrap());

        // connection_init → connection_ack
        let init = ws.next().await.unwrap().unwrap();
        let init: Value = serde_json::from_str(init.to_text().unwrap()).unwrap();
        assert_eq!(init["type"], "connection_init");
        ws.send(Message::text(json!({ "type": "connection_ack" }).to_string()))
            .await
            .unwrap();

        // start → data
        let start = ws.next().await.unwrap().unwrap();
        let start: Value = serde_json::from_str(start.to_text().unwrap()).unwrap();
        assert_eq!(start["type"], "start");
        assert_eq!(start["payload"]["variables"]["tripId"], "trip-42");
        ws.send(Message::text(
            json!({
                "type": "data",
                "id": "1",
                "payload": { "data": { "tripSnapshot": { "capacity": { "totalSeats": 40 } } } }
            })
            .to_string(),
        ))
        .await
        .unwrap();

        ws.close(Some(CloseFrame {
            code: CloseCode::from(close_code),
            reason: "bye".into(),
        }))
        .await
        .unwrap();
        // Drain until the client acknowledges the close.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let url = Url::parse(&format!("ws://{addr}/graphql")).unwrap();
    (url, rx)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_handshake_and_data() {
    let (url, handshake) = spawn_server(1000).await;

    let connector = WsConnector::new(Some(SecretString::from("tok")));
    let mut socket = connector.connect(&url).await.unwrap();

    let seen = handshake.await.unwrap();
    assert_eq!(seen.protocol.as_deref(), Some(SUBPROTOCOL));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer tok"));

    socket
        .send_text(ClientMessage::init(None).to_text())
        .await
        .unwrap();

    let SocketFrame::Text(ack) = socket.next_frame().await.unwrap() else {
        panic!("expected ack text frame");
    };
    assert_eq!(
        ServerMessage::decode(&ack).unwrap(),
        ServerMessage::ConnectionAck
    );

    socket
        .send_text(ClientMessage::start_trip_snapshot("subscription { x }", "trip-42").to_text())
        .await
        .unwrap();

    let SocketFrame::Text(data) = socket.next_frame().await.unwrap() else {
        panic!("expected data text frame");
    };
    let ServerMessage::Data { payload, .. } = ServerMessage::decode(&data).unwrap() else {
        panic!("expected data message");
    };
    assert_eq!(payload.into_snapshot().unwrap().capacity.total_seats, 40);

    let closed = socket.next_frame().await.unwrap();
    assert_eq!(
        closed,
        SocketFrame::Closed {
            code: 1000,
            reason: "bye".into()
        }
    );
    assert!(closed.is_normal_close());
}

#[tokio::test]
async fn test_abnormal_close_code_is_reported() {
    let (url, _handshake) = spawn_server(1011).await;

    let mut socket = WsConnector::default().connect(&url).await.unwrap();
    socket
        .send_text(ClientMessage::init(None).to_text())
        .await
        .unwrap();
    socket.next_frame().await.unwrap(); // ack
    socket
        .send_text(ClientMessage::start_trip_snapshot("subscription { x }", "trip-42").to_text())
        .await
        .unwrap();
    socket.next_frame().await.unwrap(); // data

    match socket.next_frame().await.unwrap() {
        SocketFrame::Closed { code, .. } => assert_eq!(code, 1011),
        other @ SocketFrame::Text(_) => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind then drop to get a port nobody is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("ws://{addr}/graphql")).unwrap();
    let err = WsConnector::default().connect(&url).await.err().unwrap();
    assert!(err.is_transient(), "got {err:?}");
}
