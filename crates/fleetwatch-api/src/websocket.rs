//! Subscription socket transport.
//!
//! [`SocketConnector`] / [`SubscriptionSocket`] are the seam between the
//! subscription state machine in `fleetwatch-core` and the wire. The
//! production implementation, [`WsConnector`], opens a `graphql-ws`
//! WebSocket with `tokio-tungstenite`; tests substitute in-memory fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetwatch_api::{Endpoint, SocketConnector, SocketFrame, SubscriptionSocket, WsConnector};
//!
//! let endpoint = Endpoint::parse("https://api.fleet.example/graphql")?;
//! let mut socket = WsConnector::new(None).connect(endpoint.ws_url()).await?;
//! socket.send_text(r#"{"type":"connection_init"}"#.into()).await?;
//!
//! while let Ok(SocketFrame::Text(text)) = socket.next_frame().await {
//!     println!("{text}");
//! }
//! ```

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::protocol::SUBPROTOCOL;

/// Close code for a normal, intentional closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

// ── Frames ───────────────────────────────────────────────────────────

/// What the subscription layer sees from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketFrame {
    /// A text frame (one protocol message).
    Text(String),
    /// The connection is over. `code` is [`ABNORMAL_CLOSURE`] when the
    /// stream ended without a close frame.
    Closed { code: u16, reason: String },
}

impl SocketFrame {
    pub fn is_normal_close(&self) -> bool {
        matches!(self, Self::Closed { code, .. } if *code == NORMAL_CLOSURE)
    }
}

// ── Seams ────────────────────────────────────────────────────────────

/// Opens subscription sockets.
pub trait SocketConnector: Send + Sync + 'static {
    type Socket: SubscriptionSocket;

    /// Open a socket to `url`, negotiating the `graphql-ws` sub-protocol.
    fn connect(&self, url: &Url) -> impl Future<Output = Result<Self::Socket, Error>> + Send;
}

/// One open subscription socket.
pub trait SubscriptionSocket: Send + 'static {
    /// Send one text frame.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), Error>> + Send;

    /// Wait for the next text frame or for the connection to end.
    ///
    /// Transport errors surface as `Err`; the caller treats them as an
    /// abnormal closure.
    fn next_frame(&mut self) -> impl Future<Output = Result<SocketFrame, Error>> + Send;

    /// Close the socket from the client side. Best effort: errors are
    /// logged, never returned.
    fn close(&mut self, code: u16, reason: &str) -> impl Future<Output = ()> + Send;
}

// ── tokio-tungstenite implementation ─────────────────────────────────

/// Production connector backed by `tokio-tungstenite`.
///
/// If a bearer token is configured it is sent as an `Authorization` header
/// on the upgrade request.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    bearer: Option<SecretString>,
}

impl WsConnector {
    pub fn new(bearer: Option<SecretString>) -> Self {
        Self { bearer }
    }
}

impl SocketConnector for WsConnector {
    type Socket = WsSocket;

    async fn connect(&self, url: &Url) -> Result<WsSocket, Error> {
        tracing::info!(url = %url, "Connecting to WebSocket");

        let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;

        let mut request = ClientRequestBuilder::new(uri).with_sub_protocol(SUBPROTOCOL);
        if let Some(ref token) = self.bearer {
            request = request.with_header("Authorization", format!("Bearer {}", token.expose_secret()));
        }

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("WebSocket connected");
        Ok(WsSocket { stream })
    }
}

/// An open `tokio-tungstenite` socket.
pub struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl SubscriptionSocket for WsSocket {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.stream
            .send(tungstenite::Message::text(text))
            .await
            .map_err(|e| Error::WebSocketSend(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<SocketFrame, Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Ok(SocketFrame::Text(text.as_str().to_owned()));
                }
                Some(Ok(tungstenite::Message::Ping(_))) => {
                    // tungstenite handles pong replies automatically
                    tracing::trace!("WebSocket ping");
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    let (code, reason) = frame.map_or((ABNORMAL_CLOSURE, String::new()), |cf| {
                        (u16::from(cf.code), cf.reason.as_str().to_owned())
                    });
                    tracing::info!(code, reason = %reason, "WebSocket close frame received");
                    return Ok(SocketFrame::Closed { code, reason });
                }
                Some(Ok(_)) => {
                    // Binary, Pong, Frame -- ignore
                }
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Ok(SocketFrame::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: "stream ended without close frame".into(),
                    });
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            tracing::debug!(error = %e, "WebSocket close handshake failed");
        }
    }
}
