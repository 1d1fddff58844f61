// ── Subscription session task ──
//
// One spawned task per enabled target. It owns the socket and the retry
// timer, runs the initial fetch, then drives the connection machine until
// it is cancelled, the server closes normally or reconnection gives up.
// Every suspension point sits in a `select!` whose cancellation branch
// wins.

use std::sync::Arc;

use fleetwatch_api::graphql::queries::TRIP_SNAPSHOT_SUBSCRIPTION;
use fleetwatch_api::protocol::{self, ClientMessage, DataPayload, ServerMessage};
use fleetwatch_api::websocket::{ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use fleetwatch_api::{SocketConnector, SocketFrame, SubscriptionSocket};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::cache::CacheWriter;
use crate::error::SubscriptionError;
use crate::reconnect::{ReconnectPolicy, RetryTimer};
use crate::source::SnapshotSource;
use crate::state::{ConnectionEvent, ConnectionMachine, ConnectionState, Directive};
use crate::subscription::SubscriptionHandlers;
use crate::target::TripId;

pub(crate) struct Session<C, S> {
    pub target: TripId,
    pub connector: Arc<C>,
    pub source: Arc<S>,
    pub ws_url: Url,
    pub authorization: Option<SecretString>,
    pub policy: ReconnectPolicy,
    pub handlers: SubscriptionHandlers,
    pub writer: CacheWriter,
    pub cancel: CancellationToken,
}

impl<C, S> Session<C, S>
where
    C: SocketConnector,
    S: SnapshotSource,
{
    pub async fn run(self) {
        info!(trip_id = %self.target, "subscription session started");

        if !self.initial_fetch().await {
            debug!(trip_id = %self.target, "session cancelled during initial fetch");
            return;
        }

        let mut machine = ConnectionMachine::new(self.policy);
        let mut timer = RetryTimer::new();
        let mut directive = match machine.apply(ConnectionEvent::Enable) {
            Ok(directive) => directive,
            Err(e) => {
                warn!(error = %e, "cannot enable connection");
                return;
            }
        };

        loop {
            match directive {
                Directive::Connect => {
                    directive = self.connect_and_stream(&mut machine).await;
                }
                Directive::Retry { attempt, delay } => {
                    debug!(
                        trip_id = %self.target,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "scheduling reconnect"
                    );
                    timer.schedule(delay);

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {
                            timer.cancel();
                            directive = self.disable(&mut machine);
                        }
                        () = timer.fired() => {
                            directive = match machine.apply(ConnectionEvent::RetryElapsed) {
                                Ok(next) => next,
                                Err(e) => {
                                    warn!(error = %e, "retry timer fired in unexpected state");
                                    Directive::Stop
                                }
                            };
                        }
                    }
                }
                Directive::GiveUp { attempts } => {
                    warn!(trip_id = %self.target, attempts, "reconnection attempts exhausted");
                    self.writer.set_connection(ConnectionState::Failed);
                    self.surface(SubscriptionError::ReconnectExhausted { attempts });
                    break;
                }
                Directive::Stop | Directive::Continue => {
                    self.writer.set_connection(ConnectionState::Disconnected);
                    break;
                }
            }
        }

        info!(trip_id = %self.target, "subscription session ended");
    }

    /// Returns `false` if cancelled before the fetch resolved. The result
    /// of a cancelled fetch is dropped with its future.
    async fn initial_fetch(&self) -> bool {
        self.writer.set_loading(true);
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            result = self.source.fetch(self.target.as_str()) => {
                record_fetch(&self.writer, &self.handlers, &self.target, result);
                true
            }
        }
    }

    fn disable(&self, machine: &mut ConnectionMachine) -> Directive {
        machine
            .apply(ConnectionEvent::Disable)
            .unwrap_or(Directive::Stop)
    }

    /// Report an error to the cache and, if the session is still live, to
    /// the consumer's `on_error`.
    fn surface(&self, error: SubscriptionError) {
        if self.writer.set_error(error.clone()) {
            self.handlers.error(&error);
        }
    }

    /// The socket went away abnormally; hand over to the reconnect policy.
    fn lost(&self, machine: &mut ConnectionMachine, code: u16, reason: String) -> Directive {
        warn!(trip_id = %self.target, code, reason = %reason, "subscription connection lost");
        let directive = machine
            .apply(ConnectionEvent::Closed { code })
            .unwrap_or(Directive::Stop);
        let error = SubscriptionError::Transport(reason);
        if self.writer.connection_lost(machine.state(), error.clone()) {
            self.handlers.error(&error);
        }
        directive
    }

    /// One connection attempt: open, handshake, stream frames until the
    /// socket ends or the session is cancelled.
    async fn connect_and_stream(&self, machine: &mut ConnectionMachine) -> Directive {
        self.writer.set_connection(machine.state());

        let connected = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return self.disable(machine),
            result = self.connector.connect(&self.ws_url) => result,
        };

        let mut socket = match connected {
            Ok(socket) => socket,
            Err(e) => return self.lost(machine, ABNORMAL_CLOSURE, e.to_string()),
        };

        if let Err(e) = machine.apply(ConnectionEvent::Opened) {
            warn!(error = %e, "socket opened in unexpected state");
        }

        let bearer = self
            .authorization
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()));
        if let Err(e) = socket
            .send_text(ClientMessage::init(bearer.as_deref()).to_text())
            .await
        {
            socket.close(ABNORMAL_CLOSURE, "init failed").await;
            return self.lost(machine, ABNORMAL_CLOSURE, e.to_string());
        }

        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!(trip_id = %self.target, "closing subscription socket");
                    socket.close(NORMAL_CLOSURE, "subscription disabled").await;
                    return self.disable(machine);
                }
                frame = socket.next_frame() => frame,
            };

            match frame {
                Ok(SocketFrame::Text(text)) => {
                    if let Some(directive) = self.handle_text(&text, machine, &mut socket).await {
                        return directive;
                    }
                }
                Ok(SocketFrame::Closed { code, reason }) if code == NORMAL_CLOSURE => {
                    info!(trip_id = %self.target, reason = %reason, "server closed subscription");
                    return machine
                        .apply(ConnectionEvent::Closed { code })
                        .unwrap_or(Directive::Stop);
                }
                Ok(SocketFrame::Closed { code, reason }) => {
                    let reason = if reason.is_empty() {
                        format!("socket closed with code {code}")
                    } else {
                        format!("socket closed with code {code}: {reason}")
                    };
                    return self.lost(machine, code, reason);
                }
                Err(e) => return self.lost(machine, ABNORMAL_CLOSURE, e.to_string()),
            }
        }
    }

    /// Handle one text frame. Returns a directive only when the connection
    /// has to end.
    async fn handle_text(
        &self,
        text: &str,
        machine: &mut ConnectionMachine,
        socket: &mut C::Socket,
    ) -> Option<Directive> {
        let message = match ServerMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "malformed subscription frame ignored");
                return None;
            }
        };

        match message {
            ServerMessage::ConnectionAck => {
                if let Err(e) = machine.apply(ConnectionEvent::Acknowledged) {
                    warn!(error = %e, "unexpected connection_ack ignored");
                    return None;
                }
                info!(trip_id = %self.target, "subscription acknowledged");
                self.writer.set_connection(ConnectionState::Connected);

                let start =
                    ClientMessage::start_trip_snapshot(TRIP_SNAPSHOT_SUBSCRIPTION, self.target.as_str());
                if let Err(e) = socket.send_text(start.to_text()).await {
                    socket.close(ABNORMAL_CLOSURE, "start failed").await;
                    return Some(self.lost(machine, ABNORMAL_CLOSURE, e.to_string()));
                }
            }
            ServerMessage::KeepAlive => trace!("subscription keep-alive"),
            ServerMessage::Data { payload, .. } => self.handle_data(payload),
            ServerMessage::Error { payload, .. } => {
                let message = protocol::error_message(&payload);
                warn!(trip_id = %self.target, error = %message, "subscription error frame");
                self.surface(SubscriptionError::Protocol(message));
            }
            ServerMessage::ConnectionError { payload } => {
                let message = protocol::error_message(&payload);
                warn!(trip_id = %self.target, error = %message, "subscription connection_error frame");
                self.surface(SubscriptionError::Protocol(message));
            }
            ServerMessage::Complete { id } => {
                info!(trip_id = %self.target, id = ?id, "server completed the subscription");
            }
            ServerMessage::Unrecognized => {
                debug!(frame = %text, "unrecognised subscription frame ignored");
            }
        }

        None
    }

    fn handle_data(&self, payload: DataPayload) {
        let messages: Vec<String> = payload.errors.iter().map(|e| e.message.clone()).collect();

        match payload.into_snapshot() {
            Some(snapshot) => {
                debug!(trip_id = %self.target, "snapshot update");
                if let Some(snapshot) = self.writer.replace_snapshot(snapshot) {
                    self.handlers.update(snapshot);
                }
            }
            None if !messages.is_empty() => {
                let message = messages.join("; ");
                warn!(trip_id = %self.target, error = %message, "data frame carried errors");
                self.surface(SubscriptionError::Protocol(message));
            }
            None => debug!(trip_id = %self.target, "data frame without snapshot ignored"),
        }
    }
}

/// Store a fetch result and tell the consumer about failures.
pub(crate) fn record_fetch(
    writer: &CacheWriter,
    handlers: &SubscriptionHandlers,
    target: &TripId,
    result: Result<fleetwatch_api::TripSnapshot, fleetwatch_api::Error>,
) {
    match result {
        Ok(snapshot) => {
            debug!(trip_id = %target, "initial snapshot fetched");
            writer.apply_fetch(Ok(snapshot));
        }
        Err(e) => {
            warn!(trip_id = %target, error = %e, "snapshot fetch failed");
            let error = SubscriptionError::Fetch(e.to_string());
            if writer.apply_fetch(Err(error.clone())) {
                handlers.error(&error);
            }
        }
    }
}
