// ── Trip snapshot subscription ──
//
// Consumer-facing handle. Owns at most one session task at a time; the
// task owns the socket and the retry timer. Changing target or disabling
// tears the session down and waits for it before returning.

use std::fmt;
use std::sync::Arc;

use fleetwatch_api::{Endpoint, GraphqlClient, SocketConnector, TripSnapshot, WsConnector};
use secrecy::SecretString;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{SnapshotCache, SnapshotState, SnapshotStream};
use crate::config::SubscriptionConfig;
use crate::error::SubscriptionError;
use crate::reconnect::ReconnectPolicy;
use crate::session::{self, Session};
use crate::source::SnapshotSource;
use crate::state::ConnectionState;
use crate::target::TripId;

type UpdateHandler = Arc<dyn Fn(Arc<TripSnapshot>) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&SubscriptionError) + Send + Sync>;

/// Optional consumer callbacks.
///
/// `on_update` fires for every snapshot pushed over the socket.
/// `on_error` fires for every error surfaced into the cache.
#[derive(Clone, Default)]
pub struct SubscriptionHandlers {
    on_update: Option<UpdateHandler>,
    on_error: Option<ErrorHandler>,
}

impl SubscriptionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_update(mut self, f: impl Fn(Arc<TripSnapshot>) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&SubscriptionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn update(&self, snapshot: Arc<TripSnapshot>) {
        if let Some(ref f) = self.on_update {
            f(snapshot);
        }
    }

    pub(crate) fn error(&self, error: &SubscriptionError) {
        if let Some(ref f) = self.on_error {
            f(error);
        }
    }
}

impl fmt::Debug for SubscriptionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandlers")
            .field("on_update", &self.on_update.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Everything a session needs to reach the backend.
struct Wiring<C, S> {
    connector: Arc<C>,
    source: Arc<S>,
    ws_url: Url,
}

struct RunningSession {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Live subscription to one trip's snapshot feed.
///
/// Starts idle: set a target and [`enable`](Self::enable) it. Reads are
/// synchronous and always reflect the latest published state.
///
/// ```rust,ignore
/// let config = SubscriptionConfig::new(Endpoint::parse("https://api.fleet.example/graphql")?);
/// let mut sub = TripSnapshotSubscription::from_config(&config);
/// sub.set_target(Some("trip-42".into())).await;
/// sub.enable().await;
///
/// let mut updates = sub.watch();
/// while let Some(state) = updates.changed().await {
///     println!("{:?}", state.snapshot);
/// }
/// ```
pub struct TripSnapshotSubscription<C = WsConnector, S = GraphqlClient>
where
    C: SocketConnector,
    S: SnapshotSource,
{
    wiring: Result<Wiring<C, S>, SubscriptionError>,
    authorization: Option<SecretString>,
    policy: ReconnectPolicy,
    handlers: SubscriptionHandlers,
    cache: SnapshotCache,
    target: Option<TripId>,
    enabled: bool,
    running: Option<RunningSession>,
}

impl TripSnapshotSubscription<WsConnector, GraphqlClient> {
    /// Build the production client: HTTP fetch via [`GraphqlClient`],
    /// socket via [`WsConnector`].
    ///
    /// Never fails. A missing or unusable endpoint is reported through
    /// [`error`](Self::error) once the subscription is enabled.
    pub fn from_config(config: &SubscriptionConfig) -> Self {
        let wiring = match config.endpoint {
            None => Err(SubscriptionError::Config("no API base URL configured".into())),
            Some(ref endpoint) => GraphqlClient::new(endpoint.clone(), &config.transport())
                .map(|client| Wiring {
                    connector: Arc::new(WsConnector::new(config.token.clone())),
                    source: Arc::new(client),
                    ws_url: endpoint.ws_url().clone(),
                })
                .map_err(|e| SubscriptionError::Config(e.to_string())),
        };

        Self::with_wiring(wiring)
            .with_policy(config.reconnect)
            .with_authorization(config.token.clone())
    }
}

impl<C, S> TripSnapshotSubscription<C, S>
where
    C: SocketConnector,
    S: SnapshotSource,
{
    /// Build from explicit transport pieces. `endpoint: None` yields a
    /// subscription that reports a configuration error when enabled.
    pub fn new(endpoint: Option<&Endpoint>, connector: C, source: S) -> Self {
        let wiring = endpoint
            .map(|endpoint| Wiring {
                connector: Arc::new(connector),
                source: Arc::new(source),
                ws_url: endpoint.ws_url().clone(),
            })
            .ok_or_else(|| SubscriptionError::Config("no API base URL configured".into()));
        Self::with_wiring(wiring)
    }

    fn with_wiring(wiring: Result<Wiring<C, S>, SubscriptionError>) -> Self {
        Self {
            wiring,
            authorization: None,
            policy: ReconnectPolicy::default(),
            handlers: SubscriptionHandlers::default(),
            cache: SnapshotCache::new(),
            target: None,
            enabled: false,
            running: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_handlers(mut self, handlers: SubscriptionHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Token sent in the `connection_init` payload.
    #[must_use]
    pub fn with_authorization(mut self, token: Option<SecretString>) -> Self {
        self.authorization = token;
        self
    }

    // ── Consumer inputs ──────────────────────────────────────────────

    /// Change the subscription target. Any running session is fully torn
    /// down (socket closed with 1000, timer dropped) before a new one
    /// starts.
    pub async fn set_target(&mut self, target: Option<TripId>) {
        if self.target == target {
            return;
        }
        debug!(from = ?self.target, to = ?target, "changing subscription target");
        self.stop_session().await;
        self.cache.retarget(target.clone());
        self.target = target;
        if self.enabled {
            self.start_session();
        }
    }

    /// Turn live updates on. Calling this after reconnection gave up (or
    /// after the server closed normally) starts a fresh session.
    pub async fn enable(&mut self) {
        self.enabled = true;
        if self
            .running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
        {
            return;
        }
        self.stop_session().await;
        self.start_session();
    }

    /// Turn live updates off. The last snapshot stays readable.
    pub async fn disable(&mut self) {
        self.enabled = false;
        self.stop_session().await;
    }

    pub async fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.enable().await;
        } else {
            self.disable().await;
        }
    }

    /// Tear everything down and wait for it.
    pub async fn dispose(mut self) {
        self.enabled = false;
        self.stop_session().await;
    }

    /// Re-run the initial fetch. The live socket is left alone.
    pub async fn refetch(&self) {
        let Some(ref target) = self.target else {
            debug!("refetch without a target ignored");
            return;
        };
        let wiring = match self.wiring {
            Ok(ref wiring) => wiring,
            Err(ref error) => {
                self.report_config_error(error);
                return;
            }
        };

        let writer = self.cache.writer();
        writer.set_loading(true);
        let result = wiring.source.fetch(target.as_str()).await;
        session::record_fetch(&writer, &self.handlers, target, result);
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Option<Arc<TripSnapshot>> {
        self.cache.current().snapshot
    }

    pub fn is_loading(&self) -> bool {
        self.cache.current().is_loading
    }

    pub fn error(&self) -> Option<SubscriptionError> {
        self.cache.current().error
    }

    pub fn is_connected(&self) -> bool {
        self.cache.current().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.cache.current().connection
    }

    /// Full published state in one read.
    pub fn state(&self) -> SnapshotState {
        self.cache.current()
    }

    /// Change notifications for the published state.
    pub fn watch(&self) -> SnapshotStream {
        self.cache.subscribe()
    }

    pub fn target(&self) -> Option<&TripId> {
        self.target.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    // ── Session lifecycle ────────────────────────────────────────────

    fn start_session(&mut self) {
        let Some(ref target) = self.target else {
            debug!("enabled without a target; idle");
            return;
        };
        let wiring = match self.wiring {
            Ok(ref wiring) => wiring,
            Err(ref error) => {
                self.report_config_error(error);
                return;
            }
        };

        let cancel = CancellationToken::new();
        let session = Session {
            target: target.clone(),
            connector: Arc::clone(&wiring.connector),
            source: Arc::clone(&wiring.source),
            ws_url: wiring.ws_url.clone(),
            authorization: self.authorization.clone(),
            policy: self.policy,
            handlers: self.handlers.clone(),
            writer: self.cache.begin_session(target.clone()),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(session.run());
        self.running = Some(RunningSession { cancel, task });
    }

    async fn stop_session(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        self.cache.end_session();
        running.cancel.cancel();
        if let Err(e) = running.task.await {
            if e.is_panic() {
                warn!(error = %e, "subscription session panicked");
            }
        }
    }

    fn report_config_error(&self, error: &SubscriptionError) {
        warn!(error = %error, "subscription not configured");
        self.cache.set_error(error.clone());
        self.handlers.error(error);
    }
}

impl<C, S> Drop for TripSnapshotSubscription<C, S>
where
    C: SocketConnector,
    S: SnapshotSource,
{
    /// Cancels the running session without waiting. The detached task
    /// still closes its socket with 1000, but can no longer touch the
    /// cache.
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            self.cache.end_session();
            running.cancel.cancel();
        }
    }
}

impl<C, S> fmt::Debug for TripSnapshotSubscription<C, S>
where
    C: SocketConnector,
    S: SnapshotSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripSnapshotSubscription")
            .field("target", &self.target)
            .field("enabled", &self.enabled)
            .field("running", &self.running.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
