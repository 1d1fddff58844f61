// fleetwatch-core: Trip-snapshot subscription client between fleetwatch-api and consumers.

pub mod cache;
pub mod config;
pub mod error;
pub mod reconnect;
mod session;
pub mod source;
pub mod state;
pub mod subscription;
pub mod target;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{SnapshotCache, SnapshotState, SnapshotStream, SnapshotWatchStream};
pub use config::{SubscriptionConfig, TlsVerification};
pub use error::{CoreError, SubscriptionError};
pub use reconnect::ReconnectPolicy;
pub use source::{SnapshotSource, fetch_snapshot};
pub use state::{ConnectionMachine, ConnectionState};
pub use subscription::{SubscriptionHandlers, TripSnapshotSubscription};
pub use target::TripId;

// Wire model re-exported so consumers need only this crate.
pub use fleetwatch_api::{Endpoint, LocationRole, SeatCounters, TicketSummary, TripLocation, TripSnapshot};
