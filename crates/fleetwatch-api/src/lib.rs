// fleetwatch-api: Async Rust client for the trip-snapshot API (HTTP GraphQL + graphql-ws)

pub mod endpoint;
pub mod error;
pub mod graphql;
pub mod model;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use endpoint::Endpoint;
pub use error::Error;
pub use graphql::GraphqlClient;
pub use model::{LocationRole, SeatCounters, TicketSummary, TripLocation, TripSnapshot};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{SocketConnector, SocketFrame, SubscriptionSocket, WsConnector};
