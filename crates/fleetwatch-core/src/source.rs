// ── Initial-fetch seam ──

use std::future::Future;

use fleetwatch_api::{GraphqlClient, TripSnapshot};

use crate::config::SubscriptionConfig;
use crate::error::CoreError;
use crate::target::TripId;

/// One-shot snapshot fetch, run before the socket is established and on
/// `refetch()`.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(
        &self,
        trip_id: &str,
    ) -> impl Future<Output = Result<TripSnapshot, fleetwatch_api::Error>> + Send;
}

impl SnapshotSource for GraphqlClient {
    async fn fetch(&self, trip_id: &str) -> Result<TripSnapshot, fleetwatch_api::Error> {
        self.trip_snapshot(trip_id).await
    }
}

/// One-shot fetch for callers that don't need live updates.
pub async fn fetch_snapshot(
    config: &SubscriptionConfig,
    trip_id: &TripId,
) -> Result<TripSnapshot, CoreError> {
    let endpoint = config.endpoint.clone().ok_or_else(|| CoreError::Config {
        message: "no API base URL configured".into(),
    })?;
    let client = GraphqlClient::new(endpoint, &config.transport())?;

    match client.trip_snapshot(trip_id.as_str()).await {
        Err(fleetwatch_api::Error::EmptyResult { .. }) => Err(CoreError::TripNotFound {
            trip_id: trip_id.to_string(),
        }),
        other => Ok(other?),
    }
}
