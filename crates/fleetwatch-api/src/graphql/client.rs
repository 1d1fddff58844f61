// GraphQL HTTP client
//
// Wraps `reqwest::Client` with the `{query, variables}` request envelope and
// `{data, errors}` response unwrapping. The bearer token travels as a default
// header installed by `TransportConfig`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::model::TripSnapshot;
use crate::protocol::{GraphqlErrorItem, TripVariables};
use crate::transport::TransportConfig;

use super::queries::TRIP_SNAPSHOT_QUERY;

#[derive(Serialize)]
struct GraphqlRequest<'a, V: Serialize> {
    query: &'a str,
    variables: &'a V,
}

/// Standard GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlErrorItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTripSnapshot {
    get_trip_snapshot: Option<TripSnapshot>,
}

/// HTTP client for the GraphQL endpoint.
///
/// All methods return the unwrapped `data` payload -- the envelope and any
/// `errors` array are handled before the caller sees the result.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl GraphqlClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(endpoint: Endpoint, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, endpoint })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Endpoint) -> Self {
        Self { http, endpoint }
    }

    /// The endpoint this client posts to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetch the current snapshot for one trip.
    pub async fn trip_snapshot(&self, trip_id: &str) -> Result<TripSnapshot, Error> {
        let variables = TripVariables {
            trip_id: trip_id.to_owned(),
        };
        let data: GetTripSnapshot = self.execute(TRIP_SNAPSHOT_QUERY, &variables).await?;
        data.get_trip_snapshot.ok_or(Error::EmptyResult {
            field: "getTripSnapshot",
        })
    }

    /// POST an operation and unwrap the response envelope.
    pub async fn execute<V, T>(&self, query: &str, variables: &V) -> Result<T, Error>
    where
        V: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint.http_url().clone();
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_response(resp).await
    }
}

/// Turn an HTTP response into `data`, or the most specific error available.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            message: "token missing, expired or revoked".into(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        // GraphQL servers often explain a 4xx in an `errors` array.
        if let Ok(envelope) = serde_json::from_str::<GraphqlResponse<serde_json::Value>>(&body) {
            if !envelope.errors.is_empty() {
                return Err(Error::Graphql {
                    messages: envelope.errors.into_iter().map(|e| e.message).collect(),
                });
            }
        }
        return Err(Error::Http {
            status: status.as_u16(),
            body: preview(&body).to_owned(),
        });
    }

    let envelope: GraphqlResponse<T> =
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })?;

    if !envelope.errors.is_empty() {
        return Err(Error::Graphql {
            messages: envelope.errors.into_iter().map(|e| e.message).collect(),
        });
    }

    envelope.data.ok_or(Error::EmptyResult { field: "data" })
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
