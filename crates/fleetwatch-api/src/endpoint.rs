// ── API endpoint derivation ──
//
// A single base URL serves both the GraphQL POST endpoint and the
// subscription socket; the socket URL swaps the scheme (http→ws, https→wss).

use url::Url;

use crate::error::Error;

/// The paired HTTP and WebSocket URLs for one GraphQL endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    http: Url,
    ws: Url,
}

impl Endpoint {
    /// Build an endpoint from an `http`/`https` URL.
    pub fn new(http: Url) -> Result<Self, Error> {
        let ws_scheme = match http.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(Error::InvalidEndpoint {
                    url: http.to_string(),
                    reason: format!("expected an http or https URL, got scheme '{other}'"),
                });
            }
        };

        let mut ws = http.clone();
        ws.set_scheme(ws_scheme).map_err(|()| Error::InvalidEndpoint {
            url: http.to_string(),
            reason: format!("cannot switch scheme to {ws_scheme}"),
        })?;

        Ok(Self { http, ws })
    }

    /// Parse and validate an endpoint string.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        Self::new(Url::parse(raw)?)
    }

    /// URL for the one-shot GraphQL POST.
    pub fn http_url(&self) -> &Url {
        &self.http
    }

    /// URL for the `graphql-ws` subscription socket.
    pub fn ws_url(&self) -> &Url {
        &self.ws
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.http.as_str())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn https_maps_to_wss() {
        let ep = Endpoint::parse("https://api.fleet.example/graphql").unwrap();
        assert_eq!(ep.http_url().as_str(), "https://api.fleet.example/graphql");
        assert_eq!(ep.ws_url().as_str(), "wss://api.fleet.example/graphql");
    }

    #[test]
    fn http_maps_to_ws_and_keeps_port_and_query() {
        let ep = Endpoint::parse("http://127.0.0.1:4000/graphql?tenant=7").unwrap();
        assert_eq!(ep.ws_url().as_str(), "ws://127.0.0.1:4000/graphql?tenant=7");
    }

    #[test]
    fn other_schemes_are_rejected() {
        let err = Endpoint::parse("ftp://files.example/graphql").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }), "{err:?}");
    }

    #[test]
    fn garbage_is_an_invalid_url() {
        assert!(matches!(
            Endpoint::parse("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
