// ── Subscription target ──

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque trip identifier scoping one subscription.
///
/// Cheap to clone; the session, the cache and the consumer all hold copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(Arc<str>);

impl TripId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TripId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TripId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl AsRef<str> for TripId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_equality() {
        let a = TripId::from("trip-42");
        let b = TripId::from(String::from("trip-42"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "trip-42");
        assert_eq!(a.as_str(), "trip-42");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = TripId::from("trip-7");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"trip-7\""));
    }
}
