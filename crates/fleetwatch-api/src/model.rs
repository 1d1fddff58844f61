// ── Trip snapshot wire model ──
//
// Shapes returned by both `getTripSnapshot` and the `tripSnapshot`
// subscription. Counters default to zero when the server omits them or
// sends `null`.

use serde::{Deserialize, Deserializer, Serialize};

/// GraphQL nullable fields: `null` reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Seat counters, used for the whole trip and for each location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatCounters {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_seats: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub available_seats: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub occupied_seats: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pending_payment_seats: u32,
}

/// Whether a location is where the trip starts or an intermediate stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationRole {
    Origin,
    Stop,
}

/// One location along the trip, with its own booking counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripLocation {
    pub location_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    pub role: LocationRole,
    pub order: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(flatten)]
    pub seats: SeatCounters,
}

/// Ticket totals for the trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_tickets: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub paid_tickets: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pending_tickets: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_dropoffs: u32,
}

/// Full current state of a trip's capacity and per-location booking status.
///
/// Every server message carries a complete snapshot; consumers replace
/// their copy wholesale and never merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub capacity: SeatCounters,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<TripLocation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: TicketSummary,
}

impl TripSnapshot {
    /// Locations sorted by their `order` field.
    pub fn locations_in_order(&self) -> Vec<&TripLocation> {
        let mut locations: Vec<&TripLocation> = self.locations.iter().collect();
        locations.sort_by_key(|l| l.order);
        locations
    }

    /// The location marked as the trip origin, if any.
    pub fn origin(&self) -> Option<&TripLocation> {
        self.locations
            .iter()
            .find(|l| l.role == LocationRole::Origin)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn deserialize_full_snapshot() {
        let raw = json!({
            "tripId": "trip-42",
            "capacity": {
                "totalSeats": 40,
                "availableSeats": 28,
                "occupiedSeats": 10,
                "pendingPaymentSeats": 2
            },
            "locations": [
                {
                    "locationId": "loc-2",
                    "address": "Main St 12",
                    "role": "STOP",
                    "order": 2,
                    "status": "PENDING",
                    "totalSeats": 40,
                    "occupiedSeats": 4
                },
                {
                    "locationId": "loc-1",
                    "address": "Central Station",
                    "role": "ORIGIN",
                    "order": 1,
                    "status": "DEPARTED",
                    "totalSeats": 40,
                    "occupiedSeats": 10
                }
            ],
            "summary": {
                "totalTickets": 12,
                "paidTickets": 10,
                "pendingTickets": 2,
                "completedDropoffs": 0
            }
        });

        let snap: TripSnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snap.trip_id.as_deref(), Some("trip-42"));
        assert_eq!(snap.capacity.total_seats, 40);
        assert_eq!(snap.capacity.pending_payment_seats, 2);
        assert_eq!(snap.summary.paid_tickets, 10);

        let ordered: Vec<&str> = snap
            .locations_in_order()
            .iter()
            .map(|l| l.location_id.as_str())
            .collect();
        assert_eq!(ordered, vec!["loc-1", "loc-2"]);
        assert_eq!(snap.origin().unwrap().address, "Central Station");
        assert_eq!(snap.locations[0].seats.occupied_seats, 4);
        assert_eq!(snap.locations[0].seats.available_seats, 0);
    }

    #[test]
    fn partial_capacity_defaults_to_zero() {
        let snap: TripSnapshot =
            serde_json::from_value(json!({ "capacity": { "totalSeats": 40, "occupiedSeats": 10 } }))
                .unwrap();
        assert_eq!(
            snap.capacity,
            SeatCounters {
                total_seats: 40,
                available_seats: 0,
                occupied_seats: 10,
                pending_payment_seats: 0,
            }
        );
        assert!(snap.locations.is_empty());
        assert_eq!(snap.summary, TicketSummary::default());
    }

    #[test]
    fn null_fields_read_as_defaults() {
        let raw = json!({
            "tripId": null,
            "capacity": { "totalSeats": 40, "availableSeats": null, "occupiedSeats": 15 },
            "locations": [{
                "locationId": "loc-1",
                "address": null,
                "role": "ORIGIN",
                "order": 0,
                "status": null,
                "totalSeats": 40,
                "pendingPaymentSeats": null
            }],
            "summary": null
        });

        let snap: TripSnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snap.trip_id, None);
        assert_eq!(snap.capacity.occupied_seats, 15);
        assert_eq!(snap.capacity.available_seats, 0);
        assert_eq!(snap.locations[0].address, "");
        assert_eq!(snap.locations[0].status, "");
        assert_eq!(snap.locations[0].seats.total_seats, 40);
        assert_eq!(snap.summary, TicketSummary::default());

        let empty: TripSnapshot =
            serde_json::from_value(json!({ "capacity": null, "locations": null })).unwrap();
        assert_eq!(empty, TripSnapshot::default());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let raw = json!({
            "locations": [{ "locationId": "x", "role": "DEPOT", "order": 1 }]
        });
        assert!(serde_json::from_value::<TripSnapshot>(raw).is_err());
    }

    #[test]
    fn role_displays_like_the_wire() {
        assert_eq!(LocationRole::Origin.to_string(), "ORIGIN");
        assert_eq!(LocationRole::Stop.to_string(), "STOP");
    }
}
