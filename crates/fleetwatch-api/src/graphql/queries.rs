//! Operation documents for the trip-snapshot API.
//!
//! The query and the subscription select the same fields so that both
//! deserialize into [`TripSnapshot`](crate::model::TripSnapshot).

/// One-shot fetch used before the socket handshake completes.
pub const TRIP_SNAPSHOT_QUERY: &str = r"query GetTripSnapshot($tripId: ID!) {
  getTripSnapshot(tripId: $tripId) {
    tripId
    capacity { totalSeats availableSeats occupiedSeats pendingPaymentSeats }
    locations {
      locationId
      address
      role
      order
      status
      totalSeats
      availableSeats
      occupiedSeats
      pendingPaymentSeats
    }
    summary { totalTickets paidTickets pendingTickets completedDropoffs }
  }
}";

/// Live subscription; each `data` frame carries a full snapshot.
pub const TRIP_SNAPSHOT_SUBSCRIPTION: &str = r"subscription TripSnapshot($tripId: ID!) {
  tripSnapshot(tripId: $tripId) {
    tripId
    capacity { totalSeats availableSeats occupiedSeats pendingPaymentSeats }
    locations {
      locationId
      address
      role
      order
      status
      totalSeats
      availableSeats
      occupiedSeats
      pendingPaymentSeats
    }
    summary { totalTickets paidTickets pendingTickets completedDropoffs }
  }
}";
