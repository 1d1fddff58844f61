//! One-shot snapshot fetch, plus the renderer shared with `watch`.

use tabled::Tabled;

use fleetwatch_core::{TripId, TripLocation, TripSnapshot};

use crate::cli::{GlobalOpts, OutputFormat, SnapshotArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LocationRow {
    #[tabled(rename = "#")]
    order: u32,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Occupied")]
    occupied: u32,
    #[tabled(rename = "Available")]
    available: u32,
    #[tabled(rename = "Pending")]
    pending: u32,
}

impl From<&TripLocation> for LocationRow {
    fn from(l: &TripLocation) -> Self {
        Self {
            order: l.order,
            role: l.role.to_string(),
            address: if l.address.is_empty() {
                "-".into()
            } else {
                l.address.clone()
            },
            status: if l.status.is_empty() {
                "-".into()
            } else {
                l.status.clone()
            },
            occupied: l.seats.occupied_seats,
            available: l.seats.available_seats,
            pending: l.seats.pending_payment_seats,
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn detail(trip_id: &str, s: &TripSnapshot) -> String {
    let c = &s.capacity;
    let t = &s.summary;
    let mut lines = vec![
        format!("Trip:      {}", s.trip_id.as_deref().unwrap_or(trip_id)),
        format!(
            "Seats:     {} available / {} total ({} occupied, {} pending payment)",
            c.available_seats, c.total_seats, c.occupied_seats, c.pending_payment_seats
        ),
        format!(
            "Tickets:   {} total, {} paid, {} pending",
            t.total_tickets, t.paid_tickets, t.pending_tickets
        ),
        format!("Drop-offs: {}", t.completed_dropoffs),
    ];
    if let Some(origin) = s.origin() {
        lines.push(format!("Origin:    {}", origin.address));
    }

    let rows: Vec<LocationRow> = s
        .locations_in_order()
        .into_iter()
        .map(LocationRow::from)
        .collect();
    if !rows.is_empty() {
        lines.push(String::new());
        lines.push(output::render_table(&rows));
    }
    lines.join("\n")
}

/// `trip_id  total  available  occupied  pending`, tab-separated.
fn plain(trip_id: &str, s: &TripSnapshot) -> String {
    let c = &s.capacity;
    format!(
        "{}\t{}\t{}\t{}\t{}",
        s.trip_id.as_deref().unwrap_or(trip_id),
        c.total_seats,
        c.available_seats,
        c.occupied_seats,
        c.pending_payment_seats
    )
}

/// Render one snapshot in the selected output format.
pub fn render(format: OutputFormat, trip_id: &str, snapshot: &TripSnapshot) -> Result<String, CliError> {
    output::render_single(
        format,
        snapshot,
        |s| detail(trip_id, s),
        |s| plain(trip_id, s),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: &SnapshotArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = config::build_subscription_config(global)?;
    let trip_id = TripId::from(args.trip_id.as_str());

    let snapshot = fleetwatch_core::fetch_snapshot(&config, &trip_id).await?;

    let out = render(global.output, trip_id.as_str(), &snapshot)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use fleetwatch_core::{LocationRole, SeatCounters, TicketSummary};

    use super::*;

    fn snapshot() -> TripSnapshot {
        TripSnapshot {
            trip_id: None,
            capacity: SeatCounters {
                total_seats: 40,
                available_seats: 28,
                occupied_seats: 10,
                pending_payment_seats: 2,
            },
            locations: vec![
                TripLocation {
                    location_id: "loc-2".into(),
                    address: "Main St 12".into(),
                    role: LocationRole::Stop,
                    order: 2,
                    status: "PENDING".into(),
                    seats: SeatCounters::default(),
                },
                TripLocation {
                    location_id: "loc-1".into(),
                    address: "Depot".into(),
                    role: LocationRole::Origin,
                    order: 1,
                    status: String::new(),
                    seats: SeatCounters::default(),
                },
            ],
            summary: TicketSummary {
                total_tickets: 12,
                paid_tickets: 10,
                pending_tickets: 2,
                completed_dropoffs: 0,
            },
        }
    }

    #[test]
    fn plain_falls_back_to_requested_trip_id() {
        let out = render(OutputFormat::Plain, "trip-42", &snapshot()).unwrap();
        assert_eq!(out, "trip-42\t40\t28\t10\t2");
    }

    #[test]
    fn table_lists_locations_in_order() {
        let out = render(OutputFormat::Table, "trip-42", &snapshot()).unwrap();
        assert!(out.contains("Origin:    Depot"));
        let (_, table) = out.split_once("\n\n").unwrap();
        let depot = table.find("Depot").unwrap();
        let main = table.find("Main St 12").unwrap();
        assert!(depot < main, "origin row should come first:\n{out}");
        assert!(out.contains("ORIGIN"));
    }

    #[test]
    fn json_uses_wire_field_names() {
        let out = render(OutputFormat::JsonCompact, "trip-42", &snapshot()).unwrap();
        assert!(out.contains(r#""pendingPaymentSeats":2"#));
        assert!(!out.contains("tripId"));
    }
}
