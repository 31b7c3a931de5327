use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::account::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CabType {
    Economy,
    Basic,
    Premium,
}

impl CabType {
    pub fn as_str(self) -> &'static str {
        match self {
            CabType::Economy => "economy",
            CabType::Basic => "basic",
            CabType::Premium => "premium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    DriverAssigned,
    OnTheWay,
    PickedUp,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::DriverAssigned => "driver_assigned",
            BookingStatus::OnTheWay => "on_the_way",
            BookingStatus::PickedUp => "picked_up",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }

    /// Terminal states accept no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end of a trip: a coordinate plus the free-text address the rider
/// typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripPoint {
    pub location: GeoPoint,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub rider: Uuid,
    pub driver: Option<Uuid>,
    pub pickup: TripPoint,
    pub dropoff: TripPoint,
    pub cab_type: CabType,
    pub distance_km: f64,
    pub fare: f64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::BookingStatus;

    #[test]
    fn statuses_serialize_to_wire_names() {
        let json = serde_json::to_string(&BookingStatus::DriverAssigned).unwrap();
        assert_eq!(json, "\"driver_assigned\"");

        let parsed: BookingStatus = serde_json::from_str("\"on_the_way\"").unwrap();
        assert_eq!(parsed, BookingStatus::OnTheWay);
    }

    #[test]
    fn only_completed_cancelled_rejected_are_terminal() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::Rejected.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::InProgress.is_terminal());
    }
}
