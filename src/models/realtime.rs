use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::account::GeoPoint;
use crate::models::booking::BookingStatus;

/// Event fanned out to the members of a booking room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RoomEvent {
    DriverLocation {
        booking_id: Uuid,
        coordinates: GeoPoint,
    },
    BookingStatus {
        booking_id: Uuid,
        status: BookingStatus,
    },
}

/// Envelope carried on a room's broadcast channel. The sender id lets
/// receivers skip their own messages.
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub sender: Uuid,
    pub event: RoomEvent,
}
