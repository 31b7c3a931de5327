use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::state::AppState;

/// Reason stored when a driver declines a pending request.
const REJECTION_REASON: &str = "Rejected by driver";

/// Legal lifecycle edges. Anything else is a conflict.
pub fn legal_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;

    match from {
        Pending => matches!(to, DriverAssigned | OnTheWay | Rejected | Cancelled),
        DriverAssigned => matches!(to, OnTheWay | Cancelled),
        OnTheWay => matches!(to, PickedUp | Cancelled),
        PickedUp => matches!(to, InProgress | Cancelled),
        InProgress => matches!(to, Completed | Cancelled),
        Completed | Cancelled | Rejected => false,
    }
}

/// Applies a status transition requested by the booking's driver.
///
/// The booking write and the driver release are two independent store
/// writes with no rollback between them.
pub fn update_status(
    state: &AppState,
    booking_id: Uuid,
    driver_id: Uuid,
    new_status: BookingStatus,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let updated = {
        let mut booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

        if booking.driver != Some(driver_id) {
            return Err(AppError::Forbidden(
                "not authorized to update this booking".to_string(),
            ));
        }

        if !legal_transition(booking.status, new_status) {
            return Err(AppError::Conflict(format!(
                "cannot move booking from {} to {}",
                booking.status, new_status
            )));
        }

        booking.status = new_status;
        match new_status {
            BookingStatus::Completed => {
                booking.completed_at = Some(Utc::now());
            }
            BookingStatus::Cancelled => {
                booking.cancelled_at = Some(Utc::now());
                booking.cancellation_reason = reason;
            }
            _ => {}
        }

        booking.clone()
    };

    if matches!(
        new_status,
        BookingStatus::Completed | BookingStatus::Cancelled
    ) {
        release_driver(state, driver_id);
    }

    state
        .metrics
        .status_transitions_total
        .with_label_values(&[new_status.as_str()])
        .inc();
    info!(
        booking_id = %booking_id,
        driver_id = %driver_id,
        status = %new_status,
        "booking status updated"
    );

    Ok(updated)
}

/// A driver takes an unassigned ride request. The entry lock on the
/// booking serializes concurrent accepts; the loser sees a non-pending
/// status and gets a conflict.
pub fn accept_request(
    state: &AppState,
    booking_id: Uuid,
    driver_id: Uuid,
) -> Result<Booking, AppError> {
    let updated = {
        let mut booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

        if booking.status != BookingStatus::Pending {
            return Err(AppError::Conflict(
                "this ride has already been accepted or is no longer available".to_string(),
            ));
        }

        booking.driver = Some(driver_id);
        booking.status = BookingStatus::OnTheWay;
        booking.clone()
    };

    if let Some(mut driver) = state.accounts.get_mut(&driver_id) {
        driver.is_available = false;
        driver.current_booking = Some(booking_id);
    }
    state.recount_available_drivers();

    state
        .metrics
        .status_transitions_total
        .with_label_values(&[BookingStatus::OnTheWay.as_str()])
        .inc();
    info!(booking_id = %booking_id, driver_id = %driver_id, "ride request accepted");

    Ok(updated)
}

/// A driver declines an unassigned ride request. Driver state is never
/// touched; the request was never theirs.
pub fn reject_request(
    state: &AppState,
    booking_id: Uuid,
    driver_id: Uuid,
) -> Result<Booking, AppError> {
    let updated = {
        let mut booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

        if booking.status != BookingStatus::Pending {
            return Err(AppError::Conflict(
                "this ride has already been accepted or is no longer available".to_string(),
            ));
        }

        booking.status = BookingStatus::Rejected;
        booking.cancelled_at = Some(Utc::now());
        booking.cancellation_reason = Some(REJECTION_REASON.to_string());
        booking.clone()
    };

    state
        .metrics
        .status_transitions_total
        .with_label_values(&[BookingStatus::Rejected.as_str()])
        .inc();
    info!(booking_id = %booking_id, driver_id = %driver_id, "ride request rejected");

    Ok(updated)
}

/// Returns a driver to the pool after a terminal transition.
pub fn release_driver(state: &AppState, driver_id: Uuid) {
    if let Some(mut driver) = state.accounts.get_mut(&driver_id) {
        driver.is_available = true;
        driver.current_booking = None;
    }
    state.recount_available_drivers();
}

#[cfg(test)]
mod tests {
    use super::legal_transition;
    use crate::models::booking::BookingStatus::*;

    #[test]
    fn forward_path_is_legal() {
        assert!(legal_transition(Pending, DriverAssigned));
        assert!(legal_transition(DriverAssigned, OnTheWay));
        assert!(legal_transition(OnTheWay, PickedUp));
        assert!(legal_transition(PickedUp, InProgress));
        assert!(legal_transition(InProgress, Completed));
    }

    #[test]
    fn accept_edge_skips_driver_assigned() {
        assert!(legal_transition(Pending, OnTheWay));
    }

    #[test]
    fn cancel_is_reachable_from_every_live_state() {
        for from in [Pending, DriverAssigned, OnTheWay, PickedUp, InProgress] {
            assert!(legal_transition(from, Cancelled), "{from} should cancel");
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for from in [Completed, Cancelled, Rejected] {
            for to in [
                Pending,
                DriverAssigned,
                OnTheWay,
                PickedUp,
                InProgress,
                Completed,
                Cancelled,
                Rejected,
            ] {
                assert!(!legal_transition(from, to), "{from} -> {to} must fail");
            }
        }
    }

    #[test]
    fn skipping_forward_is_illegal() {
        assert!(!legal_transition(DriverAssigned, PickedUp));
        assert!(!legal_transition(OnTheWay, InProgress));
        assert!(!legal_transition(DriverAssigned, Completed));
    }

    #[test]
    fn rejection_only_leaves_pending() {
        assert!(legal_transition(Pending, Rejected));
        assert!(!legal_transition(DriverAssigned, Rejected));
        assert!(!legal_transition(InProgress, Rejected));
    }
}
