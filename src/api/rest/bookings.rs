use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, AuthUser};
use crate::engine::{assignment, fare, lifecycle};
use crate::error::AppError;
use crate::models::account::{Account, Role};
use crate::models::booking::{Booking, BookingStatus, CabType, TripPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_booking))
        .route("/request", post(create_ride_request))
        .route("/find-driver", post(find_driver))
        .route("/user-bookings", get(user_bookings))
        .route("/driver-requests", get(driver_requests))
        .route("/driver-bookings", get(driver_bookings))
        .route("/driver-active", get(driver_active))
        .route("/driver-earnings", get(driver_earnings))
        .route("/:id/accept", put(accept_request))
        .route("/:id/reject", put(reject_request))
        .route("/:id/status", put(update_status))
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub pickup: TripPoint,
    pub dropoff: TripPoint,
    pub cab_type: CabType,
    pub distance_km: f64,
}

#[derive(Serialize)]
pub struct CreateBookingResponse {
    pub booking: Booking,
    pub driver: Account,
}

/// Booking creation with synchronous assignment: the driver is claimed
/// before the booking record exists, so a failed claim leaves nothing
/// behind.
async fn create_booking(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    auth::require_role(&account, Role::Rider)?;
    validate_trip(&payload)?;

    let booking_id = Uuid::new_v4();
    let driver = match assignment::select_and_claim(&state, booking_id) {
        Ok(driver) => driver,
        Err(err) => {
            if matches!(err, AppError::NoDriversRegistered) {
                state
                    .metrics
                    .assignments_total
                    .with_label_values(&["no_drivers"])
                    .inc();
            }
            return Err(err);
        }
    };

    let booking = Booking {
        id: booking_id,
        rider: account.id,
        driver: Some(driver.id),
        pickup: payload.pickup,
        dropoff: payload.dropoff,
        cab_type: payload.cab_type,
        distance_km: payload.distance_km,
        fare: fare::compute_fare(payload.distance_km, payload.cab_type),
        status: BookingStatus::DriverAssigned,
        created_at: Utc::now(),
        completed_at: None,
        cancelled_at: None,
        cancellation_reason: None,
    };
    state.bookings.insert(booking.id, booking.clone());

    state
        .metrics
        .bookings_created_total
        .with_label_values(&[booking.cab_type.as_str()])
        .inc();
    state
        .metrics
        .assignments_total
        .with_label_values(&["success"])
        .inc();
    info!(
        booking_id = %booking.id,
        driver_id = %driver.id,
        fare = booking.fare,
        "booking created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse { booking, driver }),
    ))
}

/// The unassigned entry point: the request sits in `pending` until a
/// driver accepts or rejects it.
async fn create_ride_request(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    auth::require_role(&account, Role::Rider)?;
    validate_trip(&payload)?;

    let booking = Booking {
        id: Uuid::new_v4(),
        rider: account.id,
        driver: None,
        pickup: payload.pickup,
        dropoff: payload.dropoff,
        cab_type: payload.cab_type,
        distance_km: payload.distance_km,
        fare: fare::compute_fare(payload.distance_km, payload.cab_type),
        status: BookingStatus::Pending,
        created_at: Utc::now(),
        completed_at: None,
        cancelled_at: None,
        cancellation_reason: None,
    };
    state.bookings.insert(booking.id, booking.clone());

    state
        .metrics
        .bookings_created_total
        .with_label_values(&[booking.cab_type.as_str()])
        .inc();
    info!(booking_id = %booking.id, fare = booking.fare, "ride request created");

    Ok((StatusCode::CREATED, Json(booking)))
}

async fn find_driver(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Account>, AppError> {
    auth::require_role(&account, Role::Rider)?;
    let driver = assignment::discover_driver(&state)?;
    Ok(Json(driver))
}

async fn user_bookings(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    auth::require_role(&account, Role::Rider)?;
    Ok(Json(state.bookings_for_rider(account.id)))
}

async fn driver_requests(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    auth::require_role(&account, Role::Driver)?;
    Ok(Json(state.pending_requests()))
}

async fn driver_bookings(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    auth::require_role(&account, Role::Driver)?;
    Ok(Json(state.bookings_for_driver(account.id)))
}

async fn driver_active(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Option<Booking>>, AppError> {
    auth::require_role(&account, Role::Driver)?;
    Ok(Json(state.active_booking_for_driver(account.id)))
}

#[derive(Serialize)]
pub struct EarningsResponse {
    pub total_earnings: f64,
    pub total_rides: usize,
    pub average_fare: f64,
}

async fn driver_earnings(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<EarningsResponse>, AppError> {
    auth::require_role(&account, Role::Driver)?;

    let completed: Vec<Booking> = state
        .bookings_for_driver(account.id)
        .into_iter()
        .filter(|booking| booking.status == BookingStatus::Completed)
        .collect();

    let total_earnings: f64 = completed.iter().map(|booking| booking.fare).sum();
    let total_rides = completed.len();
    let average_fare = if total_rides > 0 {
        total_earnings / total_rides as f64
    } else {
        0.0
    };

    Ok(Json(EarningsResponse {
        total_earnings,
        total_rides,
        average_fare,
    }))
}

async fn accept_request(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    auth::require_role(&account, Role::Driver)?;
    let booking = lifecycle::accept_request(&state, id, account.id)?;
    Ok(Json(booking))
}

async fn reject_request(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    auth::require_role(&account, Role::Driver)?;
    let booking = lifecycle::reject_request(&state, id, account.id)?;
    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    auth::require_role(&account, Role::Driver)?;
    let booking = lifecycle::update_status(
        &state,
        id,
        account.id,
        payload.status,
        payload.cancellation_reason,
    )?;
    Ok(Json(booking))
}

fn validate_trip(payload: &CreateBookingRequest) -> Result<(), AppError> {
    if payload.pickup.address.trim().is_empty() {
        return Err(AppError::Validation(
            "pickup address is required".to_string(),
        ));
    }
    if payload.dropoff.address.trim().is_empty() {
        return Err(AppError::Validation(
            "dropoff address is required".to_string(),
        ));
    }
    if !payload.pickup.location.is_valid() || !payload.dropoff.location.is_valid() {
        return Err(AppError::Validation(
            "malformed trip coordinates".to_string(),
        ));
    }
    if !payload.distance_km.is_finite() || payload.distance_km <= 0.0 {
        return Err(AppError::Validation(
            "distance must be a positive number of kilometers".to_string(),
        ));
    }
    Ok(())
}
