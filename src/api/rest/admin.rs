use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::auth::{self, AuthUser};
use crate::error::AppError;
use crate::models::account::{Account, Role};
use crate::models::booking::{Booking, BookingStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(stats))
        .route("/users", get(users))
        .route("/drivers", get(drivers))
        .route("/bookings", get(bookings))
        .route("/bookings/active", get(active_bookings))
        .route("/bookings/cancelled", get(cancelled_bookings))
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_riders: usize,
    pub total_drivers: usize,
    pub total_bookings: usize,
    pub active_cabs: usize,
    pub completed_bookings: usize,
    pub cancelled_bookings: usize,
}

async fn stats(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<StatsResponse>, AppError> {
    auth::require_role(&account, Role::Admin)?;

    let mut active_cabs = 0;
    let mut completed = 0;
    let mut cancelled = 0;
    for entry in state.bookings.iter() {
        match entry.status {
            BookingStatus::DriverAssigned => active_cabs += 1,
            BookingStatus::Completed => completed += 1,
            BookingStatus::Cancelled => cancelled += 1,
            _ => {}
        }
    }

    Ok(Json(StatsResponse {
        total_riders: state.riders().len(),
        total_drivers: state.all_drivers().len(),
        total_bookings: state.bookings.len(),
        active_cabs,
        completed_bookings: completed,
        cancelled_bookings: cancelled,
    }))
}

async fn users(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Account>>, AppError> {
    auth::require_role(&account, Role::Admin)?;
    Ok(Json(state.riders()))
}

async fn drivers(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Account>>, AppError> {
    auth::require_role(&account, Role::Admin)?;
    Ok(Json(state.all_drivers()))
}

async fn bookings(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    auth::require_role(&account, Role::Admin)?;

    let mut list: Vec<Booking> = state
        .bookings
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(list))
}

async fn active_bookings(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    auth::require_role(&account, Role::Admin)?;
    Ok(Json(bookings_with_status(
        &state,
        BookingStatus::DriverAssigned,
    )))
}

async fn cancelled_bookings(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    auth::require_role(&account, Role::Admin)?;
    Ok(Json(bookings_with_status(&state, BookingStatus::Cancelled)))
}

fn bookings_with_status(state: &AppState, status: BookingStatus) -> Vec<Booking> {
    state
        .bookings
        .iter()
        .filter(|entry| entry.status == status)
        .map(|entry| entry.value().clone())
        .collect()
}
