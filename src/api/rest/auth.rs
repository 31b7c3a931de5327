use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{self, AuthUser};
use crate::error::AppError;
use crate::models::account::{Account, GeoPoint, Role, Vehicle};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

fn default_role() -> Role {
    Role::Rider
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Account,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::Validation("invalid email address".to_string()));
    }
    if state.email_in_use(&email) {
        return Err(AppError::Validation("email already registered".to_string()));
    }

    if !is_valid_phone(&payload.phone_number) {
        return Err(AppError::Validation(
            "phone number must be 10 digits".to_string(),
        ));
    }
    if state.phone_in_use(&payload.phone_number) {
        return Err(AppError::Validation(
            "phone number already registered".to_string(),
        ));
    }

    if payload.password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let vehicle = match payload.role {
        Role::Driver => {
            let vehicle = payload.vehicle.ok_or_else(|| {
                AppError::Validation(
                    "vehicle details are required for driver registration".to_string(),
                )
            })?;
            if vehicle.model.trim().is_empty()
                || vehicle.plate.trim().is_empty()
                || vehicle.color.trim().is_empty()
            {
                return Err(AppError::Validation(
                    "vehicle details are required for driver registration".to_string(),
                ));
            }
            if state.plate_in_use(&vehicle.plate) {
                return Err(AppError::Validation(
                    "this vehicle number is already registered".to_string(),
                ));
            }
            Some(vehicle)
        }
        _ => None,
    };

    // an unusable location falls back to the default, same as the rest
    // of the driver defaults
    let location = match payload.location {
        Some(point) if point.is_valid() => point,
        _ => GeoPoint::FALLBACK,
    };

    let account = Account {
        id: Uuid::new_v4(),
        name,
        email,
        phone_number: payload.phone_number,
        password_hash: auth::hash_password(&payload.password)?,
        role: payload.role,
        vehicle,
        location,
        is_available: true,
        rating: 4.0,
        current_booking: None,
        created_at: Utc::now(),
    };

    state.accounts.insert(account.id, account.clone());
    state.recount_available_drivers();

    let token = state.auth.sign(account.id)?;
    info!(account_id = %account.id, role = account.role.as_str(), "account registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: account,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();

    let account = state
        .find_account_by_email(&email)
        .ok_or_else(|| AppError::Unauthorized("invalid email or password".to_string()))?;

    if !auth::verify_password(&payload.password, &account.password_hash) {
        return Err(AppError::Unauthorized(
            "invalid email or password".to_string(),
        ));
    }

    let token = state.auth.sign(account.id)?;
    info!(account_id = %account.id, "login successful");

    Ok(Json(AuthResponse {
        token,
        user: account,
    }))
}

async fn me(AuthUser(account): AuthUser) -> Json<Account> {
    Json(account)
}

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())
}
