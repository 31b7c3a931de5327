use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::auth::is_valid_phone;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::account::Account;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/profile", get(profile).put(update_profile))
}

async fn profile(AuthUser(account): AuthUser) -> Json<Account> {
    Json(account)
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Account>, AppError> {
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
    }
    if let Some(phone) = &payload.phone_number {
        if !is_valid_phone(phone) {
            return Err(AppError::Validation(
                "phone number must be 10 digits".to_string(),
            ));
        }
        if phone != &account.phone_number && state.phone_in_use(phone) {
            return Err(AppError::Validation(
                "phone number already registered".to_string(),
            ));
        }
    }

    let updated = {
        let mut entry = state
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| AppError::NotFound("account not found".to_string()))?;

        if let Some(name) = payload.name {
            entry.name = name.trim().to_string();
        }
        if let Some(phone) = payload.phone_number {
            entry.phone_number = phone;
        }
        entry.clone()
    };

    Ok(Json(updated))
}
