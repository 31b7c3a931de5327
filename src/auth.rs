use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::account::{Account, Role};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

/// HS256 signing material plus the token lifetime.
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AuthKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn sign(&self, account_id: Uuid) -> Result<String, AppError> {
        let claims = Claims {
            sub: account_id,
            exp: (Utc::now() + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AppError::Internal(format!("failed to sign token: {err}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("invalid or expired token".to_string()))
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|err| AppError::Internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Resolves a bearer token to the live account behind it. A token for a
/// deleted account is treated the same as a bad token.
pub fn account_for_token(state: &AppState, token: &str) -> Result<Account, AppError> {
    let claims = state.auth.verify(token)?;

    state
        .accounts
        .get(&claims.sub)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))
}

pub fn require_role(account: &Account, role: Role) -> Result<(), AppError> {
    if account.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role {} is not authorized for this resource",
            account.role.as_str()
        )))
    }
}

/// Extractor for authenticated routes.
pub struct AuthUser(pub Account);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let account = account_for_token(state, token)?;
        Ok(AuthUser(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrips_the_subject() {
        let keys = AuthKeys::new("test-secret", 1);
        let account_id = Uuid::new_v4();

        let token = keys.sign(account_id).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, account_id);
    }

    #[test]
    fn verify_rejects_a_token_signed_with_another_secret() {
        let keys = AuthKeys::new("test-secret", 1);
        let other = AuthKeys::new("other-secret", 1);

        let token = other.sign(Uuid::new_v4()).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn password_verification_matches_only_the_original() {
        let hash = hash_password("correct horse").unwrap();

        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }
}
