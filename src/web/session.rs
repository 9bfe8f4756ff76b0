use crate::db;
use crate::domain::models::UserRole;
use crate::error::{ServiceError, ServiceResult};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub role: UserRole,
    pub expires_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

/// Session tokens are `base64(user_id|ROLE|expiry).base64(hmac)`. They are
/// minted by the login service; this crate only verifies them.
pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    let decode = |part: &str| general_purpose::STANDARD.decode(part).map_err(|_| SessionError::Invalid);
    let payload = decode(payload_b64)?;
    let signature = decode(sig_b64)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload);
    mac.verify_slice(&signature).map_err(|_| SessionError::Signature)?;

    let claims = parse_claims(&payload)?;
    if Utc::now().timestamp() > claims.expires_at {
        return Err(SessionError::Expired);
    }
    Ok(claims)
}

fn parse_claims(payload: &[u8]) -> Result<SessionClaims, SessionError> {
    let payload = std::str::from_utf8(payload).map_err(|_| SessionError::Invalid)?;
    let mut fields = payload.splitn(3, '|');
    let (Some(user_id), Some(role), Some(expires_at)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(SessionError::Invalid);
    };
    Ok(SessionClaims {
        user_id: Uuid::parse_str(user_id).map_err(|_| SessionError::Invalid)?,
        role: UserRole::parse(role).ok_or(SessionError::Role)?,
        expires_at: expires_at.parse().map_err(|_| SessionError::Invalid)?,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

/// Bearer header wins over the `session` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers)
        .or_else(|| cookie_value(headers, SESSION_COOKIE))
        .map(str::to_string)
}

/// Authenticated caller. The role comes from the user row, not the token, so
/// role changes apply immediately.
#[derive(Debug, Clone, Copy)]
pub struct UserSession {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl UserSession {
    pub fn require_role(&self, allowed: &[UserRole]) -> ServiceResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!("User {} with role {} denied", self.user_id, self.role.as_str());
            Err(ServiceError::Forbidden)
        }
    }
}

pub const STAFF: &[UserRole] = &[UserRole::Admin, UserRole::TeachingAssistant];
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = crate::state::SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(ServiceError::Unauthorized)?;

        let claims = verify_session(&token, &shared_state.session_key).map_err(|e| {
            tracing::warn!("Session verification failed: {}", e);
            ServiceError::Unauthorized
        })?;

        let user = db::find_user_by_id(&shared_state.pool, claims.user_id)
            .await
            .map_err(|e| e.context("user lookup for session"))?;

        let Some(user) = user else {
            return Err(ServiceError::Unauthorized);
        };

        if !user.is_active {
            tracing::warn!("Session for deactivated user {}", user.id);
            return Err(ServiceError::Unauthorized);
        }
        if claims.role != user.role {
            tracing::debug!(
                "Session for user {} was issued as {} (valid until {}), now {}",
                user.id,
                claims.role.as_str(),
                claims.expires_at,
                user.role.as_str()
            );
        }

        Ok(UserSession {
            user_id: user.id,
            role: user.role,
        })
    }
}
