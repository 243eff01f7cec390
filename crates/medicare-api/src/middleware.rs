use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use medicare_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate the JWT from the Authorization header, then check
/// that its session has not been logged out.
pub async fn require_auth(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(TypedHeader(Authorization(bearer))) = auth else {
        return Err(ApiError::Unauthorized);
    };

    let claims = decode_token(&state.jwt_secret, bearer.token())?;

    let jti = claims.jti.to_string();
    let session = state.with_db(move |db| db.get_session(&jti)).await?;
    match session {
        Some(session) if session.revoked_at.is_none() => {}
        _ => {
            debug!("Rejecting token for revoked or unknown session {}", claims.jti);
            return Err(ApiError::Unauthorized);
        }
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}
