use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use medicare_types::api::{AuthResponse, Claims, LoginRequest, SessionResponse, SignupRequest};
use medicare_types::models::{Role, User};
use medicare_types::validate::{self, normalize_email};

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, AppStateInner};

const SESSION_LIFETIME_DAYS: i64 = 30;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::signup(&req)?;

    let user = create_account(&state, &req.email, &req.password, &req.username, req.role, None).await?;
    info!("New {} account {} ({})", user.role, user.email, user.id);

    let (token, expires_at) = issue_session(&state, &user).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            token,
            expires_at,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::login(&req)?;

    let email = normalize_email(&req.email);
    let row = state
        .with_db(move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&row.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {}", e)))?;
    Argon2::default()
        .verify_password(req.password.trim().as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user = convert::user(row)?;
    let (token, expires_at) = issue_session(&state, &user).await?;

    Ok(Json(AuthResponse {
        user,
        token,
        expires_at,
    }))
}

/// Revoke the session behind the caller's token. Always 204: logging out
/// twice is not an error.
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let jti = claims.jti.to_string();
    if state.with_db(move |db| db.revoke_session(&jti)).await? {
        info!("{} logged out", claims.email);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let row = state
        .with_db(move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).unwrap_or_else(Utc::now);
    Ok(Json(SessionResponse {
        user: convert::user(row)?,
        expires_at,
    }))
}

/// Hash the password and insert the user. Shared by signup and by caretakers
/// adding a patient.
pub(crate) async fn create_account(
    state: &AppStateInner,
    email: &str,
    password: &str,
    username: &str,
    role: Role,
    caretaker_id: Option<Uuid>,
) -> Result<User, ApiError> {
    let email = normalize_email(email);
    let username = username.trim().to_string();

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.trim().as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    let id = Uuid::new_v4().to_string();
    let row = state
        .with_db(move |db| {
            let caretaker = caretaker_id.map(|c| c.to_string());
            if !db.create_user(&id, &email, &username, &password_hash, role.as_str(), caretaker.as_deref())? {
                return Ok(None);
            }
            db.get_user_by_id(&id)
        })
        .await?
        .ok_or(ApiError::Conflict("An account with this email already exists."))?;

    Ok(convert::user(row)?)
}

async fn issue_session(state: &AppStateInner, user: &User) -> Result<(String, DateTime<Utc>), ApiError> {
    let session_id = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);

    let sid = session_id.to_string();
    let uid = user.id.to_string();
    let expires = expires_at.to_rfc3339();
    state
        .with_db(move |db| db.create_session(&sid, &uid, &expires))
        .await?;

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        jti: session_id,
        exp: expires_at.timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok((token, expires_at))
}
