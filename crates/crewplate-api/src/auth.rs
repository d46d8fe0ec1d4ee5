use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crewplate_core::accounts::Accounts;
use crewplate_core::blob::DiskBlobStore;
use crewplate_core::retry::RetryPolicy;
use crewplate_db::Database;
use crewplate_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, UpdateProfileRequest,
};

use crate::blocking::{run_blocking, run_mutation};
use crate::error::ApiError;

const TOKEN_TTL_DAYS: i64 = 30;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub blobs: DiskBlobStore,
    /// Upper bound on any single store call made by a handler.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_upload_bytes: usize,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_mutation(&state, move |db| {
        Accounts::new(db).register(&req.email, &req.password, &req.display_name)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.display_name)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_blocking(&state, move |db| {
        Accounts::new(db).authenticate(&req.email, &req.password)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.display_name)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        display_name: user.display_name,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_blocking(&state, move |db| Accounts::new(db).profile(claims.sub)).await?;
    Ok(Json(user))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_mutation(&state, move |db| {
        Accounts::new(db).update_profile(
            claims.sub,
            req.display_name.as_deref(),
            req.icon.as_deref(),
        )
    })
    .await?;
    Ok(Json(user))
}

pub fn create_token(secret: &str, user_id: Uuid, display_name: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        display_name: display_name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
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
