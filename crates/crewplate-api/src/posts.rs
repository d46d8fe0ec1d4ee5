use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crewplate_core::notifications::NotificationChannel;
use crewplate_core::posts::{self, PostCatalog};
use crewplate_types::api::{Claims, CreatePostRequest};
use crewplate_types::models::NewPost;

use crate::auth::AppState;
use crate::blocking::{run_blocking, run_mutation};
use crate::error::ApiError;

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_post = NewPost::from(req);
    let post = run_mutation(&state, move |db| {
        PostCatalog::new(db).create_post(claims.sub, new_post.clone())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn options() -> impl IntoResponse {
    Json(posts::options())
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let post = run_blocking(&state, move |db| {
        PostCatalog::new(db).get_post(claims.sub, post_id)
    })
    .await?;
    Ok(Json(post))
}

/// Every call is a new poke, so this is never retried.
pub async fn poke(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let poke = run_blocking(&state, move |db| {
        NotificationChannel::new(db).poke(post_id, claims.sub)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(poke)))
}
