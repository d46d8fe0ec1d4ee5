use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};

use crewplate_core::notifications::NotificationChannel;
use crewplate_types::api::{Claims, ClearNotificationsResponse};

use crate::auth::AppState;
use crate::blocking::{run_blocking, run_mutation};
use crate::error::ApiError;

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = run_blocking(&state, move |db| {
        NotificationChannel::new(db).list_notifications(claims.sub)
    })
    .await?;
    Ok(Json(notifications))
}

pub async fn clear_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let cleared = run_mutation(&state, move |db| {
        NotificationChannel::new(db).clear_all(claims.sub)
    })
    .await?;
    Ok(Json(ClearNotificationsResponse { cleared }))
}
