use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crewplate_core::feed::FeedAggregator;
use crewplate_types::api::{Claims, FeedQuery};

use crate::auth::AppState;
use crate::blocking::run_blocking;
use crate::error::ApiError;

/// Latest window only; there is no cursor for older posts.
pub async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let page = run_blocking(&state, move |db| {
        FeedAggregator::new(db).get_feed(claims.sub, query.limit)
    })
    .await?;
    Ok(Json(page))
}
