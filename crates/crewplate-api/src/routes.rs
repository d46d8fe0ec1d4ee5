use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{blobs, crews, feed, notifications, posts};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/blobs/{*key}", get(blobs::download));

    let protected_routes = Router::new()
        .route("/me", get(auth::me).patch(auth::update_me))
        .route("/crews", post(crews::create_crew).get(crews::list_crews))
        .route("/crews/join", post(crews::join_crew))
        .route("/crews/{crew_id}", get(crews::get_crew))
        .route("/crews/{crew_id}/members", get(crews::list_members))
        .route("/crews/{crew_id}/members/{member_id}", delete(crews::kick_member))
        .route("/crews/{crew_id}/leave", post(crews::leave_crew))
        .route("/posts", post(posts::create_post))
        .route("/posts/options", get(posts::options))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/posts/{post_id}/pokes", post(posts::poke))
        .route("/feed", get(feed::get_feed))
        .route(
            "/notifications",
            get(notifications::list_notifications).delete(notifications::clear_notifications),
        )
        .route(
            "/uploads/{*key}",
            put(blobs::upload).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
