use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Crew, ImageRef, KickOutcome, LeaveOutcome, NewPost, Tags};

// -- JWT Claims --

/// Bearer token claims. Canonical definition lives here so the API middleware
/// and any client decoding tokens agree on the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub display_name: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub icon: Option<String>,
}

// -- Crews --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCrewRequest {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinCrewRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct JoinCrewResponse {
    pub crew: Crew,
    pub already_member: bool,
}

#[derive(Debug, Serialize)]
pub struct LeaveCrewResponse {
    pub outcome: LeaveOutcome,
}

#[derive(Debug, Serialize)]
pub struct KickMemberResponse {
    pub outcome: KickOutcome,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub image_ref: Option<ImageRef>,
    pub cook_for: String,
    pub cost: String,
    pub time_estimate: String,
    pub meal: String,
    #[serde(default)]
    pub tags: Tags,
}

impl From<CreatePostRequest> for NewPost {
    fn from(req: CreatePostRequest) -> Self {
        NewPost {
            image_ref: req.image_ref,
            cook_for: req.cook_for,
            cost: req.cost,
            time_estimate: req.time_estimate,
            meal: req.meal,
            tags: req.tags,
        }
    }
}

/// Choices offered by the post form.
#[derive(Debug, Clone, Serialize)]
pub struct PostOptions {
    pub cook_for: &'static [&'static str],
    pub cost: &'static [&'static str],
    pub time_estimate: &'static [&'static str],
    pub meal: &'static [&'static str],
    pub tags: &'static [&'static str],
}

// -- Notifications --

#[derive(Debug, Serialize)]
pub struct ClearNotificationsResponse {
    pub cleared: usize,
}

// -- Blobs --

#[derive(Debug, Serialize, Deserialize)]
pub struct BlobUploadResponse {
    pub key: String,
    pub image_ref: ImageRef,
    pub size: u64,
    pub sha256: String,
}

// -- Feed --

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u32>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
