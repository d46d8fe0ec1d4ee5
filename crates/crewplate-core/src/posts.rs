use tracing::info;
use uuid::Uuid;

use crewplate_db::Database;
use crewplate_db::models::{PostInsert, PostRow, now_timestamp};
use crewplate_types::api::PostOptions;
use crewplate_types::models::{FeedPost, NewPost, Post, UserSummary};

use crate::convert;
use crate::error::{CoreError, Result};
use crate::feed::FeedAggregator;

pub const COOK_FOR_OPTIONS: &[&str] = &["Family", "Friends", "Partner", "Kids", "Guests", "Solo"];
pub const COST_OPTIONS: &[&str] = &["$0-5", "$5-10", "$10-15", "$15-20", "$20+"];
pub const TIME_OPTIONS: &[&str] = &["< 15 min", "15-30 min", "30-45 min", "45-60 min", "1+ hour"];
pub const MEAL_OPTIONS: &[&str] = &["Breakfast", "Brunch", "Lunch", "Dinner", "Snack", "Dessert"];
pub const TAG_OPTIONS: &[&str] = &[
    "Healthy",
    "Quick",
    "Budget",
    "Gourmet",
    "Comfort Food",
    "Vegan",
    "Vegetarian",
    "Gluten-Free",
    "Kid-Friendly",
    "Date Night",
];

/// The choices the post form offers. Values are suggestions, posts are not
/// rejected for using something else.
pub fn options() -> PostOptions {
    PostOptions {
        cook_for: COOK_FOR_OPTIONS,
        cost: COST_OPTIONS,
        time_estimate: TIME_OPTIONS,
        meal: MEAL_OPTIONS,
        tags: TAG_OPTIONS,
    }
}

pub struct PostCatalog<'a> {
    db: &'a Database,
}

impl<'a> PostCatalog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Each photo backs at most one post. Creating again with the same image
    /// returns the post already made, so a retried request is harmless.
    pub fn create_post(&self, creator_id: Uuid, new: NewPost) -> Result<Post> {
        let required = [
            ("cook_for", &new.cook_for),
            ("cost", &new.cost),
            ("time_estimate", &new.time_estimate),
            ("meal", &new.meal),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(CoreError::validation(format!("{} must not be empty", field)));
        }

        let image_ref = match new.image_ref {
            Some(r) if !r.as_str().trim().is_empty() => r,
            _ => return Err(CoreError::validation("a photo is required")),
        };

        let row = PostRow {
            id: Uuid::new_v4().to_string(),
            creator_id: creator_id.to_string(),
            image_ref: image_ref.as_str().to_string(),
            cook_for: new.cook_for.trim().to_string(),
            cost: new.cost.trim().to_string(),
            time_estimate: new.time_estimate.trim().to_string(),
            meal: new.meal.trim().to_string(),
            tags: new.tags.into(),
            created_at: now_timestamp(),
        };
        match self.db.insert_post(&row)? {
            PostInsert::Inserted => {
                info!("Post {} created by {}", row.id, creator_id);
                convert::post(row)
            }
            PostInsert::Existing(existing) if existing.creator_id == row.creator_id => {
                info!("Post {} already exists for {}", existing.id, row.image_ref);
                convert::post(existing)
            }
            PostInsert::Existing(_) => Err(CoreError::Conflict("photo is already used by another post")),
        }
    }

    /// A single post, visible only if its creator is in the viewer's network.
    pub fn get_post(&self, viewer: Uuid, post_id: Uuid) -> Result<FeedPost> {
        let row = self
            .db
            .get_post(&post_id.to_string())?
            .ok_or(CoreError::NotFound("post"))?;
        let post = convert::post(row)?;

        if !FeedAggregator::new(self.db).shares_crew(viewer, post.creator_id)? {
            return Err(CoreError::Forbidden("post is outside your crews"));
        }

        let creator = match self.db.get_user_by_id(&post.creator_id.to_string())? {
            Some(user) => convert::user_summary(&user)?,
            None => UserSummary::unknown(post.creator_id),
        };
        Ok(FeedPost { post, creator })
    }
}
