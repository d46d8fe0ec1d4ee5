//! Row → domain conversions. Corrupt ids or timestamps surface as storage
//! errors rather than being papered over.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crewplate_db::models::{CrewRow, PokeRow, PostRow, UserRow, parse_timestamp};
use crewplate_types::models::{AccessCode, Crew, ImageRef, Poke, Post, User, UserSummary};

use crate::error::{CoreError, Result};

pub(crate) fn id(raw: &str) -> Result<Uuid> {
    raw.parse()
        .map_err(|e| CoreError::Storage(anyhow!("Corrupt id '{}': {}", raw, e)))
}

pub(crate) fn timestamp(raw: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(raw).map_err(CoreError::Storage)
}

pub(crate) fn user(row: UserRow) -> Result<User> {
    Ok(User {
        id: id(&row.id)?,
        email: row.email,
        display_name: row.display_name,
        icon: row.icon,
        created_at: timestamp(&row.created_at)?,
    })
}

pub(crate) fn user_summary(row: &UserRow) -> Result<UserSummary> {
    Ok(UserSummary {
        id: id(&row.id)?,
        display_name: row.display_name.clone(),
        icon: row.icon.clone(),
    })
}

pub(crate) fn crew(row: CrewRow) -> Result<Crew> {
    let access_code = AccessCode::parse(&row.access_code)
        .map_err(|e| CoreError::Storage(anyhow!("Corrupt crew '{}': {}", row.id, e)))?;
    Ok(Crew {
        id: id(&row.id)?,
        name: row.name,
        icon: row.icon,
        creator_id: id(&row.creator_id)?,
        access_code,
        created_at: timestamp(&row.created_at)?,
    })
}

pub(crate) fn post(row: PostRow) -> Result<Post> {
    Ok(Post {
        id: id(&row.id)?,
        creator_id: id(&row.creator_id)?,
        image_ref: ImageRef::new(row.image_ref),
        cook_for: row.cook_for,
        cost: row.cost,
        time_estimate: row.time_estimate,
        meal: row.meal,
        tags: row.tags.into(),
        created_at: timestamp(&row.created_at)?,
    })
}

pub(crate) fn poke(row: PokeRow) -> Result<Poke> {
    Ok(Poke {
        id: id(&row.id)?,
        post_id: id(&row.post_id)?,
        poked_user_id: id(&row.poked_user_id)?,
        poker_id: id(&row.poker_id)?,
        created_at: timestamp(&row.created_at)?,
    })
}
