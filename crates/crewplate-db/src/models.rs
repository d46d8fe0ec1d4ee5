//! Database row types. These map directly to SQLite rows.
//! Distinct from crewplate-types models to keep the DB layer independent.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub created_at: String,
}

pub struct CrewRow {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub creator_id: String,
    pub access_code: String,
    pub created_at: String,
}

pub struct CrewSummaryRow {
    pub crew: CrewRow,
    pub member_count: u32,
}

pub struct CrewMemberRow {
    pub member_id: String,
    pub display_name: Option<String>,
    pub icon: Option<String>,
    pub joined_at: String,
}

pub struct PostRow {
    pub id: String,
    pub creator_id: String,
    pub image_ref: String,
    pub cook_for: String,
    pub cost: String,
    pub time_estimate: String,
    pub meal: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

pub struct PokeRow {
    pub id: String,
    pub post_id: String,
    pub poked_user_id: String,
    pub poker_id: String,
    pub created_at: String,
}

/// A poke joined with the poker's profile and the post it targets.
pub struct NotificationRow {
    pub poke: PokeRow,
    pub poker_display_name: Option<String>,
    pub poker_icon: Option<String>,
    pub post_image_ref: String,
    pub post_meal: String,
}

/// Result of inserting a membership through an access code.
pub enum JoinRow {
    NoSuchCode,
    Inserted(CrewRow),
    Existing(CrewRow),
}

/// Result of inserting a post. Posts are unique per image.
pub enum PostInsert {
    Inserted,
    Existing(PostRow),
}

pub struct LeaveRow {
    pub removed: bool,
    pub crew_deleted: bool,
}

pub enum KickRow {
    CrewMissing,
    /// Actor is not the creator, or the creator already left.
    NotOwner,
    Removed,
    NotMember,
}

/// Timestamp format written by this crate: RFC 3339, UTC, microseconds.
/// Fixed width, so string order equals time order.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') stores "YYYY-MM-DD HH:MM:SS" without timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}
