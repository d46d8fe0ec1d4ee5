use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Access codes are always exactly this many ASCII alphanumerics.
pub const ACCESS_CODE_LEN: usize = 6;

// -- Access codes --

/// A crew join code, normalized to uppercase.
///
/// Construction goes through [`AccessCode::parse`], so a value of this type is
/// always six uppercase ASCII alphanumerics and can be compared byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessCode(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access code must be {ACCESS_CODE_LEN} letters or digits, got {0:?}")]
pub struct InvalidAccessCode(pub String);

impl AccessCode {
    pub fn parse(raw: &str) -> Result<Self, InvalidAccessCode> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.len() != ACCESS_CODE_LEN
            || !normalized.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(InvalidAccessCode(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccessCode {
    type Error = InvalidAccessCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccessCode> for String {
    fn from(code: AccessCode) -> Self {
        code.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -- Tags --

/// Ordered set of post tags. Entries are trimmed, blanks are dropped and the
/// first occurrence of a duplicate wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag.trim())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags: Vec<String> = Vec::new();
        for tag in iter {
            let tag = tag.into().trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Self(tags)
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        tags.0
    }
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Display metadata attached to posts and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub icon: Option<String>,
}

impl UserSummary {
    /// Placeholder for a user whose profile row is gone.
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            display_name: "unknown".to_string(),
            icon: None,
        }
    }
}

// -- Crews --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crew {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
    pub creator_id: Uuid,
    pub access_code: AccessCode,
    pub created_at: DateTime<Utc>,
}

impl Crew {
    /// Ownership is never stored on the membership row, it is derived here.
    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewSummary {
    #[serde(flatten)]
    pub crew: Crew,
    pub member_count: u32,
    pub is_creator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewMember {
    pub member_id: Uuid,
    pub display_name: String,
    pub icon: Option<String>,
    pub is_creator: bool,
    pub joined_at: DateTime<Utc>,
}

/// Members of a crew in join order.
pub type MembershipList = Vec<CrewMember>;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "crew", rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined(Crew),
    /// The membership already existed. Not an error.
    AlreadyMember(Crew),
}

impl JoinOutcome {
    pub fn crew(&self) -> &Crew {
        match self {
            Self::Joined(crew) | Self::AlreadyMember(crew) => crew,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveOutcome {
    Left,
    /// The caller was the last member; the crew and its code are gone.
    CrewDeleted,
    NotMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KickOutcome {
    Removed,
    NotMember,
}

// -- Posts --

/// Durable reference to a stored image, as handed back by a blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub image_ref: ImageRef,
    pub cook_for: String,
    pub cost: String,
    pub time_estimate: String,
    pub meal: String,
    pub tags: Tags,
    pub created_at: DateTime<Utc>,
}

/// Fields a user fills in before submitting a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub image_ref: Option<ImageRef>,
    pub cook_for: String,
    pub cost: String,
    pub time_estimate: String,
    pub meal: String,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: Post,
    pub creator: UserSummary,
}

/// Newest-first window of posts from the viewer's network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
}

impl FeedPage {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }
}

// -- Pokes --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poke {
    pub id: Uuid,
    pub post_id: Uuid,
    pub poked_user_id: Uuid,
    pub poker_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Coarse relative age shown next to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBucket {
    JustNow,
    Minutes(i64),
    Hours(i64),
    Days(i64),
    Weeks(i64),
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JustNow => f.write_str("just now"),
            Self::Minutes(n) => write!(f, "{n}m ago"),
            Self::Hours(n) => write!(f, "{n}h ago"),
            Self::Days(n) => write!(f, "{n}d ago"),
            Self::Weeks(n) => write!(f, "{n}w ago"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(flatten)]
    pub poke: Poke,
    pub poker: UserSummary,
    pub post_image_ref: ImageRef,
    pub post_meal: String,
    pub age: AgeBucket,
    pub age_label: String,
}

pub type NotificationList = Vec<Notification>;

// -- Capture --

/// Plain-data view of where a capture/upload pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    Idle,
    Capturing,
    Preview,
    Uploading,
    /// Still holding the preview, but the last upload attempt failed.
    Failed,
}
