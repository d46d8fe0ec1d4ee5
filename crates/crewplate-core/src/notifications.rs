use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crewplate_db::Database;
use crewplate_db::models::{PokeRow, now_timestamp};
use crewplate_types::models::{
    AgeBucket, ImageRef, Notification, NotificationList, Poke, UserSummary,
};

use crate::convert;
use crate::error::{CoreError, Result};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Bucket an age in seconds. Each threshold floors. Negative ages (clock
/// skew between writer and reader) count as just now.
pub fn age_bucket(secs: i64) -> AgeBucket {
    match secs {
        s if s < MINUTE => AgeBucket::JustNow,
        s if s < HOUR => AgeBucket::Minutes(s / MINUTE),
        s if s < DAY => AgeBucket::Hours(s / HOUR),
        s if s < WEEK => AgeBucket::Days(s / DAY),
        s => AgeBucket::Weeks(s / WEEK),
    }
}

pub struct NotificationChannel<'a> {
    db: &'a Database,
}

impl<'a> NotificationChannel<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Nudge the creator of `post_id`. Not idempotent: every call writes a
    /// new poke, so callers must not retry it blindly.
    pub fn poke(&self, post_id: Uuid, poker_id: Uuid) -> Result<Poke> {
        let post = self
            .db
            .get_post(&post_id.to_string())?
            .ok_or(CoreError::NotFound("post"))?;

        let row = PokeRow {
            id: Uuid::new_v4().to_string(),
            post_id: post.id,
            poked_user_id: post.creator_id,
            poker_id: poker_id.to_string(),
            created_at: now_timestamp(),
        };
        self.db.insert_poke(&row)?;

        info!("User {} poked {} on post {}", poker_id, row.poked_user_id, post_id);
        convert::poke(row)
    }

    pub fn list_notifications(&self, user_id: Uuid) -> Result<NotificationList> {
        self.list_notifications_at(user_id, Utc::now())
    }

    /// Same as [`list_notifications`](Self::list_notifications) with an
    /// explicit clock for the age buckets.
    pub fn list_notifications_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<NotificationList> {
        let rows = self.db.list_notifications(&user_id.to_string())?;

        rows.into_iter()
            .map(|row| -> Result<Notification> {
                let poke = convert::poke(row.poke)?;
                let poker = match row.poker_display_name {
                    Some(display_name) => UserSummary {
                        id: poke.poker_id,
                        display_name,
                        icon: row.poker_icon,
                    },
                    None => UserSummary::unknown(poke.poker_id),
                };
                let age = age_bucket((now - poke.created_at).num_seconds());
                Ok(Notification {
                    poke,
                    poker,
                    post_image_ref: ImageRef::new(row.post_image_ref),
                    post_meal: row.post_meal,
                    age_label: age.to_string(),
                    age,
                })
            })
            .collect()
    }

    /// Delete every poke addressed to `user_id`. Returns how many went.
    pub fn clear_all(&self, user_id: Uuid) -> Result<usize> {
        let cleared = self.db.delete_pokes_for_user(&user_id.to_string())?;
        info!("Cleared {} notifications for {}", cleared, user_id);
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::testutil::{temp_db, user};
    use crewplate_db::models::PostRow;

    fn post(db: &Database, creator: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        db.insert_post(&PostRow {
            id: id.to_string(),
            creator_id: creator.to_string(),
            image_ref: format!("https://img.example/{}.jpg", id),
            cook_for: "Family".into(),
            cost: "$$".into(),
            time_estimate: "30-60 min".into(),
            meal: "Dinner".into(),
            tags: vec![],
            created_at: now_timestamp(),
        })
        .unwrap();
        id
    }

    #[test]
    fn age_bucket_boundaries() {
        assert_eq!(age_bucket(0).to_string(), "just now");
        assert_eq!(age_bucket(59).to_string(), "just now");
        assert_eq!(age_bucket(60).to_string(), "1m ago");
        assert_eq!(age_bucket(3599).to_string(), "59m ago");
        assert_eq!(age_bucket(3600).to_string(), "1h ago");
        assert_eq!(age_bucket(86_399).to_string(), "23h ago");
        assert_eq!(age_bucket(86_400).to_string(), "1d ago");
        assert_eq!(age_bucket(604_799).to_string(), "6d ago");
        assert_eq!(age_bucket(604_800).to_string(), "1w ago");
        assert_eq!(age_bucket(-30), AgeBucket::JustNow);
    }

    #[test]
    fn repeated_pokes_are_distinct_and_cleared_together() {
        let db = temp_db();
        let u1 = user(&db, "u1");
        let a = user(&db, "a");
        let p = post(&db, a);
        let channel = NotificationChannel::new(&db);

        let first = channel.poke(p, u1).unwrap();
        let second = channel.poke(p, u1).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.poked_user_id, a);

        assert_eq!(channel.list_notifications(a).unwrap().len(), 2);
        assert_eq!(channel.clear_all(a).unwrap(), 2);
        assert!(channel.list_notifications(a).unwrap().is_empty());
        assert_eq!(channel.clear_all(a).unwrap(), 0);
    }

    #[test]
    fn poke_on_missing_post_is_not_found() {
        let db = temp_db();
        let u1 = user(&db, "u1");
        let err = NotificationChannel::new(&db).poke(Uuid::new_v4(), u1).unwrap_err();
        assert!(matches!(err, CoreError::NotFound("post")));
    }

    #[test]
    fn notifications_carry_poker_and_age() {
        let db = temp_db();
        let u1 = user(&db, "u1");
        let u2 = user(&db, "u2");
        let p = post(&db, u1);
        let channel = NotificationChannel::new(&db);
        channel.poke(p, u2).unwrap();

        let now = channel.list_notifications(u1).unwrap();
        assert_eq!(now.len(), 1);
        assert_eq!(now[0].poke.post_id, p);
        assert_eq!(now[0].poker.display_name, "u2");
        assert_eq!(now[0].post_meal, "Dinner");
        assert_eq!(now[0].age_label, "just now");

        let later = channel
            .list_notifications_at(u1, Utc::now() + Duration::hours(2))
            .unwrap();
        assert_eq!(later[0].age, AgeBucket::Hours(2));

        // The poker only sees pokes addressed to them
        assert!(channel.list_notifications(u2).unwrap().is_empty());
    }
}
