use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crewplate_db::Database;
use crewplate_types::models::{FeedPage, FeedPost, UserSummary};

use crate::convert;
use crate::error::Result;

pub const DEFAULT_FEED_LIMIT: u32 = 20;
pub const MAX_FEED_LIMIT: u32 = 100;

/// Derives what a viewer may see from the membership graph.
///
/// The viewer's network is every member of every crew the viewer is in,
/// the viewer included. A viewer in no crew has an empty network and an
/// empty feed. There is no global fallback and no paging past the first
/// window.
pub struct FeedAggregator<'a> {
    db: &'a Database,
}

impl<'a> FeedAggregator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Everyone who shares at least one crew with `viewer`.
    pub fn network_user_ids(&self, viewer: Uuid) -> Result<Vec<String>> {
        let crew_ids = self.db.crew_ids_for_member(&viewer.to_string())?;
        if crew_ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.db.member_ids_for_crews(&crew_ids)?)
    }

    pub fn shares_crew(&self, viewer: Uuid, other: Uuid) -> Result<bool> {
        if viewer == other {
            return Ok(true);
        }
        let other = other.to_string();
        Ok(self.network_user_ids(viewer)?.contains(&other))
    }

    /// Newest posts from the viewer's network. `limit` is clamped to
    /// `1..=MAX_FEED_LIMIT`, `None` means [`DEFAULT_FEED_LIMIT`].
    pub fn get_feed(&self, viewer: Uuid, limit: Option<u32>) -> Result<FeedPage> {
        let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);

        let network = self.network_user_ids(viewer)?;
        if network.is_empty() {
            debug!("Viewer {} is in no crew, empty feed", viewer);
            return Ok(FeedPage::default());
        }

        let rows = self.db.get_posts_by_creators(&network, limit)?;
        if rows.is_empty() {
            return Ok(FeedPage::default());
        }

        // Batch-fetch creator profiles for display
        let mut creator_ids: Vec<String> = rows.iter().map(|r| r.creator_id.clone()).collect();
        creator_ids.sort();
        creator_ids.dedup();
        let creators: HashMap<String, UserSummary> = self
            .db
            .get_users_by_ids(&creator_ids)?
            .iter()
            .map(|u| -> Result<(String, UserSummary)> {
                Ok((u.id.clone(), convert::user_summary(u)?))
            })
            .collect::<Result<_>>()?;

        let posts = rows
            .into_iter()
            .map(|row| -> Result<FeedPost> {
                let creator = match creators.get(&row.creator_id) {
                    Some(summary) => summary.clone(),
                    None => UserSummary::unknown(convert::id(&row.creator_id)?),
                };
                Ok(FeedPost {
                    post: convert::post(row)?,
                    creator,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Feed for {}: {} posts from {} network users", viewer, posts.len(), network.len());
        Ok(FeedPage { posts })
    }
}
