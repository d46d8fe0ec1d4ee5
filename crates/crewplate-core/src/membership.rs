use tracing::{info, warn};
use uuid::Uuid;

use crewplate_db::Database;
use crewplate_db::models::{CrewRow, JoinRow, KickRow, now_timestamp};
use crewplate_types::models::{
    AccessCode, Crew, CrewMember, CrewSummary, JoinOutcome, KickOutcome, LeaveOutcome, MembershipList,
};

use crate::codes::{AccessCodeDirectory, CodeSource, MAX_CODE_ATTEMPTS};
use crate::convert;
use crate::error::{CoreError, Result};

pub const DEFAULT_CREW_ICON: &str = "👥";

/// Crew lifecycle and membership rules.
///
/// A crew lives while it has at least one member. Ownership is never stored
/// on a membership: the creator is whoever matches `Crew::creator_id`, and
/// only they may kick. If the creator leaves, the crew carries on without
/// anyone able to kick.
pub struct MembershipGraph<'a> {
    db: &'a Database,
    codes: AccessCodeDirectory<'a>,
}

impl<'a> MembershipGraph<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            codes: AccessCodeDirectory::new(db),
        }
    }

    pub fn with_code_source(db: &'a Database, source: &'a dyn CodeSource) -> Self {
        Self {
            db,
            codes: AccessCodeDirectory::with_source(db, source),
        }
    }

    pub fn codes(&self) -> &AccessCodeDirectory<'a> {
        &self.codes
    }

    pub fn create_crew(&self, name: &str, icon: Option<&str>, creator_id: Uuid) -> Result<Crew> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("crew name must not be empty"));
        }
        let icon = icon
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_CREW_ICON);

        if self.db.get_user_by_id(&creator_id.to_string())?.is_none() {
            return Err(CoreError::NotFound("user"));
        }

        // One budget covers both "already taken" and "lost the insert race".
        let mut used = 0;
        loop {
            let code = self.codes.generate_code_within(&mut used)?;
            let row = CrewRow {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                icon: icon.to_string(),
                creator_id: creator_id.to_string(),
                access_code: code.to_string(),
                created_at: now_timestamp(),
            };
            if self.db.insert_crew_with_creator(&row)? {
                info!("Crew {} '{}' created by {} with code {}", row.id, name, creator_id, code);
                return convert::crew(row);
            }
            warn!("Access code {} claimed concurrently (attempt {}/{})", code, used, MAX_CODE_ATTEMPTS);
        }
    }

    /// Join through an access code. Joining twice is not an error.
    pub fn join(&self, code: &str, user_id: Uuid) -> Result<JoinOutcome> {
        let code = AccessCode::parse(code)?;
        let joined = self
            .db
            .join_crew_by_code(code.as_str(), &user_id.to_string(), &now_timestamp())?;

        match joined {
            JoinRow::NoSuchCode => Err(CoreError::NotFound("crew")),
            JoinRow::Inserted(row) => {
                info!("User {} joined crew {}", user_id, row.id);
                Ok(JoinOutcome::Joined(convert::crew(row)?))
            }
            JoinRow::Existing(row) => Ok(JoinOutcome::AlreadyMember(convert::crew(row)?)),
        }
    }

    /// Leave a crew. The last member out deletes it, and its code stops
    /// resolving. Leaving a crew you are not in (or that is gone) succeeds.
    pub fn leave(&self, crew_id: Uuid, user_id: Uuid) -> Result<LeaveOutcome> {
        let left = self
            .db
            .leave_crew(&crew_id.to_string(), &user_id.to_string())?;

        Ok(if left.crew_deleted {
            info!("User {} left crew {}; crew was empty and is deleted", user_id, crew_id);
            LeaveOutcome::CrewDeleted
        } else if left.removed {
            info!("User {} left crew {}", user_id, crew_id);
            LeaveOutcome::Left
        } else {
            LeaveOutcome::NotMember
        })
    }

    /// Creator-only removal of another member. Never deletes the crew, since
    /// the creator stays.
    pub fn kick(&self, crew_id: Uuid, actor_id: Uuid, target_id: Uuid) -> Result<KickOutcome> {
        let crew = self.get_crew(crew_id)?;
        if !crew.is_creator(actor_id) || !self.is_member(crew_id, actor_id)? {
            return Err(CoreError::Forbidden("only the crew creator can remove members"));
        }
        if target_id == actor_id {
            return Err(CoreError::InvalidOperation("the creator cannot kick themselves, leave instead"));
        }

        let kicked = self.db.kick_member(
            &crew_id.to_string(),
            &actor_id.to_string(),
            &target_id.to_string(),
        )?;

        match kicked {
            KickRow::CrewMissing => Err(CoreError::NotFound("crew")),
            KickRow::NotOwner => Err(CoreError::Forbidden("only the crew creator can remove members")),
            KickRow::Removed => {
                info!("User {} removed {} from crew {}", actor_id, target_id, crew_id);
                Ok(KickOutcome::Removed)
            }
            KickRow::NotMember => Ok(KickOutcome::NotMember),
        }
    }

    pub fn get_crew(&self, crew_id: Uuid) -> Result<Crew> {
        let row = self
            .db
            .get_crew(&crew_id.to_string())?
            .ok_or(CoreError::NotFound("crew"))?;
        convert::crew(row)
    }

    pub fn is_member(&self, crew_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.db.is_member(&crew_id.to_string(), &user_id.to_string())?)
    }

    pub fn member_count(&self, crew_id: Uuid) -> Result<u32> {
        Ok(self.db.member_count(&crew_id.to_string())?)
    }

    /// Members in join order.
    pub fn list_members(&self, crew_id: Uuid) -> Result<MembershipList> {
        let crew = self.get_crew(crew_id)?;
        let rows = self.db.list_crew_members(&crew_id.to_string())?;

        rows.into_iter()
            .map(|row| -> Result<CrewMember> {
                let member_id = convert::id(&row.member_id)?;
                Ok(CrewMember {
                    member_id,
                    display_name: row.display_name.unwrap_or_else(|| "unknown".to_string()),
                    icon: row.icon,
                    is_creator: crew.is_creator(member_id),
                    joined_at: convert::timestamp(&row.joined_at)?,
                })
            })
            .collect()
    }

    pub fn list_crews_for_user(&self, user_id: Uuid) -> Result<Vec<CrewSummary>> {
        let rows = self.db.list_crews_for_member(&user_id.to_string())?;

        rows.into_iter()
            .map(|row| -> Result<CrewSummary> {
                let crew = convert::crew(row.crew)?;
                Ok(CrewSummary {
                    is_creator: crew.is_creator(user_id),
                    member_count: row.member_count,
                    crew,
                })
            })
            .collect()
    }
}
