use crate::models::{
    CrewMemberRow, CrewRow, CrewSummaryRow, JoinRow, KickRow, LeaveRow, NotificationRow, PokeRow,
    PostInsert, PostRow, UserRow,
};
use crate::{Database, is_unique_violation};
use anyhow::Result;
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, Row, TransactionBehavior};

const USER_COLUMNS: &str = "u.id, u.email, u.password, u.display_name, u.icon, u.created_at";
const CREW_COLUMNS: &str = "c.id, c.name, c.icon, c.creator_id, c.access_code, c.created_at";
const POST_COLUMNS: &str =
    "p.id, p.creator_id, p.image_ref, p.cook_for, p.cost, p.time_estimate, p.meal, p.tags, p.created_at";

impl Database {
    // -- Users --

    /// Returns `false` if the email is already registered.
    pub fn create_user(&self, user: &UserRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let res = conn.execute(
                "INSERT INTO users (id, email, password, display_name, icon, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.email,
                    user.password,
                    user.display_name,
                    user.icon,
                    user.created_at
                ],
            );
            match res {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e, "users.email") => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = ?1"),
                [email],
                map_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
                [id],
                map_user,
            )
            .optional()
        })
    }

    /// Batch-fetch users for a set of ids. Missing ids are simply absent.
    pub fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u WHERE u.id IN ({})",
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(as_params(ids).as_slice(), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// `None` fields keep their current value. Returns `false` for an unknown user.
    pub fn update_user_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        icon: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users
                 SET display_name = COALESCE(?2, display_name), icon = COALESCE(?3, icon)
                 WHERE id = ?1",
                rusqlite::params![id, display_name, icon],
            )?;
            Ok(updated > 0)
        })
    }

    // -- Crews --

    /// Insert a crew together with its creator's membership.
    /// Returns `false` (and writes nothing) if the access code is taken.
    pub fn insert_crew_with_creator(&self, crew: &CrewRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let res = tx.execute(
                "INSERT INTO crews (id, name, icon, creator_id, access_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    crew.id,
                    crew.name,
                    crew.icon,
                    crew.creator_id,
                    crew.access_code,
                    crew.created_at
                ],
            );
            match res {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e, "crews.access_code") => return Ok(false),
                Err(e) => return Err(e.into()),
            }

            tx.execute(
                "INSERT INTO crew_members (crew_id, member_id, joined_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![crew.id, crew.creator_id, crew.created_at],
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_crew(&self, id: &str) -> Result<Option<CrewRow>> {
        self.with_conn(|conn| query_crew(conn, "c.id", id))
    }

    /// `code` must already be normalized.
    pub fn get_crew_by_code(&self, code: &str) -> Result<Option<CrewRow>> {
        self.with_conn(|conn| query_crew(conn, "c.access_code", code))
    }

    pub fn access_code_exists(&self, code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM crews WHERE access_code = ?1)",
                [code],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Resolve `code` and add `member_id` in one transaction. The insert
    /// ignores conflicts on (crew_id, member_id), so a retried or racing
    /// duplicate comes back as `Existing`.
    pub fn join_crew_by_code(&self, code: &str, member_id: &str, joined_at: &str) -> Result<JoinRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(crew) = query_crew(&tx, "c.access_code", code)? else {
                return Ok(JoinRow::NoSuchCode);
            };

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO crew_members (crew_id, member_id, joined_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![crew.id, member_id, joined_at],
            )?;

            tx.commit()?;
            Ok(if inserted == 0 {
                JoinRow::Existing(crew)
            } else {
                JoinRow::Inserted(crew)
            })
        })
    }

    /// Remove a membership and, if nobody is left, the crew itself. The count
    /// is read after the delete inside the same transaction.
    pub fn leave_crew(&self, crew_id: &str, member_id: &str) -> Result<LeaveRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let removed = tx.execute(
                "DELETE FROM crew_members WHERE crew_id = ?1 AND member_id = ?2",
                [crew_id, member_id],
            )? > 0;

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM crew_members WHERE crew_id = ?1",
                [crew_id],
                |row| row.get(0),
            )?;

            let crew_deleted = if remaining == 0 {
                tx.execute("DELETE FROM crews WHERE id = ?1", [crew_id])? > 0
            } else {
                false
            };

            tx.commit()?;
            Ok(LeaveRow { removed, crew_deleted })
        })
    }

    /// Remove `target_id` if `actor_id` is the crew's creator and still a member.
    pub fn kick_member(&self, crew_id: &str, actor_id: &str, target_id: &str) -> Result<KickRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let creator: Option<String> = tx
                .query_row("SELECT creator_id FROM crews WHERE id = ?1", [crew_id], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(creator) = creator else {
                return Ok(KickRow::CrewMissing);
            };

            if creator != actor_id || !query_is_member(&tx, crew_id, actor_id)? {
                return Ok(KickRow::NotOwner);
            }

            let removed = tx.execute(
                "DELETE FROM crew_members WHERE crew_id = ?1 AND member_id = ?2",
                [crew_id, target_id],
            )?;

            tx.commit()?;
            Ok(if removed > 0 { KickRow::Removed } else { KickRow::NotMember })
        })
    }

    pub fn is_member(&self, crew_id: &str, member_id: &str) -> Result<bool> {
        self.with_conn(|conn| query_is_member(conn, crew_id, member_id))
    }

    pub fn member_count(&self, crew_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM crew_members WHERE crew_id = ?1",
                [crew_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn crew_ids_for_member(&self, member_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT crew_id FROM crew_members WHERE member_id = ?1")?;
            let ids = stmt
                .query_map([member_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Distinct members across a set of crews.
    pub fn member_ids_for_crews(&self, crew_ids: &[String]) -> Result<Vec<String>> {
        if crew_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT DISTINCT member_id FROM crew_members WHERE crew_id IN ({})",
                placeholders(1, crew_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(as_params(crew_ids).as_slice(), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Members in join order, with profile fields joined in.
    pub fn list_crew_members(&self, crew_id: &str) -> Result<Vec<CrewMemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.member_id, u.display_name, u.icon, m.joined_at
                 FROM crew_members m
                 LEFT JOIN users u ON u.id = m.member_id
                 WHERE m.crew_id = ?1
                 ORDER BY m.joined_at ASC, m.rowid ASC",
            )?;
            let rows = stmt
                .query_map([crew_id], |row| {
                    Ok(CrewMemberRow {
                        member_id: row.get(0)?,
                        display_name: row.get(1)?,
                        icon: row.get(2)?,
                        joined_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Crews `member_id` belongs to, most recently joined first.
    pub fn list_crews_for_member(&self, member_id: &str) -> Result<Vec<CrewSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CREW_COLUMNS},
                        (SELECT COUNT(*) FROM crew_members cm WHERE cm.crew_id = c.id)
                 FROM crew_members m
                 JOIN crews c ON c.id = m.crew_id
                 WHERE m.member_id = ?1
                 ORDER BY m.joined_at DESC, m.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([member_id], |row| {
                    Ok(CrewSummaryRow {
                        crew: map_crew(row)?,
                        member_count: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Posts --

    /// Insert unless a post already uses the same image, in which case that
    /// post is returned instead.
    pub fn insert_post(&self, post: &PostRow) -> Result<PostInsert> {
        let tags = serde_json::to_string(&post.tags)?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let inserted = tx.execute(
                "INSERT INTO posts (id, creator_id, image_ref, cook_for, cost, time_estimate, meal, tags, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(image_ref) DO NOTHING",
                rusqlite::params![
                    post.id,
                    post.creator_id,
                    post.image_ref,
                    post.cook_for,
                    post.cost,
                    post.time_estimate,
                    post.meal,
                    tags,
                    post.created_at
                ],
            )?;

            let outcome = if inserted == 1 {
                PostInsert::Inserted
            } else {
                let existing = tx.query_row(
                    &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.image_ref = ?1"),
                    [&post.image_ref],
                    map_post,
                )?;
                PostInsert::Existing(existing)
            };
            tx.commit()?;
            Ok(outcome)
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
                [id],
                map_post,
            )
            .optional()
        })
    }

    /// Newest posts by any of `creator_ids`. Rows sharing a timestamp fall
    /// back to insertion order.
    pub fn get_posts_by_creators(&self, creator_ids: &[String], limit: u32) -> Result<Vec<PostRow>> {
        if creator_ids.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let n = creator_ids.len();
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts p
                 WHERE p.creator_id IN ({})
                 ORDER BY p.created_at DESC, p.rowid DESC
                 LIMIT ?{}",
                placeholders(1, n),
                n + 1
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut params = as_params(creator_ids);
            params.push(&limit);
            let rows = stmt
                .query_map(params.as_slice(), map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Pokes --

    pub fn insert_poke(&self, poke: &PokeRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO pokes (id, post_id, poked_user_id, poker_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    poke.id,
                    poke.post_id,
                    poke.poked_user_id,
                    poke.poker_id,
                    poke.created_at
                ],
            )?;
            Ok(())
        })
    }

    /// Pokes received by `user_id`, newest first, joined with the poker's
    /// profile and the poked post in a single query.
    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT k.id, k.post_id, k.poked_user_id, k.poker_id, k.created_at,
                        u.display_name, u.icon, p.image_ref, p.meal
                 FROM pokes k
                 JOIN posts p ON p.id = k.post_id
                 LEFT JOIN users u ON u.id = k.poker_id
                 WHERE k.poked_user_id = ?1
                 ORDER BY k.created_at DESC, k.rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(NotificationRow {
                        poke: PokeRow {
                            id: row.get(0)?,
                            post_id: row.get(1)?,
                            poked_user_id: row.get(2)?,
                            poker_id: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                        poker_display_name: row.get(5)?,
                        poker_icon: row.get(6)?,
                        post_image_ref: row.get(7)?,
                        post_meal: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns how many pokes were deleted.
    pub fn delete_pokes_for_user(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM pokes WHERE poked_user_id = ?1", [user_id])?;
            Ok(deleted)
        })
    }
}

fn query_crew(conn: &Connection, column: &str, value: &str) -> Result<Option<CrewRow>> {
    conn.query_row(
        &format!("SELECT {CREW_COLUMNS} FROM crews c WHERE {column} = ?1"),
        [value],
        map_crew,
    )
    .optional()
}

fn query_is_member(conn: &Connection, crew_id: &str, member_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM crew_members WHERE crew_id = ?1 AND member_id = ?2)",
        [crew_id, member_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        display_name: row.get(3)?,
        icon: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_crew(row: &Row<'_>) -> rusqlite::Result<CrewRow> {
    Ok(CrewRow {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        creator_id: row.get(3)?,
        access_code: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    let raw_tags: String = row.get(7)?;
    let tags: Vec<String> = serde_json::from_str(&raw_tags)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(PostRow {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        image_ref: row.get(2)?,
        cook_for: row.get(3)?,
        cost: row.get(4)?,
        time_estimate: row.get(5)?,
        meal: row.get(6)?,
        tags,
        created_at: row.get(8)?,
    })
}

/// "?start, ?start+1, ..." for `count` positional parameters.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn as_params(values: &[String]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
