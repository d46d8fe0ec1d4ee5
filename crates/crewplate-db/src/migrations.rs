use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Schema and version row commit together, so a crash part-way leaves
        // nothing behind.
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                password      TEXT NOT NULL,
                display_name  TEXT NOT NULL,
                icon          TEXT,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS crews (
                id           TEXT PRIMARY KEY,
                name         TEXT NOT NULL,
                icon         TEXT NOT NULL,
                creator_id   TEXT NOT NULL REFERENCES users(id),
                access_code  TEXT NOT NULL UNIQUE,
                created_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS crew_members (
                crew_id    TEXT NOT NULL REFERENCES crews(id) ON DELETE CASCADE,
                member_id  TEXT NOT NULL REFERENCES users(id),
                joined_at  TEXT NOT NULL,
                PRIMARY KEY (crew_id, member_id)
            );

            CREATE INDEX IF NOT EXISTS idx_crew_members_member
                ON crew_members(member_id);

            CREATE TABLE IF NOT EXISTS posts (
                id             TEXT PRIMARY KEY,
                creator_id     TEXT NOT NULL REFERENCES users(id),
                image_ref      TEXT NOT NULL,
                cook_for       TEXT NOT NULL,
                cost           TEXT NOT NULL,
                time_estimate  TEXT NOT NULL,
                meal           TEXT NOT NULL,
                tags           TEXT NOT NULL DEFAULT '[]',
                created_at     TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_posts_creator
                ON posts(creator_id, created_at);

            -- One post per uploaded photo; a retried create finds the first.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_posts_image_ref
                ON posts(image_ref);

            -- No uniqueness here: every poke is its own row.
            CREATE TABLE IF NOT EXISTS pokes (
                id             TEXT PRIMARY KEY,
                post_id        TEXT NOT NULL REFERENCES posts(id),
                poked_user_id  TEXT NOT NULL REFERENCES users(id),
                poker_id       TEXT NOT NULL REFERENCES users(id),
                created_at     TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pokes_recipient
                ON pokes(poked_user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
