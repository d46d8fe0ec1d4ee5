use std::path::PathBuf;

use crewplate_db::Database;
use crewplate_db::models::{UserRow, now_timestamp};
use uuid::Uuid;

pub fn temp_db() -> Database {
    let path: PathBuf =
        std::env::temp_dir().join(format!("crewplate_core_test_{}.db", Uuid::new_v4()));
    Database::open(&path).unwrap()
}

pub fn user(db: &Database, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(&UserRow {
        id: id.to_string(),
        email: format!("{}-{}@example.com", name, id),
        password: "not-a-real-hash".into(),
        display_name: name.into(),
        icon: None,
        created_at: now_timestamp(),
    })
    .unwrap();
    id
}
