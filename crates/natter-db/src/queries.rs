use anyhow::Result;
use chrono::SecondsFormat;
use rusqlite::{Connection, Row};

use natter_types::models::{Message, PresenceStatus};

use crate::models::{MessageWithSenderRow, UserRow};
use crate::{Database, DbError};

const USER_COLUMNS: &str =
    "id, username, password, custom_status, profile_picture, status, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )
            .map_err(map_unique_username)?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Returns false when no user has this id.
    pub fn update_username(&self, id: &str, username: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn
                .execute("UPDATE users SET username = ?1 WHERE id = ?2", (username, id))
                .map_err(map_unique_username)?;
            Ok(changed > 0)
        })
    }

    /// Returns false when no user has this id.
    pub fn update_custom_status(&self, id: &str, custom_status: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET custom_status = ?1 WHERE id = ?2",
                (custom_status, id),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_presence(&self, id: &str, status: PresenceStatus) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET status = ?1 WHERE id = ?2",
                (status.as_str(), id),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_users_with_presence(&self, status: PresenceStatus) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE status = ?1 ORDER BY username"
            ))?;
            let rows = stmt
                .query_map([status.as_str()], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        // Fixed-width UTC timestamps sort lexically in chronological order.
        let created_at = message.created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let id = message.id.to_string();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&id, &message.sender_id, &message.content, &created_at),
            )?;
            Ok(())
        })
    }

    /// The `limit` most recent messages, oldest first, each joined with its
    /// sender in the same query.
    pub fn get_recent_messages_with_senders(&self, limit: u32) -> Result<Vec<MessageWithSenderRow>> {
        self.with_conn(|conn| query_recent_messages(conn, limit))
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        custom_status: row.get(3)?,
        profile_picture: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_recent_messages(conn: &Connection, limit: u32) -> Result<Vec<MessageWithSenderRow>> {
    // LEFT JOIN keeps messages whose sender is gone; the caller decides what to do with them.
    let mut stmt = conn.prepare(
        "SELECT id, sender_id, content, created_at, user_id, username, profile_picture
         FROM (
             SELECT m.rowid AS seq, m.id, m.sender_id, m.content, m.created_at,
                    u.id AS user_id, u.username, u.profile_picture
             FROM messages m
             LEFT JOIN users u ON u.id = m.sender_id
             ORDER BY m.created_at DESC, m.rowid DESC
             LIMIT ?1
         )
         ORDER BY created_at ASC, seq ASC",
    )?;

    let rows = stmt
        .query_map([limit], |row| {
            Ok(MessageWithSenderRow {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
                sender_user_id: row.get(4)?,
                sender_username: row.get(5)?,
                sender_profile_picture: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_unique_username(err: rusqlite::Error) -> anyhow::Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            DbError::UsernameTaken.into()
        }
        _ => err.into(),
    }
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

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn db_with_user(id: &str, username: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(id, username, "hash").unwrap();
        db
    }

    fn message_at(sender: &str, content: &str, offset_secs: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender.to_string(),
            content: content.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn duplicate_username_is_reported() {
        let db = db_with_user("u1", "alice");
        let err = db.create_user("u2", "alice", "hash").unwrap_err();
        assert!(matches!(err.downcast_ref::<DbError>(), Some(DbError::UsernameTaken)));

        db.create_user("u2", "bob", "hash").unwrap();
        let err = db.update_username("u2", "alice").unwrap_err();
        assert!(matches!(err.downcast_ref::<DbError>(), Some(DbError::UsernameTaken)));
    }

    #[test]
    fn update_username_reports_missing_user() {
        let db = db_with_user("u1", "alice");
        assert!(db.update_username("u1", "alicia").unwrap());
        assert!(!db.update_username("nobody", "ghost").unwrap());
        assert_eq!(db.get_user_by_id("u1").unwrap().unwrap().username, "alicia");
    }

    #[test]
    fn custom_status_persists() {
        let db = db_with_user("u1", "alice");
        assert!(db.update_custom_status("u1", "busy").unwrap());
        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.custom_status.as_deref(), Some("busy"));
        assert_eq!(user.status, "offline");
    }

    #[test]
    fn presence_filter_is_exact() {
        let db = db_with_user("u1", "alice");
        db.create_user("u2", "bob", "hash").unwrap();
        db.create_user("u3", "carol", "hash").unwrap();
        assert!(db.get_users_with_presence(PresenceStatus::Online).unwrap().is_empty());

        db.set_presence("u1", PresenceStatus::Online).unwrap();
        db.set_presence("u2", PresenceStatus::Idle).unwrap();

        let online = db.get_users_with_presence(PresenceStatus::Online).unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].id, "u1");
    }

    #[test]
    fn recent_messages_are_oldest_first_and_joined() {
        let db = db_with_user("u1", "alice");
        db.insert_message(&message_at("u1", "second", 10)).unwrap();
        db.insert_message(&message_at("u1", "first", 0)).unwrap();

        let rows = db.get_recent_messages_with_senders(100).unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
        assert_eq!(rows[0].sender_username.as_deref(), Some("alice"));
        assert_eq!(rows[0].sender_user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn same_timestamp_falls_back_to_insertion_order() {
        let db = db_with_user("u1", "alice");
        for content in ["a", "b", "c"] {
            db.insert_message(&message_at("u1", content, 0)).unwrap();
        }
        let rows = db.get_recent_messages_with_senders(100).unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["a", "b", "c"]);
    }

    #[test]
    fn limit_keeps_the_newest() {
        let db = db_with_user("u1", "alice");
        for i in 0..5 {
            db.insert_message(&message_at("u1", &format!("m{i}"), i)).unwrap();
        }
        let rows = db.get_recent_messages_with_senders(2).unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);
    }

    #[test]
    fn orphaned_message_has_no_sender_columns() {
        let db = Database::open_in_memory().unwrap();
        db.insert_message(&message_at("ghost", "boo", 0)).unwrap();

        let rows = db.get_recent_messages_with_senders(100).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender_id, "ghost");
        assert!(rows[0].sender_user_id.is_none());
        assert!(rows[0].sender_username.is_none());
    }
}
