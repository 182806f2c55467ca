/// Database layer for persistent storage.
/// Handles user and group rows; membership rows are owned by the
/// membership engine, which is their sole writer.

pub mod init;
pub mod models;

use chrono::Utc;
use models::{Group, User};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub type DbPool = Arc<Mutex<Connection>>;

/// Create a connection pool (simplified for single-threaded SQLite)
pub fn create_pool(db_path: &str) -> SqliteResult<DbPool> {
    let conn = Connection::open(db_path)?;
    init::initialize_database(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Create an in-memory database for testing
pub fn create_test_pool() -> DbPool {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory DB");
    init::initialize_database(&conn).expect("Failed to initialize DB");
    Arc::new(Mutex::new(conn))
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        token: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        admin_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Database operations
pub struct Database;

impl Database {
    /// Register a new user and issue an opaque session token
    pub async fn register_user(pool: &DbPool, username: &str) -> SqliteResult<User> {
        let conn = pool.lock().await;
        let token = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO users (username, token, created_at) VALUES (?1, ?2, ?3)",
            params![username, &token, &created_at],
        )?;

        let mut stmt = conn
            .prepare("SELECT id, username, token, created_at FROM users WHERE username = ?1")?;
        let user = stmt.query_row(params![username], user_from_row)?;

        Ok(user)
    }

    /// Get user by ID
    pub async fn get_user_by_id(pool: &DbPool, user_id: i64) -> SqliteResult<Option<User>> {
        let conn = pool.lock().await;

        let mut stmt =
            conn.prepare("SELECT id, username, token, created_at FROM users WHERE id = ?1")?;

        let user = stmt.query_row(params![user_id], user_from_row).optional()?;

        Ok(user)
    }

    /// Resolve an opaque session token to a user
    pub async fn get_user_by_token(pool: &DbPool, token: &str) -> SqliteResult<Option<User>> {
        let conn = pool.lock().await;

        let mut stmt =
            conn.prepare("SELECT id, username, token, created_at FROM users WHERE token = ?1")?;

        let user = stmt.query_row(params![token], user_from_row).optional()?;

        Ok(user)
    }

    /// Create a new group owned by the given admin
    pub async fn create_group(pool: &DbPool, name: &str, admin_id: i64) -> SqliteResult<Group> {
        let conn = pool.lock().await;
        let created_at = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO groups (name, admin_id, created_at) VALUES (?1, ?2, ?3)",
            params![name, admin_id, &created_at],
        )?;

        let id = conn.last_insert_rowid();
        let mut stmt =
            conn.prepare("SELECT id, name, admin_id, created_at FROM groups WHERE id = ?1")?;
        let group = stmt.query_row(params![id], group_from_row)?;

        Ok(group)
    }

    /// Get group by id
    pub async fn get_group(pool: &DbPool, group_id: i64) -> SqliteResult<Option<Group>> {
        let conn = pool.lock().await;

        let mut stmt =
            conn.prepare("SELECT id, name, admin_id, created_at FROM groups WHERE id = ?1")?;

        let group = stmt
            .query_row(params![group_id], group_from_row)
            .optional()?;

        Ok(group)
    }

    /// List all groups
    pub async fn get_groups(pool: &DbPool) -> SqliteResult<Vec<Group>> {
        let conn = pool.lock().await;

        let mut stmt =
            conn.prepare("SELECT id, name, admin_id, created_at FROM groups ORDER BY id")?;

        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(groups)
    }
}
