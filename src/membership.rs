/// Membership engine: the single authority for mutating membership rows.
///
/// The state machine for a (user, group) pair:
/// absent --invite--> PENDING --accept--> ACTIVE
/// PENDING --reject--> absent (row deleted)
/// ACTIVE --remove/leave--> absent
///
/// There is no ACTIVE -> PENDING transition; re-inviting an active member is
/// rejected as a conflict by the invitation workflow, not here. The engine
/// performs no authorization: callers must have validated the operation.

use crate::db::models::{Group, Membership, MembershipStatus, User};
use crate::db::DbPool;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Result as SqliteResult};

fn membership_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: row.get(0)?,
        user_id: row.get(1)?,
        group_id: row.get(2)?,
        status: row.get(3)?,
        invited_by: row.get(4)?,
        invited_at: row.get(5)?,
    })
}

const MEMBERSHIP_COLUMNS: &str = "id, user_id, group_id, status, invited_by, invited_at";

/// Membership operations
pub struct MembershipEngine;

impl MembershipEngine {
    /// Insert or update the membership row for a (user, group) pair.
    ///
    /// If a row already exists its status is overwritten in place and the
    /// invitation metadata is left untouched; otherwise a new row is created
    /// with `invited_at` set to now. The UPSERT is a single statement, so the
    /// one-row-per-pair invariant holds even when two callers race on the
    /// same pair: the later write wins and no duplicate can appear.
    pub async fn upsert(
        pool: &DbPool,
        user_id: i64,
        group_id: i64,
        status: MembershipStatus,
        invited_by: i64,
    ) -> SqliteResult<Membership> {
        let conn = pool.lock().await;
        let invited_at = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO memberships (user_id, group_id, status, invited_by, invited_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, group_id) DO UPDATE SET status = excluded.status",
            params![user_id, group_id, status, invited_by, &invited_at],
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memberships WHERE user_id = ?1 AND group_id = ?2",
            MEMBERSHIP_COLUMNS
        ))?;
        let membership = stmt.query_row(params![user_id, group_id], membership_from_row)?;

        Ok(membership)
    }

    /// Delete the membership row for a (user, group) pair.
    /// Deliberately idempotent: removing an absent row is a no-op, not an
    /// error. The single DELETE keeps both traversal directions consistent
    /// because they read from the same table.
    pub async fn remove(pool: &DbPool, user_id: i64, group_id: i64) -> SqliteResult<()> {
        let conn = pool.lock().await;

        conn.execute(
            "DELETE FROM memberships WHERE user_id = ?1 AND group_id = ?2",
            params![user_id, group_id],
        )?;

        Ok(())
    }

    pub async fn find_by_user_and_group(
        pool: &DbPool,
        user_id: i64,
        group_id: i64,
    ) -> SqliteResult<Option<Membership>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memberships WHERE user_id = ?1 AND group_id = ?2",
            MEMBERSHIP_COLUMNS
        ))?;

        let membership = stmt
            .query_row(params![user_id, group_id], membership_from_row)
            .optional()?;

        Ok(membership)
    }

    pub async fn find_by_id(
        pool: &DbPool,
        membership_id: i64,
    ) -> SqliteResult<Option<Membership>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memberships WHERE id = ?1",
            MEMBERSHIP_COLUMNS
        ))?;

        let membership = stmt
            .query_row(params![membership_id], membership_from_row)
            .optional()?;

        Ok(membership)
    }

    /// Users whose membership with the group is ACTIVE
    pub async fn active_members(pool: &DbPool, group_id: i64) -> SqliteResult<Vec<User>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.token, u.created_at
             FROM memberships m JOIN users u ON u.id = m.user_id
             WHERE m.group_id = ?1 AND m.status = 'ACTIVE'
             ORDER BY u.id",
        )?;

        let users = stmt
            .query_map(params![group_id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    token: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Groups where the user's membership is ACTIVE
    pub async fn active_groups(pool: &DbPool, user_id: i64) -> SqliteResult<Vec<Group>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(
            "SELECT g.id, g.name, g.admin_id, g.created_at
             FROM memberships m JOIN groups g ON g.id = m.group_id
             WHERE m.user_id = ?1 AND m.status = 'ACTIVE'
             ORDER BY g.id",
        )?;

        let groups = stmt
            .query_map(params![user_id], |row| {
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    admin_id: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    pub async fn is_active_member(
        pool: &DbPool,
        user_id: i64,
        group_id: i64,
    ) -> SqliteResult<bool> {
        let conn = pool.lock().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memberships
             WHERE user_id = ?1 AND group_id = ?2 AND status = 'ACTIVE'",
            params![user_id, group_id],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// Direct status transition on an existing row (the accept path).
    pub async fn set_status(
        pool: &DbPool,
        membership_id: i64,
        status: MembershipStatus,
    ) -> SqliteResult<Membership> {
        let conn = pool.lock().await;

        conn.execute(
            "UPDATE memberships SET status = ?1 WHERE id = ?2",
            params![status, membership_id],
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memberships WHERE id = ?1",
            MEMBERSHIP_COLUMNS
        ))?;
        let membership = stmt.query_row(params![membership_id], membership_from_row)?;

        Ok(membership)
    }

    /// Open invitations for a user
    pub async fn pending_for_user(pool: &DbPool, user_id: i64) -> SqliteResult<Vec<Membership>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memberships WHERE user_id = ?1 AND status = 'PENDING' ORDER BY id",
            MEMBERSHIP_COLUMNS
        ))?;

        let memberships = stmt
            .query_map(params![user_id], membership_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(memberships)
    }

    /// Open invitations for a group
    pub async fn pending_for_group(pool: &DbPool, group_id: i64) -> SqliteResult<Vec<Membership>> {
        let conn = pool.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memberships WHERE group_id = ?1 AND status = 'PENDING' ORDER BY id",
            MEMBERSHIP_COLUMNS
        ))?;

        let memberships = stmt
            .query_map(params![group_id], membership_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(memberships)
    }
}
