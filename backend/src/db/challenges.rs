//! Challenge store.
//!
//! Every transition is a single conditional `UPDATE ... RETURNING *` scoped
//! by the state the caller expects; `None` means that state no longer held.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

use crate::models::{ChallengeRow, PendingQuit, QuitRequestLogRow};

pub async fn insert<'e, E>(executor: E, challenge: &ChallengeRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO challenges (id, user_id, device_id, duration_days, reason, status, started_at, ends_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&challenge.id)
    .bind(&challenge.user_id)
    .bind(&challenge.device_id)
    .bind(challenge.duration_days)
    .bind(&challenge.reason)
    .bind(&challenge.status)
    .bind(challenge.started_at)
    .bind(challenge.ends_at)
    .bind(challenge.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn find_active_by_user<'e, E>(
    executor: E,
    user_id: &Uuid,
) -> Result<Option<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM challenges WHERE user_id = ? AND status = 'active'")
        .bind(user_id.to_string())
        .fetch_optional(executor)
        .await
}

pub async fn find_by_id_for_user<'e, E>(
    executor: E,
    challenge_id: &Uuid,
    user_id: &Uuid,
) -> Result<Option<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM challenges WHERE id = ? AND user_id = ?")
        .bind(challenge_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(executor)
        .await
}

/// Take the write lock on an active challenge and return it unchanged.
///
/// Must be the first statement of a transaction that reads and then
/// writes: a deferred transaction that reads first cannot wait for the
/// write lock and fails with `SQLITE_BUSY` instead.
pub async fn lock_active<'e, E>(
    executor: E,
    challenge_id: &Uuid,
    user_id: &Uuid,
) -> Result<Option<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        UPDATE challenges SET status = status
        WHERE id = ? AND user_id = ? AND status = 'active'
        RETURNING *
        "#,
    )
    .bind(challenge_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(executor)
    .await
}

/// Most recent challenges first
pub async fn list_by_user<'e, E>(
    executor: E,
    user_id: &Uuid,
    limit: i64,
) -> Result<Vec<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "SELECT * FROM challenges WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
    )
    .bind(user_id.to_string())
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// Cancel on user intent. `quit_requested_at` must match what the caller
/// saw so a quit request attached in between is not dropped unlogged.
pub async fn mark_cancelled<'e, E>(
    executor: E,
    challenge_id: &Uuid,
    user_id: &Uuid,
    quit_requested_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Option<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        UPDATE challenges SET
            status = 'cancelled',
            cancelled_at = ?,
            quit_requested_at = NULL,
            quit_unlocks_at = NULL,
            quit_feeling = NULL,
            quit_status = NULL
        WHERE id = ? AND user_id = ? AND status = 'active' AND quit_requested_at IS ?
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(challenge_id.to_string())
    .bind(user_id.to_string())
    .bind(quit_requested_at)
    .fetch_optional(executor)
    .await
}

pub async fn mark_completed<'e, E>(
    executor: E,
    challenge_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        UPDATE challenges SET status = 'completed', completed_at = ?
        WHERE id = ? AND status = 'active' AND quit_status IS NULL
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(challenge_id)
    .fetch_optional(executor)
    .await
}

/// Cancel a challenge whose quit request has unlocked, discarding the request
pub async fn cancel_after_unlock<'e, E>(
    executor: E,
    challenge_id: &str,
    quit_requested_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Option<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        UPDATE challenges SET
            status = 'cancelled',
            cancelled_at = ?,
            quit_requested_at = NULL,
            quit_unlocks_at = NULL,
            quit_feeling = NULL,
            quit_status = NULL
        WHERE id = ? AND status = 'active' AND quit_status = 'pending' AND quit_requested_at = ?
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(challenge_id)
    .bind(quit_requested_at)
    .fetch_optional(executor)
    .await
}

/// Attach a quit request; only succeeds when none is pending
pub async fn attach_quit_request<'e, E>(
    executor: E,
    challenge_id: &Uuid,
    user_id: &Uuid,
    quit: &PendingQuit,
) -> Result<Option<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        UPDATE challenges SET
            quit_requested_at = ?,
            quit_unlocks_at = ?,
            quit_feeling = ?,
            quit_status = 'pending'
        WHERE id = ? AND user_id = ? AND status = 'active' AND quit_status IS NULL
        RETURNING *
        "#,
    )
    .bind(quit.requested_at)
    .bind(quit.unlocks_at)
    .bind(&quit.feeling)
    .bind(challenge_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(executor)
    .await
}

pub async fn clear_quit_request<'e, E>(
    executor: E,
    challenge_id: &Uuid,
    user_id: &Uuid,
    quit_requested_at: DateTime<Utc>,
) -> Result<Option<ChallengeRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        UPDATE challenges SET
            quit_requested_at = NULL,
            quit_unlocks_at = NULL,
            quit_feeling = NULL,
            quit_status = NULL
        WHERE id = ? AND user_id = ? AND status = 'active' AND quit_status = 'pending'
            AND quit_requested_at = ?
        RETURNING *
        "#,
    )
    .bind(challenge_id.to_string())
    .bind(user_id.to_string())
    .bind(quit_requested_at)
    .fetch_optional(executor)
    .await
}

pub async fn insert_log_entry<'e, E>(executor: E, entry: &QuitRequestLogRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO quit_request_log (id, challenge_id, requested_at, unlocks_at, feeling, outcome, resolved_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.challenge_id)
    .bind(entry.requested_at)
    .bind(entry.unlocks_at)
    .bind(&entry.feeling)
    .bind(&entry.outcome)
    .bind(entry.resolved_at)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn list_log_entries<'e, E>(
    executor: E,
    challenge_id: &str,
) -> Result<Vec<QuitRequestLogRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "SELECT * FROM quit_request_log WHERE challenge_id = ? ORDER BY requested_at DESC, rowid DESC",
    )
    .bind(challenge_id)
    .fetch_all(executor)
    .await
}
