use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use shared::{
    Challenge, CreateChallengeRequest, CreateQuitRequest, QuitRequestLogEntry, QuitRequestOutcome,
    ValidationErrors,
};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::challenges as store;
use crate::middleware::Principal;
use crate::models::{ChallengeRow, PendingQuit, QuitRequestLogRow};
use crate::services::lifecycle::{self, Transition, HISTORY_LIMIT};

pub const CHALLENGE_NOT_FOUND: &str = "Challenge not found or no longer active";
pub const QUIT_REQUEST_NOT_FOUND: &str = "No pending quit request for this challenge";
pub const ACTIVE_CHALLENGE_EXISTS: &str = "You already have an active challenge. Cancel it first.";

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    Conflict(&'static str),
    /// Missing, owned by someone else, or not in the required state
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What reconciliation did to the principal's active challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    Completed,
    QuitUnlocked,
}

/// Apply any time-triggered transition due on the user's active challenge.
///
/// Losing a race to another writer is not an error: the conditional update
/// simply matches nothing and the stored state stands.
pub async fn reconcile(
    pool: &SqlitePool,
    user_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<Reconciliation, ChallengeError> {
    let Some(challenge) = store::find_active_by_user(pool, user_id).await? else {
        return Ok(Reconciliation::Unchanged);
    };

    match lifecycle::due_transition(&challenge, now) {
        None => Ok(Reconciliation::Unchanged),
        Some(Transition::Completed) => {
            match store::mark_completed(pool, &challenge.id, now).await? {
                Some(_) => {
                    log::info!("Challenge {} completed for user {}", challenge.id, user_id);
                    Ok(Reconciliation::Completed)
                }
                None => {
                    log::debug!("Challenge {} changed before completion", challenge.id);
                    Ok(Reconciliation::Unchanged)
                }
            }
        }
        Some(Transition::QuitUnlocked(quit)) => {
            let mut tx = pool.begin().await?;
            let cancelled =
                store::cancel_after_unlock(&mut *tx, &challenge.id, quit.requested_at, now).await?;

            if cancelled.is_none() {
                log::debug!("Challenge {} changed before quit unlock", challenge.id);
                return Ok(Reconciliation::Unchanged);
            }

            let entry =
                QuitRequestLogRow::resolved(&challenge.id, &quit, QuitRequestOutcome::Unlocked, now);
            store::insert_log_entry(&mut *tx, &entry).await?;
            tx.commit().await?;

            log::info!(
                "Quit request unlocked; challenge {} cancelled for user {}",
                challenge.id,
                user_id
            );
            Ok(Reconciliation::QuitUnlocked)
        }
    }
}

/// Start a new challenge for the principal
pub async fn create_challenge(
    pool: &SqlitePool,
    principal: &Principal,
    request: &CreateChallengeRequest,
    now: DateTime<Utc>,
    timezone: Tz,
) -> Result<Challenge, ChallengeError> {
    // A lapsed challenge must not block a new one
    reconcile(pool, &principal.user_id, now).await?;

    // Checked before the body; the unique index still decides races
    if store::find_active_by_user(pool, &principal.user_id)
        .await?
        .is_some()
    {
        return Err(ChallengeError::Conflict(ACTIVE_CHALLENGE_EXISTS));
    }

    let valid = lifecycle::validate_create(request)?;

    let ends_at = lifecycle::compute_ends_at(now, valid.duration_days, timezone).ok_or_else(|| {
        let mut errors = ValidationErrors::new();
        errors.add("durationDays", "is out of range");
        errors
    })?;

    let row = ChallengeRow::new_active(
        &principal.user_id,
        &principal.device_id,
        valid.duration_days,
        valid.reason,
        now,
        ends_at,
    );

    match store::insert(pool, &row).await {
        Ok(()) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(ChallengeError::Conflict(ACTIVE_CHALLENGE_EXISTS));
        }
        Err(e) => return Err(e.into()),
    }

    log::info!(
        "Challenge {} created for user {} ({} days)",
        row.id,
        principal.user_id,
        row.duration_days
    );

    Ok(row.to_shared(now))
}

/// The principal's active challenge after reconciliation, if any
pub async fn get_active_challenge(
    pool: &SqlitePool,
    user_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Challenge>, ChallengeError> {
    if reconcile(pool, user_id, now).await? == Reconciliation::QuitUnlocked {
        return Ok(None);
    }

    let challenge = store::find_active_by_user(pool, user_id).await?;
    Ok(challenge.map(|c| c.to_shared(now)))
}

pub async fn cancel_challenge(
    pool: &SqlitePool,
    user_id: &Uuid,
    challenge_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<Challenge, ChallengeError> {
    reconcile(pool, user_id, now).await?;

    let mut tx = pool.begin().await?;
    let challenge = store::lock_active(&mut *tx, challenge_id, user_id)
        .await?
        .ok_or(ChallengeError::NotFound(CHALLENGE_NOT_FOUND))?;
    let pending = challenge.pending_quit();

    let cancelled = store::mark_cancelled(
        &mut *tx,
        challenge_id,
        user_id,
        pending.as_ref().map(|quit| quit.requested_at),
        now,
    )
    .await?
    .ok_or(ChallengeError::NotFound(CHALLENGE_NOT_FOUND))?;

    if let Some(quit) = pending {
        let entry = QuitRequestLogRow::resolved(
            &challenge.id,
            &quit,
            QuitRequestOutcome::ChallengeCancelled,
            now,
        );
        store::insert_log_entry(&mut *tx, &entry).await?;
    }
    tx.commit().await?;

    log::info!("Challenge {} cancelled by user {}", challenge.id, user_id);
    Ok(cancelled.to_shared(now))
}

/// Start the cooling-off period before a quit takes effect
pub async fn request_quit(
    pool: &SqlitePool,
    user_id: &Uuid,
    challenge_id: &Uuid,
    request: &CreateQuitRequest,
    now: DateTime<Utc>,
) -> Result<Challenge, ChallengeError> {
    let feeling = lifecycle::validate_feeling(&request.feeling)?;

    reconcile(pool, user_id, now).await?;

    let quit = PendingQuit {
        requested_at: now,
        unlocks_at: lifecycle::quit_unlocks_at(now),
        feeling,
    };

    if let Some(challenge) = store::attach_quit_request(pool, challenge_id, user_id, &quit).await? {
        log::info!(
            "Quit requested for challenge {}; unlocks at {}",
            challenge.id,
            quit.unlocks_at
        );
        return Ok(challenge.to_shared(now));
    }

    // Work out which precondition failed
    match store::find_by_id_for_user(pool, challenge_id, user_id).await? {
        Some(challenge) if challenge.is_active() && challenge.pending_quit().is_some() => Err(
            ChallengeError::Conflict("A quit request is already pending for this challenge"),
        ),
        _ => Err(ChallengeError::NotFound(CHALLENGE_NOT_FOUND)),
    }
}

/// Rescind a pending quit request before it unlocks
pub async fn cancel_quit_request(
    pool: &SqlitePool,
    user_id: &Uuid,
    challenge_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<Challenge, ChallengeError> {
    reconcile(pool, user_id, now).await?;

    let mut tx = pool.begin().await?;
    let challenge = store::lock_active(&mut *tx, challenge_id, user_id)
        .await?
        .ok_or(ChallengeError::NotFound(QUIT_REQUEST_NOT_FOUND))?;
    let quit = challenge
        .pending_quit()
        .ok_or(ChallengeError::NotFound(QUIT_REQUEST_NOT_FOUND))?;

    let updated = store::clear_quit_request(&mut *tx, challenge_id, user_id, quit.requested_at)
        .await?
        .ok_or(ChallengeError::NotFound(QUIT_REQUEST_NOT_FOUND))?;

    let entry = QuitRequestLogRow::resolved(
        &challenge.id,
        &quit,
        QuitRequestOutcome::CancelledByUser,
        now,
    );
    store::insert_log_entry(&mut *tx, &entry).await?;
    tx.commit().await?;

    log::info!("Quit request rescinded for challenge {}", challenge.id);
    Ok(updated.to_shared(now))
}

/// Most recent challenges, newest first; stored state is returned as-is
pub async fn list_history(
    pool: &SqlitePool,
    user_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<Challenge>, ChallengeError> {
    let challenges = store::list_by_user(pool, user_id, HISTORY_LIMIT).await?;
    Ok(challenges.iter().map(|c| c.to_shared(now)).collect())
}

/// Resolved quit requests of one of the principal's challenges
pub async fn list_quit_requests(
    pool: &SqlitePool,
    user_id: &Uuid,
    challenge_id: &Uuid,
) -> Result<Vec<QuitRequestLogEntry>, ChallengeError> {
    let challenge = store::find_by_id_for_user(pool, challenge_id, user_id)
        .await?
        .ok_or(ChallengeError::NotFound("Challenge not found"))?;

    let entries = store::list_log_entries(pool, &challenge.id).await?;
    Ok(entries.iter().map(|e| e.to_shared()).collect())
}
