use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use shared::{ChallengeStatus, QuitRequestOutcome, QuitRequestStatus};

use crate::services::lifecycle;

/// Database model for challenges
///
/// A pending quit request lives in the `quit_*` columns, which are either
/// all set or all NULL.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChallengeRow {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub duration_days: i64,
    pub reason: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub quit_requested_at: Option<DateTime<Utc>>,
    pub quit_unlocks_at: Option<DateTime<Utc>>,
    pub quit_feeling: Option<String>,
    pub quit_status: Option<String>,
}

/// Quit request attached to an active challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuit {
    pub requested_at: DateTime<Utc>,
    pub unlocks_at: DateTime<Utc>,
    pub feeling: String,
}

impl ChallengeRow {
    /// A freshly started challenge with no quit request
    pub fn new_active(
        user_id: &Uuid,
        device_id: &str,
        duration_days: i64,
        reason: String,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            duration_days,
            reason,
            status: ChallengeStatus::Active.as_str().to_string(),
            started_at,
            ends_at,
            cancelled_at: None,
            completed_at: None,
            created_at: started_at,
            quit_requested_at: None,
            quit_unlocks_at: None,
            quit_feeling: None,
            quit_status: None,
        }
    }

    /// Stored status; an unknown value is treated as cancelled so the row
    /// is never transitioned
    pub fn status(&self) -> ChallengeStatus {
        self.status.parse().unwrap_or_else(|_| {
            log::warn!(
                "Challenge {} has unknown status {:?}; treating it as cancelled",
                self.id,
                self.status
            );
            ChallengeStatus::Cancelled
        })
    }

    pub fn is_active(&self) -> bool {
        !self.status().is_terminal()
    }

    pub fn pending_quit(&self) -> Option<PendingQuit> {
        if self.quit_status.as_deref() != Some(QuitRequestStatus::Pending.as_str()) {
            return None;
        }

        Some(PendingQuit {
            requested_at: self.quit_requested_at?,
            unlocks_at: self.quit_unlocks_at?,
            feeling: self.quit_feeling.clone()?,
        })
    }

    /// Wire representation with progress and countdown evaluated at `now`
    pub fn to_shared(&self, now: DateTime<Utc>) -> shared::Challenge {
        let quit_request = self.pending_quit().map(|quit| {
            let countdown = lifecycle::quit_countdown(quit.unlocks_at, now);
            shared::QuitRequest {
                requested_at: quit.requested_at,
                unlocks_at: quit.unlocks_at,
                feeling: quit.feeling,
                status: QuitRequestStatus::Pending,
                cancelled_at: None,
                hours_remaining: countdown.hours_remaining,
                minutes_remaining: countdown.minutes_remaining,
                is_unlocked: countdown.is_unlocked,
            }
        });

        shared::Challenge {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            duration_days: self.duration_days,
            reason: self.reason.clone(),
            status: self.status(),
            started_at: self.started_at,
            ends_at: self.ends_at,
            cancelled_at: self.cancelled_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            quit_request,
            progress: lifecycle::progress(self.started_at, self.duration_days, now),
        }
    }
}

/// Database model for resolved quit requests
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuitRequestLogRow {
    pub id: String,
    pub challenge_id: String,
    pub requested_at: DateTime<Utc>,
    pub unlocks_at: DateTime<Utc>,
    pub feeling: String,
    pub outcome: String,
    pub resolved_at: DateTime<Utc>,
}

impl QuitRequestLogRow {
    pub fn resolved(
        challenge_id: &str,
        quit: &PendingQuit,
        outcome: QuitRequestOutcome,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            challenge_id: challenge_id.to_string(),
            requested_at: quit.requested_at,
            unlocks_at: quit.unlocks_at,
            feeling: quit.feeling.clone(),
            outcome: outcome.as_str().to_string(),
            resolved_at,
        }
    }

    pub fn to_shared(&self) -> shared::QuitRequestLogEntry {
        let outcome = self
            .outcome
            .parse()
            .unwrap_or(QuitRequestOutcome::CancelledByUser);

        shared::QuitRequestLogEntry {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            challenge_id: Uuid::parse_str(&self.challenge_id).unwrap_or_default(),
            requested_at: self.requested_at,
            unlocks_at: self.unlocks_at,
            feeling: self.feeling.clone(),
            outcome,
            resolved_at: self.resolved_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn active_row() -> ChallengeRow {
        ChallengeRow::new_active(
            &Uuid::new_v4(),
            "device-1",
            7,
            "Quitting sugar".to_string(),
            started(),
            started() + Duration::days(7),
        )
    }

    #[test]
    fn test_new_active_row() {
        let row = active_row();

        assert!(row.is_active());
        assert_eq!(row.created_at, row.started_at);
        assert!(row.pending_quit().is_none());
        assert!(row.cancelled_at.is_none());
        assert!(row.completed_at.is_none());
    }

    #[test]
    fn test_challenge_row_to_shared() {
        let row = active_row();
        let now = started() + Duration::days(3) + Duration::hours(2);

        let challenge = row.to_shared(now);

        assert_eq!(challenge.id.to_string(), row.id);
        assert_eq!(challenge.status, ChallengeStatus::Active);
        assert_eq!(challenge.reason, "Quitting sugar");
        assert!(challenge.quit_request.is_none());
        assert_eq!(challenge.progress.days_elapsed, 3);
        assert_eq!(challenge.progress.days_remaining, 4);
        assert_eq!(challenge.progress.percentage, 43);
    }

    #[test]
    fn test_pending_quit_to_shared_countdown() {
        let mut row = active_row();
        let requested_at = started() + Duration::days(1);
        row.quit_requested_at = Some(requested_at);
        row.quit_unlocks_at = Some(requested_at + Duration::hours(24));
        row.quit_feeling = Some("stressed today".to_string());
        row.quit_status = Some("pending".to_string());

        let quit = row
            .to_shared(requested_at + Duration::minutes(90))
            .quit_request
            .unwrap();

        assert_eq!(quit.status, QuitRequestStatus::Pending);
        assert_eq!(quit.feeling, "stressed today");
        assert_eq!(quit.hours_remaining, 23);
        assert_eq!(quit.minutes_remaining, 22 * 60 + 30);
        assert!(!quit.is_unlocked);
        assert!(quit.cancelled_at.is_none());
    }

    #[test]
    fn test_partial_quit_columns_are_ignored() {
        let mut row = active_row();
        row.quit_status = Some("pending".to_string());

        assert!(row.pending_quit().is_none());
    }

    #[test]
    fn test_unknown_status_is_not_active() {
        let mut row = active_row();
        row.status = "paused".to_string();

        assert_eq!(row.status(), ChallengeStatus::Cancelled);
        assert!(!row.is_active());
        assert!(lifecycle::due_transition(&row, started() + Duration::days(30)).is_none());
    }

    #[test]
    fn test_terminal_rows_are_not_active() {
        let mut row = active_row();
        row.status = "completed".to_string();
        assert!(!row.is_active());

        row.status = "cancelled".to_string();
        assert!(!row.is_active());
    }

    #[test]
    fn test_quit_log_row_to_shared() {
        let quit = PendingQuit {
            requested_at: started(),
            unlocks_at: started() + Duration::hours(24),
            feeling: "rough evening".to_string(),
        };
        let challenge_id = Uuid::new_v4();
        let row = QuitRequestLogRow::resolved(
            &challenge_id.to_string(),
            &quit,
            QuitRequestOutcome::CancelledByUser,
            started() + Duration::hours(2),
        );

        let entry = row.to_shared();

        assert_eq!(entry.challenge_id, challenge_id);
        assert_eq!(entry.outcome, QuitRequestOutcome::CancelledByUser);
        assert_eq!(entry.feeling, "rough evening");
        assert_eq!(entry.resolved_at, started() + Duration::hours(2));
    }
}
