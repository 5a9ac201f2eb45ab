use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Challenge Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Active,
    Cancelled,
    Completed,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Cancelled => "cancelled",
            ChallengeStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChallengeStatus::Cancelled | ChallengeStatus::Completed)
    }
}

impl FromStr for ChallengeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ChallengeStatus::Active),
            "cancelled" => Ok(ChallengeStatus::Cancelled),
            "completed" => Ok(ChallengeStatus::Completed),
            _ => Err(()),
        }
    }
}

/// Day-based progress of a challenge, computed at read time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub days_elapsed: i64,
    pub days_remaining: i64,
    pub percentage: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: Uuid,
    pub duration_days: i64,
    pub reason: String,
    pub status: ChallengeStatus,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub quit_request: Option<QuitRequest>,
    pub progress: Progress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChallengeRequest {
    pub duration_days: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveChallengeResponse {
    pub challenge: Option<Challenge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeHistoryResponse {
    pub challenges: Vec<Challenge>,
}

// ============================================================================
// Quit Request Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuitRequestStatus {
    Pending,
    CancelledByUser,
}

impl QuitRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuitRequestStatus::Pending => "pending",
            QuitRequestStatus::CancelledByUser => "cancelled_by_user",
        }
    }
}

impl FromStr for QuitRequestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(QuitRequestStatus::Pending),
            "cancelled_by_user" => Ok(QuitRequestStatus::CancelledByUser),
            _ => Err(()),
        }
    }
}

/// A pending quit request together with its unlock countdown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuitRequest {
    pub requested_at: DateTime<Utc>,
    pub unlocks_at: DateTime<Utc>,
    pub feeling: String,
    pub status: QuitRequestStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub hours_remaining: i64,
    pub minutes_remaining: i64,
    pub is_unlocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuitRequest {
    pub feeling: String,
}

/// How a quit request left its challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuitRequestOutcome {
    /// Rescinded by the user before it unlocked
    CancelledByUser,
    /// Cooling-off elapsed; the challenge was cancelled
    Unlocked,
    /// The challenge itself was cancelled while the request was pending
    ChallengeCancelled,
}

impl QuitRequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuitRequestOutcome::CancelledByUser => "cancelled_by_user",
            QuitRequestOutcome::Unlocked => "unlocked",
            QuitRequestOutcome::ChallengeCancelled => "challenge_cancelled",
        }
    }
}

impl FromStr for QuitRequestOutcome {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cancelled_by_user" => Ok(QuitRequestOutcome::CancelledByUser),
            "unlocked" => Ok(QuitRequestOutcome::Unlocked),
            "challenge_cancelled" => Ok(QuitRequestOutcome::ChallengeCancelled),
            _ => Err(()),
        }
    }
}

/// A quit request that has left its challenge; `outcome` says how
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuitRequestLogEntry {
    pub id: Uuid,
    pub challenge_id: Uuid,
    pub requested_at: DateTime<Utc>,
    pub unlocks_at: DateTime<Utc>,
    pub feeling: String,
    pub outcome: QuitRequestOutcome,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuitRequestLogResponse {
    pub quit_requests: Vec<QuitRequestLogEntry>,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Field-level validation messages, keyed by request field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("invalid input in {} field(s)", .fields.len())]
pub struct ValidationErrors {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Ok when no field failed, otherwise the collected errors
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationErrors>,
}

impl ApiError {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(details: ValidationErrors) -> Self {
        Self {
            error: "validation_error".to_string(),
            message: "Invalid request data".to_string(),
            details: Some(details),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_status_from_str() {
        assert_eq!("active".parse(), Ok(ChallengeStatus::Active));
        assert_eq!("CANCELLED".parse(), Ok(ChallengeStatus::Cancelled));
        assert_eq!("Completed".parse(), Ok(ChallengeStatus::Completed));
        assert!("paused".parse::<ChallengeStatus>().is_err());
    }

    #[test]
    fn test_challenge_status_terminal() {
        assert!(!ChallengeStatus::Active.is_terminal());
        assert!(ChallengeStatus::Cancelled.is_terminal());
        assert!(ChallengeStatus::Completed.is_terminal());
    }

    #[test]
    fn test_quit_request_outcome_from_str() {
        assert_eq!("cancelled_by_user".parse(), Ok(QuitRequestOutcome::CancelledByUser));
        assert_eq!("UNLOCKED".parse(), Ok(QuitRequestOutcome::Unlocked));
        assert_eq!(
            "challenge_cancelled".parse(),
            Ok(QuitRequestOutcome::ChallengeCancelled)
        );
        assert!("expired".parse::<QuitRequestOutcome>().is_err());
    }

    #[test]
    fn test_quit_request_outcome_serializes_snake_case() {
        let json = serde_json::to_value(QuitRequestOutcome::ChallengeCancelled).unwrap();
        assert_eq!(json, "challenge_cancelled");
        assert_eq!(
            QuitRequestOutcome::ChallengeCancelled.as_str(),
            "challenge_cancelled"
        );
    }

    #[test]
    fn test_create_challenge_request_uses_camel_case() {
        let request: CreateChallengeRequest =
            serde_json::from_str(r#"{"durationDays": 7, "reason": "Quitting sugar"}"#).unwrap();
        assert_eq!(request.duration_days, 7);
        assert_eq!(request.reason, "Quitting sugar");
    }

    #[test]
    fn test_create_challenge_request_rejects_fractional_days() {
        let result =
            serde_json::from_str::<CreateChallengeRequest>(r#"{"durationDays": 7.5, "reason": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_errors_collects_per_field() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add("reason", "too short");
        errors.add("reason", "second");
        errors.add("durationDays", "too small");

        assert_eq!(errors.fields["reason"].len(), 2);
        assert_eq!(errors.to_string(), "invalid input in 2 field(s)");
        assert!(errors.into_result().is_err());
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_api_error_omits_empty_details() {
        let json = serde_json::to_value(ApiError::new("not_found", "Challenge not found")).unwrap();
        assert_eq!(json["error"], "not_found");
        assert!(json.get("details").is_none());

        let mut errors = ValidationErrors::new();
        errors.add("feeling", "too short");
        let json = serde_json::to_value(ApiError::validation(errors)).unwrap();
        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["details"]["feeling"][0], "too short");
    }
}
