//! Time rules of the challenge lifecycle.
//!
//! Everything here is pure: callers pass the current instant, so the same
//! inputs always produce the same progress, countdown and transition.

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use shared::{CreateChallengeRequest, Progress, ValidationErrors};

use crate::models::{ChallengeRow, PendingQuit};

pub const MIN_DURATION_DAYS: i64 = 7;
pub const REASON_MIN_CHARS: usize = 10;
pub const REASON_MAX_CHARS: usize = 500;
pub const FEELING_MIN_CHARS: usize = 5;
pub const FEELING_MAX_CHARS: usize = 1000;
pub const QUIT_COOLDOWN_HOURS: i64 = 24;
pub const HISTORY_LIMIT: i64 = 20;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
const MS_PER_HOUR: i64 = 60 * 60 * 1000;
const MS_PER_MINUTE: i64 = 60 * 1000;

/// Validated input for a new challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChallenge {
    pub duration_days: i64,
    pub reason: String,
}

pub fn validate_create(request: &CreateChallengeRequest) -> Result<NewChallenge, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if request.duration_days < MIN_DURATION_DAYS {
        errors.add(
            "durationDays",
            format!("must be at least {} days", MIN_DURATION_DAYS),
        );
    }

    let reason = request.reason.trim();
    let reason_len = reason.chars().count();
    if reason_len < REASON_MIN_CHARS {
        errors.add(
            "reason",
            format!("must be at least {} characters", REASON_MIN_CHARS),
        );
    } else if reason_len > REASON_MAX_CHARS {
        errors.add(
            "reason",
            format!("must be at most {} characters", REASON_MAX_CHARS),
        );
    }

    errors.into_result()?;

    Ok(NewChallenge {
        duration_days: request.duration_days,
        reason: reason.to_string(),
    })
}

pub fn validate_feeling(feeling: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let feeling = feeling.trim();
    let len = feeling.chars().count();

    if len < FEELING_MIN_CHARS {
        errors.add(
            "feeling",
            format!("must be at least {} characters", FEELING_MIN_CHARS),
        );
    } else if len > FEELING_MAX_CHARS {
        errors.add(
            "feeling",
            format!("must be at most {} characters", FEELING_MAX_CHARS),
        );
    }

    errors.into_result()?;
    Ok(feeling.to_string())
}

/// Advance `started_at` by whole calendar days in `tz`, keeping the local
/// wall-clock time. Returns `None` if the result is out of range.
pub fn compute_ends_at(started_at: DateTime<Utc>, duration_days: i64, tz: Tz) -> Option<DateTime<Utc>> {
    let days = u64::try_from(duration_days).ok()?;
    let local = started_at.with_timezone(&tz).naive_local();
    let target = local.checked_add_days(Days::new(days))?;

    resolve_local(tz, target).map(|ends_at| ends_at.with_timezone(&Utc))
}

fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // Wall time skipped by a DST gap
        LocalResult::None => {
            let shifted = naive.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&shifted).earliest()
        }
    }
}

pub fn quit_unlocks_at(requested_at: DateTime<Utc>) -> DateTime<Utc> {
    requested_at + Duration::hours(QUIT_COOLDOWN_HOURS)
}

pub fn progress(started_at: DateTime<Utc>, duration_days: i64, now: DateTime<Utc>) -> Progress {
    let elapsed_ms = (now - started_at).num_milliseconds();
    let days_elapsed = elapsed_ms.div_euclid(MS_PER_DAY).clamp(0, duration_days.max(0));
    let days_remaining = (duration_days - days_elapsed).max(0);
    let percentage = if duration_days > 0 {
        (days_elapsed as f64 / duration_days as f64 * 100.0).round() as i64
    } else {
        0
    };

    Progress {
        days_elapsed,
        days_remaining,
        percentage,
    }
}

/// Countdown until a pending quit request takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitCountdown {
    pub hours_remaining: i64,
    pub minutes_remaining: i64,
    pub is_unlocked: bool,
}

pub fn quit_countdown(unlocks_at: DateTime<Utc>, now: DateTime<Utc>) -> QuitCountdown {
    let remaining_ms = (unlocks_at - now).num_milliseconds();

    QuitCountdown {
        hours_remaining: ceil_positive(remaining_ms, MS_PER_HOUR),
        minutes_remaining: ceil_positive(remaining_ms, MS_PER_MINUTE),
        is_unlocked: remaining_ms <= 0,
    }
}

fn ceil_positive(value: i64, unit: i64) -> i64 {
    if value <= 0 {
        0
    } else {
        (value + unit - 1) / unit
    }
}

/// Time-triggered transition an active challenge is due for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The cooling-off elapsed: the challenge is cancelled
    QuitUnlocked(PendingQuit),
    /// `ends_at` passed with no pending quit request
    Completed,
}

/// Decide which transition, if any, is due at `now`.
///
/// A pending quit request blocks completion until it unlocks, and an
/// unlocked request wins over completion.
pub fn due_transition(challenge: &ChallengeRow, now: DateTime<Utc>) -> Option<Transition> {
    if !challenge.is_active() {
        return None;
    }

    match challenge.pending_quit() {
        Some(quit) if quit.unlocks_at <= now => Some(Transition::QuitUnlocked(quit)),
        Some(_) => None,
        None if challenge.ends_at <= now => Some(Transition::Completed),
        None => None,
    }
}
