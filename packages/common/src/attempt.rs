//! Lifecycle rules for assessment attempts and assignment submissions.
//!
//! Expiry is evaluated lazily: nothing sweeps in the background, so every
//! read, start and submit asks these functions what the row should look like
//! at `now` and persists the answer.

use chrono::{DateTime, Duration, Utc};

use crate::status::{AttemptStatus, SubmissionStatus};

/// Assessment due date if set, else the owning material's due date.
pub fn effective_due_date(
    item_due: Option<DateTime<Utc>>,
    material_due: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    item_due.or(material_due)
}

/// `started_at + time_limit` when a limit is configured.
pub fn time_limit_end(
    started_at: DateTime<Utc>,
    time_limit_minutes: Option<i32>,
) -> Option<DateTime<Utc>> {
    time_limit_minutes.map(|minutes| started_at + Duration::minutes(i64::from(minutes)))
}

/// Late work is accepted and only tagged.
pub fn is_late(submitted_at: DateTime<Utc>, due: Option<DateTime<Utc>>) -> bool {
    due.is_some_and(|due| submitted_at > due)
}

/// The persisted fields that drive attempt decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptState {
    pub status: AttemptStatus,
    pub time_limit_end: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl AttemptState {
    /// An in-progress attempt whose time limit has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == AttemptStatus::InProgress
            && self.submitted_at.is_none()
            && self.time_limit_end.is_some_and(|end| now > end)
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
            || matches!(self.status, AttemptStatus::Submitted | AttemptStatus::Graded)
    }
}

/// Outcome of a "start" request for an (assessment, student) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// No attempt yet; create one.
    Create,
    /// Return the existing in-progress attempt.
    Resume,
    /// The in-progress attempt ran out of time; mark it expired and refuse.
    Expire,
    /// Already expired earlier; refuse without a new attempt.
    AlreadyExpired,
    /// One submission per assessment, regardless of score.
    AlreadySubmitted,
}

pub fn decide_start(existing: Option<&AttemptState>, now: DateTime<Utc>) -> StartDecision {
    let Some(attempt) = existing else {
        return StartDecision::Create;
    };
    if attempt.is_submitted() {
        return StartDecision::AlreadySubmitted;
    }
    if attempt.status == AttemptStatus::Expired {
        return StartDecision::AlreadyExpired;
    }
    if attempt.is_overdue(now) {
        return StartDecision::Expire;
    }
    StartDecision::Resume
}

/// Outcome of a "submit" request on an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitDecision {
    Accept { late: bool },
    Expire,
    AlreadyExpired,
    AlreadySubmitted,
}

pub fn decide_submit(
    attempt: &AttemptState,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SubmitDecision {
    if attempt.is_submitted() {
        return SubmitDecision::AlreadySubmitted;
    }
    if attempt.status == AttemptStatus::Expired {
        return SubmitDecision::AlreadyExpired;
    }
    if attempt.is_overdue(now) {
        return SubmitDecision::Expire;
    }
    SubmitDecision::Accept {
        late: is_late(now, due),
    }
}

/// Why an edit was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRejection {
    Graded,
    AlreadyEdited,
    PastDue,
    NotSubmitted,
    Expired,
}

impl EditRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Graded => "Graded work can no longer be edited",
            Self::AlreadyEdited => "Submitted work can only be edited once before grading",
            Self::PastDue => "The due date has passed; editing is closed",
            Self::NotSubmitted => "Only submitted work can be edited",
            Self::Expired => "The attempt expired before it was submitted",
        }
    }
}

fn check_pending_edit(
    edited_at: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), EditRejection> {
    if edited_at.is_some() {
        return Err(EditRejection::AlreadyEdited);
    }
    match due {
        Some(due) if now >= due => Err(EditRejection::PastDue),
        _ => Ok(()),
    }
}

/// Edits are allowed once, while submitted, ungraded and before the due date.
///
/// `edited_at` is the time of the previous edit, if any.
pub fn check_attempt_edit(
    status: AttemptStatus,
    edited_at: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), EditRejection> {
    match status {
        AttemptStatus::Graded => Err(EditRejection::Graded),
        AttemptStatus::InProgress => Err(EditRejection::NotSubmitted),
        AttemptStatus::Expired => Err(EditRejection::Expired),
        AttemptStatus::Submitted => check_pending_edit(edited_at, due, now),
    }
}

pub fn check_submission_edit(
    status: SubmissionStatus,
    edited_at: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), EditRejection> {
    match status {
        SubmissionStatus::Graded => Err(EditRejection::Graded),
        SubmissionStatus::Submitted => check_pending_edit(edited_at, due, now),
    }
}

/// Re-grading overwrites, so both submitted and graded attempts accept a grade.
pub fn can_grade_attempt(status: AttemptStatus) -> bool {
    matches!(status, AttemptStatus::Submitted | AttemptStatus::Graded)
}
