// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub consultant_id: Uuid,
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub topic: String,
    pub research_title: Option<String>,
    pub status: AppointmentStatus,
    pub consultant_marked_as: Option<CompletionMark>,
    pub student_dispute_remark: Option<String>,
    pub disputed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Start of the booked interval as a single point in institutional time.
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// End of the half-open interval `[start, start + duration)`.
    pub fn end_datetime(&self) -> NaiveDateTime {
        self.start_datetime() + Duration::minutes(self.duration_minutes as i64)
    }

    /// Active appointments are the ones that occupy calendar space.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }
}

/// Closed status set. `cancelled` and `completed` are terminal; a declined
/// request terminates as `cancelled` (there is no separate rejected value).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    PendingStudentReview,
    Disputed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::PendingStudentReview => write!(f, "pending_student_review"),
            AppointmentStatus::Disputed => write!(f, "disputed"),
        }
    }
}

/// The consultant's completion assessment, recorded when a confirmed
/// appointment is marked and later confirmed or disputed by the student.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMark {
    Completed,
    NotCompleted,
}

impl fmt::Display for CompletionMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionMark::Completed => write!(f, "completed"),
            CompletionMark::NotCompleted => write!(f, "not_completed"),
        }
    }
}

// ==============================================================================
// LIFECYCLE ACTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AppointmentAction {
    /// Consultant accepts a pending request.
    Accept,
    /// Consultant declines a pending request.
    Reject,
    /// Student withdraws a request that is still pending.
    Cancel,
    /// Consultant asserts the consultation took place.
    MarkCompleted,
    /// Consultant asserts the consultation did not take place.
    MarkNotCompleted,
    /// Student agrees with the consultant's assessment.
    Confirm,
    /// Student contests the consultant's assessment.
    Dispute { remark: String },
    /// Admin settles a disputed appointment.
    AdminResolve { decision: ResolutionDecision },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionDecision {
    MarkCompleted,
    MarkNotCompleted,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub consultant_id: Uuid,
    /// Calendar date, `%Y-%m-%d`.
    pub date: String,
    /// Start of the first booked hour, `%H:%M`.
    pub time: String,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: i32,
    pub topic: String,
    pub research_title: Option<String>,
}

fn default_duration_hours() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub student_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LapseSweepReport {
    pub examined: usize,
    pub lapsed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub students_checked: usize,
    pub students_adjusted: usize,
}

// ==============================================================================
// VALIDATION RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingRules {
    pub min_duration_hours: i32,
    pub max_duration_hours: i32,
    pub min_dispute_remark_chars: usize,
    pub lock_retry_attempts: u32,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            min_duration_hours: 1,
            max_duration_hours: 4,
            min_dispute_remark_chars: 10,
            lock_retry_attempts: 3,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Consultant not found")]
    ConsultantNotFound,

    #[error("Student not found")]
    StudentNotFound,

    #[error("Consultant is not available for booking")]
    ConsultantUnavailable,

    #[error("You already have a pending request with this consultant")]
    DuplicateRequest,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Requested date and time have already passed")]
    PastDate,

    #[error("Outside consultant availability: {0}")]
    OutsideAvailability(String),

    #[error("Requested time conflicts with an existing appointment")]
    ConflictDetected,

    #[error("Action not allowed while the appointment is {0}")]
    InvalidTransition(AppointmentStatus),

    #[error("Feedback has already been submitted for this appointment")]
    FeedbackAlreadySubmitted,

    #[error("Not authorized to perform this action")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
