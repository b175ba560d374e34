// libs/consultant-cell/src/models.rs
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE CONSULTANT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultant {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub contact_number: String,
    pub expertise: String,
    pub workplace: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A consultant's published availability/rate offer. One active listing
/// per consultant; deactivated listings are kept, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketListing {
    pub id: Uuid,
    pub consultant_id: Uuid,
    pub expertise: Vec<String>,
    pub profession: String,
    pub available_from: NaiveTime,
    pub available_to: Option<NaiveTime>,
    pub available_days: Vec<String>,
    pub rate_per_hour: u32,
    pub meeting_place: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketListing {
    /// The bookable window, present only when both bounds are declared.
    pub fn working_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        self.available_to.map(|to| (self.available_from, to))
    }

    /// Weekday names are matched case-insensitively ("monday" == "Monday").
    pub fn covers_weekday(&self, weekday: Weekday) -> bool {
        let name = weekday_name(weekday);
        self.available_days
            .iter()
            .any(|day| day.eq_ignore_ascii_case(name))
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// A booked interval on a consultant's calendar, as read back from the
/// appointments table. Only the fields the slot computation needs.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedInterval {
    pub date: chrono::NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub status: String,
}

impl BookedInterval {
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_str(), "pending" | "confirmed")
    }
}

// ==============================================================================
// VERIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub id: Uuid,
    pub consultant_id: Uuid,
    pub contact_number: String,
    pub expertise: String,
    pub workplace: String,
    pub qualification: String,
    pub status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Pending => write!(f, "pending"),
            VerificationStatus::Approved => write!(f, "approved"),
            VerificationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListingRequest {
    pub expertise: Vec<String>,
    pub profession: String,
    pub available_from: NaiveTime,
    pub available_to: Option<NaiveTime>,
    pub available_days: Vec<String>,
    pub rate_per_hour: u32,
    pub meeting_place: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateListingRequest {
    pub expertise: Option<Vec<String>>,
    pub profession: Option<String>,
    pub available_from: Option<NaiveTime>,
    pub available_to: Option<NaiveTime>,
    pub available_days: Option<Vec<String>>,
    pub rate_per_hour: Option<u32>,
    pub meeting_place: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitVerificationRequest {
    pub contact_number: String,
    pub expertise: String,
    pub workplace: String,
    pub qualification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewVerificationRequest {
    pub decision: ReviewDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsultantError {
    #[error("Consultant not found")]
    NotFound,

    #[error("Consultant has no active listing")]
    ListingNotFound,

    #[error("Consultant is not verified")]
    NotVerified,

    #[error("Consultant already has an active listing")]
    ActiveListingExists,

    #[error("Verification request not found")]
    VerificationNotFound,

    #[error("Verification request has already been reviewed")]
    AlreadyReviewed,

    #[error("A verification request is already pending review")]
    VerificationPending,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not authorized to manage this resource")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
