// libs/student-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub year_level: i32,
    pub department: String,
    pub course: String,
    pub program: String,
    pub assigned_consultant_id: Option<Uuid>,
    /// Derived cache of completed consultations; authoritative value is
    /// the count of completed appointments, restored by reconciliation.
    pub sessions_completed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn has_declared_program(&self) -> bool {
        !self.program.trim().is_empty() && !self.program.eq_ignore_ascii_case("undecided")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStudentRequest {
    pub year_level: Option<i32>,
    pub department: Option<String>,
    pub course: Option<String>,
    pub program: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StudentError {
    #[error("Student not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not authorized to manage this profile")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
