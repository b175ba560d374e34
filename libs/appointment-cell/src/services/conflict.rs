// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError};

/// Which side of a proposed booking to check. A consultant must not be
/// double-booked, and a student must not overlap themselves across
/// different consultants either.
#[derive(Debug, Clone, Copy)]
pub enum ConflictParty {
    Consultant(Uuid),
    Student(Uuid),
}

/// Conflicts found for one proposed interval, split by party so the
/// caller can report which side collided.
#[derive(Debug, Clone, Default)]
pub struct ConflictReport {
    pub consultant_conflicts: Vec<Appointment>,
    pub student_conflicts: Vec<Appointment>,
}

impl ConflictReport {
    pub fn has_conflict(&self) -> bool {
        !self.consultant_conflicts.is_empty() || !self.student_conflicts.is_empty()
    }
}

/// Half-open interval overlap: `[start_a, end_a)` and `[start_b, end_b)`
/// collide iff `start_a < end_b && start_b < end_a`. Equal start times are
/// a special case of this, not the definition.
pub fn intervals_overlap(
    start_a: NaiveDateTime,
    end_a: NaiveDateTime,
    start_b: NaiveDateTime,
    end_b: NaiveDateTime,
) -> bool {
    start_a < end_b && start_b < end_a
}

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Conflicts on both sides of a proposed booking.
    pub async fn check_for_booking(
        &self,
        consultant_id: Uuid,
        student_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: i32,
        auth_token: &str,
    ) -> Result<ConflictReport, AppointmentError> {
        let consultant_conflicts = self
            .find_conflicts(
                ConflictParty::Consultant(consultant_id),
                date,
                start_time,
                duration_minutes,
                None,
                auth_token,
            )
            .await?;

        let student_conflicts = self
            .find_conflicts(
                ConflictParty::Student(student_id),
                date,
                start_time,
                duration_minutes,
                None,
                auth_token,
            )
            .await?;

        let report = ConflictReport {
            consultant_conflicts,
            student_conflicts,
        };

        if report.has_conflict() {
            warn!(
                "Booking conflict on {} at {}: {} consultant-side, {} student-side",
                date,
                start_time,
                report.consultant_conflicts.len(),
                report.student_conflicts.len()
            );
        }

        Ok(report)
    }

    /// Existing pending/confirmed appointments of one party that overlap
    /// the proposed interval on the given date. Empty means no conflict.
    pub async fn find_conflicts(
        &self,
        party: ConflictParty,
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: i32,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!(
            "Checking conflicts for {:?} on {} from {} ({} min)",
            party, date, start_time, duration_minutes
        );

        let existing = self
            .get_active_appointments(party, date, exclude_appointment_id, auth_token)
            .await?;

        let proposed_start = date.and_time(start_time);
        let proposed_end = proposed_start + Duration::minutes(duration_minutes as i64);

        let conflicting = existing
            .into_iter()
            .filter(|appointment| {
                intervals_overlap(
                    proposed_start,
                    proposed_end,
                    appointment.start_datetime(),
                    appointment.end_datetime(),
                )
            })
            .collect();

        Ok(conflicting)
    }

    async fn get_active_appointments(
        &self,
        party: ConflictParty,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let party_filter = match party {
            ConflictParty::Consultant(id) => format!("consultant_id=eq.{}", id),
            ConflictParty::Student(id) => format!("student_id=eq.{}", id),
        };

        let mut query_parts = vec![
            party_filter,
            format!("date=eq.{}", date),
            "status=in.(pending,confirmed)".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=time.asc",
            query_parts.join("&")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}
