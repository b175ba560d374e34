// libs/appointment-cell/src/services/maintenance.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;
use student_cell::models::Student;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, LapseSweepReport, ReconciliationReport,
};
use crate::services::lifecycle::is_past_due;

/// Explicit maintenance operations over the appointment table. Both are
/// idempotent: re-running them against an already-swept or already-
/// reconciled dataset changes nothing.
pub struct MaintenanceService {
    supabase: Arc<SupabaseClient>,
}

impl MaintenanceService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Auto-complete past-due appointments. A pending or confirmed
    /// appointment whose interval has fully elapsed becomes `completed`,
    /// and the student's session counter is credited once. The status
    /// PATCH is guarded on the still-active statuses so a concurrent
    /// sweep or actor transition cannot double-apply.
    pub async fn lapse_past_due(&self, auth_token: &str) -> Result<LapseSweepReport, AppointmentError> {
        let now = Utc::now().naive_utc();
        debug!("Running lapse sweep at {}", now);

        let today = now.date();
        let path = format!(
            "/rest/v1/appointments?status=in.(pending,confirmed)&date=lte.{}&order=date.asc",
            today
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let candidates: Vec<Appointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        let mut report = LapseSweepReport {
            examined: candidates.len(),
            lapsed: 0,
        };

        for appointment in candidates {
            if !is_past_due(&appointment, now) {
                continue;
            }

            if self.complete_lapsed(&appointment, auth_token).await? {
                report.lapsed += 1;
            }
        }

        info!(
            "Lapse sweep finished: {} examined, {} auto-completed",
            report.examined, report.lapsed
        );
        Ok(report)
    }

    /// Rebuild every student's `sessions_completed` from the authoritative
    /// count of their completed appointments. This is the recovery path
    /// for any drift in the incremental counter.
    pub async fn reconcile_sessions(
        &self,
        auth_token: &str,
    ) -> Result<ReconciliationReport, AppointmentError> {
        debug!("Reconciling session counters");

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, "/rest/v1/students?order=id.asc", Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let students: Vec<Student> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Student>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse students: {}", e)))?;

        let mut report = ReconciliationReport {
            students_checked: students.len(),
            students_adjusted: 0,
        };

        for student in students {
            let completed = self.count_completed(student.id, auth_token).await?;
            if completed == student.sessions_completed {
                continue;
            }

            warn!(
                "Session counter drift for student {}: recorded {}, actual {}",
                student.id, student.sessions_completed, completed
            );

            let update_data = json!({
                "sessions_completed": completed,
                "updated_at": Utc::now().to_rfc3339()
            });
            let path = format!("/rest/v1/students?id=eq.{}", student.id);
            self.supabase
                .execute(Method::PATCH, &path, Some(auth_token), Some(update_data))
                .await
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

            report.students_adjusted += 1;
        }

        info!(
            "Reconciliation finished: {} checked, {} adjusted",
            report.students_checked, report.students_adjusted
        );
        Ok(report)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// Returns true when this call actually completed the appointment.
    /// The guarded PATCH comes back empty if another writer got there
    /// first, in which case no counter credit happens here.
    async fn complete_lapsed(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.(pending,confirmed)",
            appointment.id
        );
        let update_data = json!({
            "status": AppointmentStatus::Completed.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(false);
        }

        self.credit_session(appointment.student_id, auth_token).await?;
        debug!("Appointment {} auto-completed by lapse sweep", appointment.id);
        Ok(true)
    }

    async fn credit_session(&self, student_id: Uuid, auth_token: &str) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/students?id=eq.{}", student_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let student: Student = match result.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse student: {}", e))
            })?,
            None => return Err(AppointmentError::StudentNotFound),
        };

        let update_data = json!({
            "sessions_completed": student.sessions_completed + 1,
            "updated_at": Utc::now().to_rfc3339()
        });
        self.supabase
            .execute(Method::PATCH, &path, Some(auth_token), Some(update_data))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn count_completed(&self, student_id: Uuid, auth_token: &str) -> Result<u32, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?student_id=eq.{}&status=eq.completed&select=id",
            student_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(result.len() as u32)
    }
}
