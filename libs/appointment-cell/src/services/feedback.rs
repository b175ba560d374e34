// libs/appointment-cell/src/services/feedback.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, Feedback, SubmitFeedbackRequest,
};

/// One feedback record per completed appointment, written once by the
/// student and immutable afterwards.
pub struct FeedbackService {
    supabase: Arc<SupabaseClient>,
}

impl FeedbackService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn submit(
        &self,
        appointment_id: Uuid,
        student_id: Uuid,
        request: SubmitFeedbackRequest,
        auth_token: &str,
    ) -> Result<Feedback, AppointmentError> {
        debug!(
            "Feedback submission for appointment {} by student {}",
            appointment_id, student_id
        );

        if !(1..=5).contains(&request.rating) {
            return Err(AppointmentError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        if appointment.student_id != student_id {
            return Err(AppointmentError::Unauthorized);
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(AppointmentError::InvalidTransition(appointment.status));
        }

        if self.feedback_exists(appointment_id, auth_token).await? {
            return Err(AppointmentError::FeedbackAlreadySubmitted);
        }

        let feedback_data = json!({
            "appointment_id": appointment_id,
            "student_id": student_id,
            "rating": request.rating,
            "comment": request.comment,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/feedback",
                Some(auth_token),
                Some(feedback_data),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError(
                "Failed to create feedback".to_string(),
            ));
        }

        let feedback: Feedback = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse feedback: {}", e)))?;

        info!("Feedback {} recorded for appointment {}", feedback.id, appointment_id);
        Ok(feedback)
    }

    async fn feedback_exists(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/feedback?appointment_id=eq.{}&limit=1",
            appointment_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }
}
