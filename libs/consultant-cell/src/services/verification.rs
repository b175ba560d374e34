// libs/consultant-cell/src/services/verification.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    ConsultantError, ReviewDecision, SubmitVerificationRequest, Verification, VerificationStatus,
};

/// Admin-reviewed verification workflow. Approval is the only path that
/// flips `consultants.is_verified`; rejection records the outcome and the
/// consultant may resubmit, so history accumulates rather than being
/// overwritten.
pub struct VerificationService {
    supabase: Arc<SupabaseClient>,
}

impl VerificationService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn submit(
        &self,
        consultant_id: Uuid,
        request: SubmitVerificationRequest,
        auth_token: &str,
    ) -> Result<Verification, ConsultantError> {
        debug!("Submitting verification request for consultant {}", consultant_id);

        if request.expertise.trim().is_empty() {
            return Err(ConsultantError::ValidationError(
                "Expertise is required".to_string(),
            ));
        }

        // One open request at a time; a rejected one can be followed up.
        let history = self.history(consultant_id, auth_token).await?;
        if history
            .first()
            .map(|v| v.status == VerificationStatus::Pending)
            .unwrap_or(false)
        {
            return Err(ConsultantError::VerificationPending);
        }

        let verification_data = json!({
            "consultant_id": consultant_id,
            "contact_number": request.contact_number,
            "expertise": request.expertise,
            "workplace": request.workplace,
            "qualification": request.qualification,
            "status": VerificationStatus::Pending.to_string(),
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/verifications",
                Some(auth_token),
                Some(verification_data),
                Some(headers),
            )
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ConsultantError::DatabaseError(
                "Failed to create verification request".to_string(),
            ));
        }

        let verification: Verification = serde_json::from_value(result[0].clone())
            .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse verification: {}", e)))?;

        info!("Verification request {} submitted by consultant {}", verification.id, consultant_id);
        Ok(verification)
    }

    /// Most recent first; the head row is the one that gates bookability.
    pub async fn history(
        &self,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Verification>, ConsultantError> {
        let path = format!(
            "/rest/v1/verifications?consultant_id=eq.{}&order=created_at.desc",
            consultant_id
        );
        self.fetch_verifications(&path, auth_token).await
    }

    pub async fn pending_queue(&self, auth_token: &str) -> Result<Vec<Verification>, ConsultantError> {
        let path = "/rest/v1/verifications?status=eq.pending&order=created_at.asc".to_string();
        self.fetch_verifications(&path, auth_token).await
    }

    /// Admin decision on a pending request. Approving flips the
    /// consultant's verified flag; a second review of the same request is
    /// rejected rather than silently reapplied.
    pub async fn review(
        &self,
        verification_id: Uuid,
        decision: ReviewDecision,
        auth_token: &str,
    ) -> Result<Verification, ConsultantError> {
        debug!("Reviewing verification request {}", verification_id);

        let current = self.get_verification(verification_id, auth_token).await?;
        if current.status != VerificationStatus::Pending {
            warn!(
                "Verification {} already reviewed as {}",
                verification_id, current.status
            );
            return Err(ConsultantError::AlreadyReviewed);
        }

        let new_status = match decision {
            ReviewDecision::Approve => VerificationStatus::Approved,
            ReviewDecision::Reject => VerificationStatus::Rejected,
        };

        let update_data = json!({
            "status": new_status.to_string(),
            "reviewed_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/verifications?id=eq.{}", verification_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ConsultantError::DatabaseError(
                "Failed to update verification request".to_string(),
            ));
        }

        let reviewed: Verification = serde_json::from_value(result[0].clone())
            .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse verification: {}", e)))?;

        if reviewed.status == VerificationStatus::Approved {
            self.mark_consultant_verified(reviewed.consultant_id, auth_token)
                .await?;
        }

        info!(
            "Verification {} reviewed: {} (consultant {})",
            verification_id, reviewed.status, reviewed.consultant_id
        );
        Ok(reviewed)
    }

    async fn mark_consultant_verified(
        &self,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ConsultantError> {
        let path = format!("/rest/v1/consultants?id=eq.{}", consultant_id);
        let update_data = json!({
            "is_verified": true,
            "updated_at": Utc::now().to_rfc3339()
        });

        self.supabase
            .execute(Method::PATCH, &path, Some(auth_token), Some(update_data))
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        info!("Consultant {} marked as verified", consultant_id);
        Ok(())
    }

    async fn get_verification(
        &self,
        verification_id: Uuid,
        auth_token: &str,
    ) -> Result<Verification, ConsultantError> {
        let path = format!("/rest/v1/verifications?id=eq.{}", verification_id);
        let result = self.fetch_verifications(&path, auth_token).await?;
        result
            .into_iter()
            .next()
            .ok_or(ConsultantError::VerificationNotFound)
    }

    async fn fetch_verifications(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Verification>, ConsultantError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Verification>, _>>()
            .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse verifications: {}", e)))
    }
}
