// libs/consultant-cell/src/services/listing.rs
use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Consultant, ConsultantError, CreateListingRequest, MarketListing, UpdateListingRequest,
};

pub struct ListingService {
    supabase: Arc<SupabaseClient>,
}

impl ListingService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Publish a new market listing. Only verified consultants may list,
    /// and a consultant holds at most one active listing at a time.
    pub async fn create_listing(
        &self,
        consultant_id: Uuid,
        request: CreateListingRequest,
        auth_token: &str,
    ) -> Result<MarketListing, ConsultantError> {
        debug!("Creating market listing for consultant {}", consultant_id);

        let consultant = self.get_consultant(consultant_id, auth_token).await?;
        if !consultant.is_verified {
            return Err(ConsultantError::NotVerified);
        }

        validate_window(request.available_from, request.available_to)?;
        if request.rate_per_hour == 0 {
            return Err(ConsultantError::ValidationError(
                "Rate per hour must be a positive amount".to_string(),
            ));
        }

        let existing = self.find_active_listing(consultant_id, auth_token).await?;
        if existing.is_some() {
            return Err(ConsultantError::ActiveListingExists);
        }

        let now = Utc::now();
        let listing_data = json!({
            "consultant_id": consultant_id,
            "expertise": request.expertise,
            "profession": request.profession,
            "available_from": request.available_from.format("%H:%M:%S").to_string(),
            "available_to": request.available_to.map(|t| t.format("%H:%M:%S").to_string()),
            "available_days": request.available_days,
            "rate_per_hour": request.rate_per_hour,
            "meeting_place": request.meeting_place,
            "description": request.description,
            "is_active": true,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/market_listings",
                Some(auth_token),
                Some(listing_data),
                Some(headers),
            )
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ConsultantError::DatabaseError(
                "Failed to create listing".to_string(),
            ));
        }

        let listing: MarketListing = serde_json::from_value(result[0].clone())
            .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse listing: {}", e)))?;

        info!("Market listing {} created for consultant {}", listing.id, consultant_id);
        Ok(listing)
    }

    /// Update a listing's offer fields. Ownership is enforced here; time
    /// bounds are re-validated against whichever side is not changing.
    pub async fn update_listing(
        &self,
        listing_id: Uuid,
        actor_id: Uuid,
        request: UpdateListingRequest,
        auth_token: &str,
    ) -> Result<MarketListing, ConsultantError> {
        debug!("Updating market listing {}", listing_id);

        let current = self.get_listing(listing_id, auth_token).await?;
        if current.consultant_id != actor_id {
            return Err(ConsultantError::Unauthorized);
        }

        let from = request.available_from.unwrap_or(current.available_from);
        let to = request.available_to.or(current.available_to);
        validate_window(from, to)?;

        if let Some(rate) = request.rate_per_hour {
            if rate == 0 {
                return Err(ConsultantError::ValidationError(
                    "Rate per hour must be a positive amount".to_string(),
                ));
            }
        }

        let mut update_data = serde_json::Map::new();
        if let Some(expertise) = request.expertise {
            update_data.insert("expertise".to_string(), json!(expertise));
        }
        if let Some(profession) = request.profession {
            update_data.insert("profession".to_string(), json!(profession));
        }
        if let Some(available_from) = request.available_from {
            update_data.insert(
                "available_from".to_string(),
                json!(available_from.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(available_to) = request.available_to {
            update_data.insert(
                "available_to".to_string(),
                json!(available_to.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(available_days) = request.available_days {
            update_data.insert("available_days".to_string(), json!(available_days));
        }
        if let Some(rate) = request.rate_per_hour {
            update_data.insert("rate_per_hour".to_string(), json!(rate));
        }
        if let Some(meeting_place) = request.meeting_place {
            update_data.insert("meeting_place".to_string(), json!(meeting_place));
        }
        if let Some(description) = request.description {
            update_data.insert("description".to_string(), json!(description));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_listing(listing_id, Value::Object(update_data), auth_token)
            .await
    }

    /// Flip a listing between active and inactive. Re-activating runs the
    /// verification gate again in case the consultant was since rejected.
    pub async fn toggle_listing(
        &self,
        listing_id: Uuid,
        actor_id: Uuid,
        auth_token: &str,
    ) -> Result<MarketListing, ConsultantError> {
        let current = self.get_listing(listing_id, auth_token).await?;
        if current.consultant_id != actor_id {
            return Err(ConsultantError::Unauthorized);
        }

        let activating = !current.is_active;
        if activating {
            let consultant = self.get_consultant(current.consultant_id, auth_token).await?;
            if !consultant.is_verified {
                return Err(ConsultantError::NotVerified);
            }
            if self
                .find_active_listing(current.consultant_id, auth_token)
                .await?
                .is_some()
            {
                return Err(ConsultantError::ActiveListingExists);
            }
        }

        let update_data = json!({
            "is_active": activating,
            "updated_at": Utc::now().to_rfc3339()
        });

        let listing = self.patch_listing(listing_id, update_data, auth_token).await?;
        info!(
            "Market listing {} is now {}",
            listing_id,
            if activating { "active" } else { "inactive" }
        );
        Ok(listing)
    }

    pub async fn get_consultant(
        &self,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<Consultant, ConsultantError> {
        let path = format!("/rest/v1/consultants?id=eq.{}", consultant_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ConsultantError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse consultant: {}", e)))
    }

    pub async fn get_listing(
        &self,
        listing_id: Uuid,
        auth_token: &str,
    ) -> Result<MarketListing, ConsultantError> {
        let path = format!("/rest/v1/market_listings?id=eq.{}", listing_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ConsultantError::ListingNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse listing: {}", e)))
    }

    async fn find_active_listing(
        &self,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<MarketListing>, ConsultantError> {
        let path = format!(
            "/rest/v1/market_listings?consultant_id=eq.{}&is_active=eq.true&limit=1",
            consultant_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse listing: {}", e))),
            None => Ok(None),
        }
    }

    async fn patch_listing(
        &self,
        listing_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<MarketListing, ConsultantError> {
        let path = format!("/rest/v1/market_listings?id=eq.{}", listing_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ConsultantError::DatabaseError(
                "Failed to update listing".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse listing: {}", e)))
    }
}

fn validate_window(from: NaiveTime, to: Option<NaiveTime>) -> Result<(), ConsultantError> {
    if let Some(to) = to {
        if from >= to {
            return Err(ConsultantError::ValidationError(
                "Available-from must be before available-to".to_string(),
            ));
        }
    }
    Ok(())
}
