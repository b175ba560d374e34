// libs/consultant-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    ConsultantError, CreateListingRequest, ReviewVerificationRequest, SubmitVerificationRequest,
    UpdateListingRequest,
};
use crate::services::availability::{AvailabilityService, DEFAULT_HORIZON_DAYS};
use crate::services::listing::ListingService;
use crate::services::verification::VerificationService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UnavailableDatesQuery {
    pub horizon_days: Option<u32>,
}

// ==============================================================================
// CONSULTANT & LISTING HANDLERS
// ==============================================================================

pub async fn get_consultant(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(consultant_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ListingService::new(Arc::new(SupabaseClient::new(&state)));

    let consultant = service
        .get_consultant(consultant_id, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({ "consultant": consultant })))
}

pub async fn get_active_listing(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(consultant_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(Arc::new(SupabaseClient::new(&state)));

    let listing = service
        .get_active_listing(consultant_id, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({ "listing": listing })))
}

/// Free hourly slots for one consultant on one date.
pub async fn list_available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(consultant_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(Arc::new(SupabaseClient::new(&state)));

    let slots = service
        .available_slots(consultant_id, query.date, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({
        "date": query.date,
        "slots": slots,
    })))
}

pub async fn unavailable_dates(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(consultant_id): Path<Uuid>,
    Query(query): Query<UnavailableDatesQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(Arc::new(SupabaseClient::new(&state)));

    let horizon = query.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS);
    let dates = service
        .unavailable_dates_for(consultant_id, horizon, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({
        "horizon_days": horizon,
        "unavailable_dates": dates,
    })))
}

pub async fn create_listing(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateListingRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_consultant() {
        return Err(AppError::Forbidden(
            "Only consultants can publish listings".to_string(),
        ));
    }
    let consultant_id = actor_uuid(&user)?;

    let service = ListingService::new(Arc::new(SupabaseClient::new(&state)));

    let listing = service
        .create_listing(consultant_id, request, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({
        "success": true,
        "listing": listing,
    })))
}

pub async fn update_listing(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(listing_id): Path<Uuid>,
    Json(request): Json<UpdateListingRequest>,
) -> Result<Json<Value>, AppError> {
    let actor_id = actor_uuid(&user)?;
    let service = ListingService::new(Arc::new(SupabaseClient::new(&state)));

    let listing = service
        .update_listing(listing_id, actor_id, request, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({
        "success": true,
        "listing": listing,
    })))
}

pub async fn toggle_listing(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor_id = actor_uuid(&user)?;
    let service = ListingService::new(Arc::new(SupabaseClient::new(&state)));

    let listing = service
        .toggle_listing(listing_id, actor_id, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({
        "success": true,
        "listing": listing,
    })))
}

// ==============================================================================
// VERIFICATION HANDLERS
// ==============================================================================

pub async fn submit_verification(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SubmitVerificationRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_consultant() {
        return Err(AppError::Forbidden(
            "Only consultants can request verification".to_string(),
        ));
    }
    let consultant_id = actor_uuid(&user)?;

    let service = VerificationService::new(Arc::new(SupabaseClient::new(&state)));

    let verification = service
        .submit(consultant_id, request, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({
        "success": true,
        "verification": verification,
    })))
}

pub async fn my_verifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let consultant_id = actor_uuid(&user)?;
    let service = VerificationService::new(Arc::new(SupabaseClient::new(&state)));

    let verifications = service
        .history(consultant_id, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({ "verifications": verifications })))
}

pub async fn pending_verifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can review verification requests".to_string(),
        ));
    }

    let service = VerificationService::new(Arc::new(SupabaseClient::new(&state)));

    let verifications = service
        .pending_queue(auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({ "verifications": verifications })))
}

pub async fn review_verification(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(verification_id): Path<Uuid>,
    Json(request): Json<ReviewVerificationRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can review verification requests".to_string(),
        ));
    }

    let service = VerificationService::new(Arc::new(SupabaseClient::new(&state)));

    let verification = service
        .review(verification_id, request.decision, auth.token())
        .await
        .map_err(map_consultant_error)?;

    Ok(Json(json!({
        "success": true,
        "verification": verification,
    })))
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn actor_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

fn map_consultant_error(e: ConsultantError) -> AppError {
    match e {
        ConsultantError::NotFound => AppError::NotFound("Consultant not found".to_string()),
        ConsultantError::ListingNotFound => {
            AppError::NotFound("Consultant has no active listing".to_string())
        }
        ConsultantError::NotVerified => {
            AppError::Forbidden("Consultant is not verified".to_string())
        }
        ConsultantError::ActiveListingExists => {
            AppError::Conflict("Consultant already has an active listing".to_string())
        }
        ConsultantError::VerificationNotFound => {
            AppError::NotFound("Verification request not found".to_string())
        }
        ConsultantError::AlreadyReviewed => {
            AppError::Conflict("Verification request has already been reviewed".to_string())
        }
        ConsultantError::VerificationPending => {
            AppError::Conflict("A verification request is already pending review".to_string())
        }
        ConsultantError::ValidationError(msg) => AppError::ValidationError(msg),
        ConsultantError::Unauthorized => {
            AppError::Forbidden("Not authorized to manage this resource".to_string())
        }
        ConsultantError::DatabaseError(msg) => AppError::Database(msg),
    }
}
