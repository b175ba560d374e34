// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentAction, AppointmentError, BookAppointmentRequest, SubmitFeedbackRequest,
};
use crate::services::booking::ConsultationBookingService;
use crate::services::feedback::FeedbackService;
use crate::services::lifecycle::Actor;
use crate::services::maintenance::MaintenanceService;

// ==============================================================================
// BOOKING & LIFECYCLE HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_student() {
        return Err(AppError::Forbidden(
            "Only students can book consultations".to_string(),
        ));
    }
    let student_id = actor_uuid(&user)?;

    let booking_service = ConsultationBookingService::new(&state);

    let appointment = booking_service
        .book(student_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Consultation request sent. The consultant has been asked to confirm."
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = ConsultationBookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    let is_party = user.id == appointment.student_id.to_string()
        || user.id == appointment.consultant_id.to_string();
    if !is_party && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!({ "appointment": appointment })))
}

/// Single entry point for every lifecycle action; the state machine
/// decides what the actor may do from the appointment's current status.
pub async fn transition_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(action): Json<AppointmentAction>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor {
        role: user
            .role()
            .ok_or_else(|| AppError::Auth("Unknown role in token".to_string()))?,
        id: actor_uuid(&user)?,
    };

    let booking_service = ConsultationBookingService::new(&state);

    let appointment = booking_service
        .transition(appointment_id, actor, action, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

pub async fn student_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let is_self = user.id == student_id.to_string();
    if !is_self && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let booking_service = ConsultationBookingService::new(&state);

    let appointments = booking_service
        .appointments_for_student(student_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

pub async fn consultant_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultant_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let is_self = user.id == consultant_id.to_string();
    if !is_self && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let booking_service = ConsultationBookingService::new(&state);

    let appointments = booking_service
        .appointments_for_consultant(consultant_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

// ==============================================================================
// FEEDBACK HANDLER
// ==============================================================================

pub async fn submit_feedback(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<SubmitFeedbackRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_student() {
        return Err(AppError::Forbidden(
            "Only students can leave feedback".to_string(),
        ));
    }
    let student_id = actor_uuid(&user)?;

    let feedback_service = FeedbackService::new(Arc::new(SupabaseClient::new(&state)));

    let feedback = feedback_service
        .submit(appointment_id, student_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "feedback": feedback,
    })))
}

// ==============================================================================
// MAINTENANCE HANDLERS
// ==============================================================================

pub async fn run_lapse_sweep(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can run maintenance".to_string(),
        ));
    }

    let maintenance_service = MaintenanceService::new(Arc::new(SupabaseClient::new(&state)));

    let report = maintenance_service
        .lapse_past_due(auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "report": report,
    })))
}

pub async fn reconcile_sessions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can run maintenance".to_string(),
        ));
    }

    let maintenance_service = MaintenanceService::new(Arc::new(SupabaseClient::new(&state)));

    let report = maintenance_service
        .reconcile_sessions(auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "report": report,
    })))
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn actor_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::ConsultantNotFound => {
            AppError::NotFound("Consultant not found".to_string())
        }
        AppointmentError::StudentNotFound => AppError::NotFound("Student not found".to_string()),
        AppointmentError::ConsultantUnavailable => {
            AppError::NotFound("Consultant is not available for booking".to_string())
        }
        AppointmentError::DuplicateRequest => AppError::Conflict(
            "You already have a pending request with this consultant".to_string(),
        ),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::PastDate => {
            AppError::BadRequest("Requested date and time have already passed".to_string())
        }
        AppointmentError::OutsideAvailability(msg) => {
            AppError::BadRequest(format!("Outside consultant availability: {}", msg))
        }
        AppointmentError::ConflictDetected => AppError::Conflict(
            "Requested time conflicts with an existing appointment".to_string(),
        ),
        AppointmentError::InvalidTransition(status) => AppError::BadRequest(format!(
            "Action not allowed while the appointment is {}",
            status
        )),
        AppointmentError::FeedbackAlreadySubmitted => AppError::Conflict(
            "Feedback has already been submitted for this appointment".to_string(),
        ),
        AppointmentError::Unauthorized => {
            AppError::Forbidden("Not authorized to perform this action".to_string())
        }
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}
