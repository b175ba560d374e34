// libs/student-cell/src/handlers.rs
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

use crate::models::{StudentError, UpdateStudentRequest};
use crate::services::student::StudentService;

/// A student sees their own profile; consultants and admins may look up
/// any student (consultants need advisee details, admins manage records).
pub async fn get_student(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let is_self = user.id == student_id.to_string();
    if !is_self && !user.is_admin() && !user.is_consultant() {
        return Err(AppError::Forbidden(
            "Not authorized to view this profile".to_string(),
        ));
    }

    let service = StudentService::new(Arc::new(SupabaseClient::new(&state)));

    let student = service
        .get_student(student_id, auth.token())
        .await
        .map_err(map_student_error)?;

    Ok(Json(json!({ "student": student })))
}

pub async fn update_student(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(student_id): Path<Uuid>,
    Json(request): Json<UpdateStudentRequest>,
) -> Result<Json<Value>, AppError> {
    let is_self = user.id == student_id.to_string();
    if !is_self && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to update this profile".to_string(),
        ));
    }

    let service = StudentService::new(Arc::new(SupabaseClient::new(&state)));

    let student = service
        .update_student(student_id, request, auth.token())
        .await
        .map_err(map_student_error)?;

    Ok(Json(json!({
        "success": true,
        "student": student,
    })))
}

pub async fn students_for_consultant(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(consultant_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let is_own_roster = user.id == consultant_id.to_string();
    if !is_own_roster && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this roster".to_string(),
        ));
    }

    let service = StudentService::new(Arc::new(SupabaseClient::new(&state)));

    let students = service
        .students_for_consultant(consultant_id, auth.token())
        .await
        .map_err(map_student_error)?;

    Ok(Json(json!({ "students": students })))
}

fn map_student_error(e: StudentError) -> AppError {
    match e {
        StudentError::NotFound => AppError::NotFound("Student not found".to_string()),
        StudentError::ValidationError(msg) => AppError::ValidationError(msg),
        StudentError::Unauthorized => {
            AppError::Forbidden("Not authorized to manage this profile".to_string())
        }
        StudentError::DatabaseError(msg) => AppError::Database(msg),
    }
}
