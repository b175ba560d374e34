// libs/student-cell/src/services/student.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Student, StudentError, UpdateStudentRequest};

pub struct StudentService {
    supabase: Arc<SupabaseClient>,
}

impl StudentService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_student(
        &self,
        student_id: Uuid,
        auth_token: &str,
    ) -> Result<Student, StudentError> {
        debug!("Fetching student profile: {}", student_id);

        let path = format!("/rest/v1/students?id=eq.{}", student_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StudentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StudentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| StudentError::DatabaseError(format!("Failed to parse student: {}", e)))
    }

    pub async fn update_student(
        &self,
        student_id: Uuid,
        request: UpdateStudentRequest,
        auth_token: &str,
    ) -> Result<Student, StudentError> {
        debug!("Updating student profile: {}", student_id);

        if let Some(year_level) = request.year_level {
            if !(1..=6).contains(&year_level) {
                return Err(StudentError::ValidationError(
                    "Year level must be between 1 and 6".to_string(),
                ));
            }
        }

        let mut update_data = serde_json::Map::new();
        if let Some(year_level) = request.year_level {
            update_data.insert("year_level".to_string(), json!(year_level));
        }
        if let Some(department) = request.department {
            update_data.insert("department".to_string(), json!(department));
        }
        if let Some(course) = request.course {
            update_data.insert("course".to_string(), json!(course));
        }
        if let Some(program) = request.program {
            update_data.insert("program".to_string(), json!(program));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/students?id=eq.{}", student_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| StudentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StudentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| StudentError::DatabaseError(format!("Failed to parse student: {}", e)))
    }

    /// Students currently assigned to a consultant, for the consultant's
    /// advisee roster.
    pub async fn students_for_consultant(
        &self,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Student>, StudentError> {
        debug!("Fetching student roster for consultant: {}", consultant_id);

        let path = format!(
            "/rest/v1/students?assigned_consultant_id=eq.{}&order=full_name.asc",
            consultant_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StudentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Student>, _>>()
            .map_err(|e| StudentError::DatabaseError(format!("Failed to parse students: {}", e)))
    }
}
