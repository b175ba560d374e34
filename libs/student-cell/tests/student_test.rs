use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseRows, TestConfig};
use student_cell::models::{StudentError, UpdateStudentRequest};
use student_cell::services::student::StudentService;

const TOKEN: &str = "test-token";

async fn service(mock_server: &MockServer) -> StudentService {
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    StudentService::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn missing_student_maps_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = service(&mock_server)
        .await
        .get_student(Uuid::new_v4(), TOKEN)
        .await;

    assert_matches!(result, Err(StudentError::NotFound));
}

#[tokio::test]
async fn year_level_is_bounded() {
    let mock_server = MockServer::start().await;

    let request = UpdateStudentRequest {
        year_level: Some(0),
        department: None,
        course: None,
        program: None,
    };

    let result = service(&mock_server)
        .await
        .update_student(Uuid::new_v4(), request, TOKEN)
        .await;

    assert_matches!(result, Err(StudentError::ValidationError(_)));
}

#[tokio::test]
async fn roster_lists_assigned_students() {
    let mock_server = MockServer::start().await;
    let consultant_id = Uuid::new_v4();

    let mut advisee = MockSupabaseRows::student_row(&Uuid::new_v4().to_string(), "Ana Cruz");
    advisee["assigned_consultant_id"] = json!(consultant_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/students"))
        .and(query_param(
            "assigned_consultant_id",
            format!("eq.{}", consultant_id),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([advisee])))
        .mount(&mock_server)
        .await;

    let students = service(&mock_server)
        .await
        .students_for_consultant(consultant_id, TOKEN)
        .await
        .unwrap();

    assert_eq!(students.len(), 1);
    assert_eq!(students[0].assigned_consultant_id, Some(consultant_id));
    assert_eq!(students[0].full_name, "Ana Cruz");
}
