use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseRows, TestConfig, TestUser};

const MONDAY: &str = "2030-06-03";

fn test_app(config: &TestConfig) -> Router {
    appointment_routes(config.to_arc())
}

fn authed_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let config = TestConfig::default();
    let app = test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/students/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn requests_with_malformed_token_are_rejected() {
    let config = TestConfig::default();
    let app = test_app(&config);

    let response = app
        .oneshot(authed_request(
            "GET",
            &format!("/students/{}", Uuid::new_v4()),
            &JwtTestUtils::create_malformed_token(),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let config = TestConfig::default();
    let app = test_app(&config);
    let user = TestUser::student("student@example.com");
    let token = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);

    let response = app
        .oneshot(authed_request(
            "GET",
            &format!("/students/{}", user.id),
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_students_can_book() {
    let config = TestConfig::default();
    let app = test_app(&config);
    let user = TestUser::consultant("mentor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let body = json!({
        "consultant_id": Uuid::new_v4(),
        "date": MONDAY,
        "time": "10:00",
        "topic": "Thesis review"
    });

    let response = app
        .oneshot(authed_request("POST", "/", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_admins_can_run_maintenance() {
    let config = TestConfig::default();
    let app = test_app(&config);
    let user = TestUser::student("student@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let response = app
        .oneshot(authed_request("POST", "/maintenance/lapse", &token, json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn students_cannot_read_other_students_appointments() {
    let config = TestConfig::default();
    let app = test_app(&config);
    let user = TestUser::student("student@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let response = app
        .oneshot(authed_request(
            "GET",
            &format!("/students/{}", Uuid::new_v4()),
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn consultant_accepts_request_through_the_api() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    let consultant = TestUser::consultant("mentor@example.com");
    let token = JwtTestUtils::create_test_token(&consultant, &config.jwt_secret, None);
    let appointment_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::appointment_row(
                &appointment_id.to_string(),
                &consultant.id,
                &student_id.to_string(),
                MONDAY,
                "10:00:00",
                "pending"
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::appointment_row(
                &appointment_id.to_string(),
                &consultant.id,
                &student_id.to_string(),
                MONDAY,
                "10:00:00",
                "confirmed"
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::student_row(&student_id.to_string(), "Ana Cruz")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/students"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let app = test_app(&config);
    let response = app
        .oneshot(authed_request(
            "POST",
            &format!("/{}/transition", appointment_id),
            &token,
            json!({ "action": "accept" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["appointment"]["status"], json!("confirmed"));
}

#[tokio::test]
async fn student_cannot_accept_through_the_api() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    let student = TestUser::student("student@example.com");
    let token = JwtTestUtils::create_test_token(&student, &config.jwt_secret, None);
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::appointment_row(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &student.id,
                MONDAY,
                "10:00:00",
                "pending"
            )
        ])))
        .mount(&mock_server)
        .await;

    let app = test_app(&config);
    let response = app
        .oneshot(authed_request(
            "POST",
            &format!("/{}/transition", appointment_id),
            &token,
            json!({ "action": "accept" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
