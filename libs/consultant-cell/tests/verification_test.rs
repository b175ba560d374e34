use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use consultant_cell::models::{
    ConsultantError, ReviewDecision, SubmitVerificationRequest, VerificationStatus,
};
use consultant_cell::services::verification::VerificationService;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseRows, TestConfig};

const TOKEN: &str = "test-token";

async fn service(mock_server: &MockServer) -> VerificationService {
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    VerificationService::new(Arc::new(SupabaseClient::new(&config)))
}

fn submit_request() -> SubmitVerificationRequest {
    SubmitVerificationRequest {
        contact_number: "09170000000".to_string(),
        expertise: "Thesis advising".to_string(),
        workplace: "Engineering Department".to_string(),
        qualification: "PhD in Computer Science".to_string(),
    }
}

#[tokio::test]
async fn approval_flips_the_consultant_verified_flag() {
    let mock_server = MockServer::start().await;
    let verification_id = Uuid::new_v4();
    let consultant_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/verifications"))
        .and(query_param("id", format!("eq.{}", verification_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::verification_row(
                &verification_id.to_string(),
                &consultant_id.to_string(),
                "pending"
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/verifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::verification_row(
                &verification_id.to_string(),
                &consultant_id.to_string(),
                "approved"
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/consultants"))
        .and(query_param("id", format!("eq.{}", consultant_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let verification = service(&mock_server)
        .await
        .review(verification_id, ReviewDecision::Approve, TOKEN)
        .await
        .unwrap();

    assert_eq!(verification.status, VerificationStatus::Approved);
}

#[tokio::test]
async fn rejection_leaves_the_verified_flag_alone() {
    let mock_server = MockServer::start().await;
    let verification_id = Uuid::new_v4();
    let consultant_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/verifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::verification_row(
                &verification_id.to_string(),
                &consultant_id.to_string(),
                "pending"
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/verifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::verification_row(
                &verification_id.to_string(),
                &consultant_id.to_string(),
                "rejected"
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/consultants"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let verification = service(&mock_server)
        .await
        .review(verification_id, ReviewDecision::Reject, TOKEN)
        .await
        .unwrap();

    assert_eq!(verification.status, VerificationStatus::Rejected);
}

#[tokio::test]
async fn a_reviewed_request_cannot_be_reviewed_again() {
    let mock_server = MockServer::start().await;
    let verification_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/verifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::verification_row(
                &verification_id.to_string(),
                &Uuid::new_v4().to_string(),
                "approved"
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = service(&mock_server)
        .await
        .review(verification_id, ReviewDecision::Approve, TOKEN)
        .await;

    assert_matches!(result, Err(ConsultantError::AlreadyReviewed));
}

#[tokio::test]
async fn resubmission_is_blocked_while_one_is_pending() {
    let mock_server = MockServer::start().await;
    let consultant_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/verifications"))
        .and(query_param("consultant_id", format!("eq.{}", consultant_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::verification_row(
                &Uuid::new_v4().to_string(),
                &consultant_id.to_string(),
                "pending"
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = service(&mock_server)
        .await
        .submit(consultant_id, submit_request(), TOKEN)
        .await;

    assert_matches!(result, Err(ConsultantError::VerificationPending));
}

#[tokio::test]
async fn resubmission_after_rejection_creates_a_new_row() {
    let mock_server = MockServer::start().await;
    let consultant_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/verifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::verification_row(
                &Uuid::new_v4().to_string(),
                &consultant_id.to_string(),
                "rejected"
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/verifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseRows::verification_row(
                &Uuid::new_v4().to_string(),
                &consultant_id.to_string(),
                "pending"
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let verification = service(&mock_server)
        .await
        .submit(consultant_id, submit_request(), TOKEN)
        .await
        .unwrap();

    assert_eq!(verification.status, VerificationStatus::Pending);
}
