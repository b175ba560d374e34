use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "student".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn student(email: &str) -> Self {
        Self::new(email, "student")
    }

    pub fn consultant(email: &str) -> Self {
        Self::new(email, "consultant")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned Supabase row payloads for wiremock-backed tests.
pub struct MockSupabaseRows;

impl MockSupabaseRows {
    pub fn consultant_row(id: &str, full_name: &str, is_verified: bool) -> serde_json::Value {
        json!({
            "id": id,
            "full_name": full_name,
            "email": "consultant@example.com",
            "contact_number": "09170000000",
            "expertise": "Thesis advising",
            "workplace": "Engineering Department",
            "is_verified": is_verified,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn student_row(id: &str, full_name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "full_name": full_name,
            "email": "student@example.com",
            "year_level": 3,
            "department": "College of Engineering",
            "course": "BS Computer Engineering",
            "program": "undecided",
            "assigned_consultant_id": null,
            "sessions_completed": 0,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn listing_row(id: &str, consultant_id: &str, from: &str, to: &str) -> serde_json::Value {
        json!({
            "id": id,
            "consultant_id": consultant_id,
            "expertise": ["research methods", "statistics"],
            "profession": "University Lecturer",
            "available_from": from,
            "available_to": to,
            "available_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            "rate_per_hour": 500,
            "meeting_place": "Online",
            "description": null,
            "is_active": true,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        id: &str,
        consultant_id: &str,
        student_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "consultant_id": consultant_id,
            "student_id": student_id,
            "date": date,
            "time": time,
            "duration_minutes": 60,
            "topic": "Thesis review",
            "research_title": null,
            "status": status,
            "consultant_marked_as": null,
            "student_dispute_remark": null,
            "disputed_at": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn verification_row(id: &str, consultant_id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "consultant_id": consultant_id,
            "contact_number": "09170000000",
            "expertise": "Thesis advising",
            "workplace": "Engineering Department",
            "qualification": "PhD in Computer Science",
            "status": status,
            "created_at": "2025-01-01T00:00:00Z",
            "reviewed_at": null
        })
    }
}
