use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use consultant_cell::models::MarketListing;
use consultant_cell::services::availability::{
    generate_slots, unavailable_dates, AvailabilityService,
};
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseRows, TestConfig};

const TOKEN: &str = "test-token";

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn listing(from: NaiveTime, to: Option<NaiveTime>, days: &[&str]) -> MarketListing {
    MarketListing {
        id: Uuid::new_v4(),
        consultant_id: Uuid::new_v4(),
        expertise: vec!["research methods".to_string()],
        profession: "University Lecturer".to_string(),
        available_from: from,
        available_to: to,
        available_days: days.iter().map(|d| d.to_string()).collect(),
        rate_per_hour: 500,
        meeting_place: "Online".to_string(),
        description: None,
        is_active: true,
        created_at: DateTime::<Utc>::MIN_UTC,
        updated_at: DateTime::<Utc>::MIN_UTC,
    }
}

// ==============================================================================
// SLOT GENERATION
// ==============================================================================

#[test]
fn slots_step_hourly_through_the_window() {
    let slots = generate_slots(Some(t(9, 0)), Some(t(17, 0)));

    assert_eq!(slots.len(), 8);
    assert_eq!(slots.first(), Some(&t(9, 0)));
    assert_eq!(slots.last(), Some(&t(16, 0)));
}

#[test]
fn slot_must_fit_entirely_before_closing() {
    let slots = generate_slots(Some(t(9, 0)), Some(t(16, 30)));

    // 16:00 would run until 17:00, past the 16:30 close.
    assert_eq!(slots.len(), 7);
    assert!(!slots.contains(&t(16, 0)));
    assert_eq!(slots.last(), Some(&t(15, 0)));
}

#[test]
fn missing_bounds_yield_no_slots() {
    assert!(generate_slots(None, Some(t(17, 0))).is_empty());
    assert!(generate_slots(Some(t(9, 0)), None).is_empty());
    assert!(generate_slots(None, None).is_empty());
}

#[test]
fn window_shorter_than_one_hour_yields_no_slots() {
    assert!(generate_slots(Some(t(9, 0)), Some(t(9, 30))).is_empty());
}

// ==============================================================================
// UNAVAILABLE DATES
// ==============================================================================

#[test]
fn weekends_and_today_are_unavailable() {
    let listing = listing(
        t(9, 0),
        Some(t(17, 0)),
        &["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
    );
    // 2030-06-03 is a Monday.
    let today = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();

    let dates = unavailable_dates(&listing, 7, today);

    assert_eq!(
        dates,
        vec![
            today,                                       // same-day is never offered
            NaiveDate::from_ymd_opt(2030, 6, 8).unwrap(), // Saturday
            NaiveDate::from_ymd_opt(2030, 6, 9).unwrap(), // Sunday
        ]
    );
}

#[test]
fn empty_day_list_blocks_every_date() {
    let listing = listing(t(9, 0), Some(t(17, 0)), &[]);
    let today = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();

    let dates = unavailable_dates(&listing, 14, today);

    assert_eq!(dates.len(), 14);
}

#[test]
fn weekday_names_match_case_insensitively() {
    let listing = listing(t(9, 0), Some(t(17, 0)), &["monday", "FRIDAY"]);

    assert!(listing.covers_weekday(chrono::Weekday::Mon));
    assert!(listing.covers_weekday(chrono::Weekday::Fri));
    assert!(!listing.covers_weekday(chrono::Weekday::Tue));
}

// ==============================================================================
// PER-DATE FREE SLOTS
// ==============================================================================

async fn service(mock_server: &MockServer) -> AvailabilityService {
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    AvailabilityService::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn booked_hours_disappear_from_the_slot_list() {
    let mock_server = MockServer::start().await;
    let consultant_id = Uuid::new_v4();
    // A Monday far enough ahead that no slot has elapsed.
    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/market_listings"))
        .and(query_param("consultant_id", format!("eq.{}", consultant_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::listing_row(
                &Uuid::new_v4().to_string(),
                &consultant_id.to_string(),
                "09:00:00",
                "12:00:00"
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("date", format!("eq.{}", date)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::appointment_row(
                &Uuid::new_v4().to_string(),
                &consultant_id.to_string(),
                &Uuid::new_v4().to_string(),
                "2030-06-03",
                "10:00:00",
                "confirmed"
            )
        ])))
        .mount(&mock_server)
        .await;

    let slots = service(&mock_server)
        .await
        .available_slots(consultant_id, date, TOKEN)
        .await
        .unwrap();

    assert_eq!(slots, vec![t(9, 0), t(11, 0)]);
}

#[tokio::test]
async fn unoffered_weekday_has_no_slots() {
    let mock_server = MockServer::start().await;
    let consultant_id = Uuid::new_v4();
    // 2030-06-08 is a Saturday; the canned listing covers Mon-Fri.
    let date = NaiveDate::from_ymd_opt(2030, 6, 8).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/market_listings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::listing_row(
                &Uuid::new_v4().to_string(),
                &consultant_id.to_string(),
                "09:00:00",
                "12:00:00"
            )
        ])))
        .mount(&mock_server)
        .await;

    let slots = service(&mock_server)
        .await
        .available_slots(consultant_id, date, TOKEN)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn past_dates_have_no_slots() {
    let mock_server = MockServer::start().await;
    let consultant_id = Uuid::new_v4();
    // 2020-01-06 was a Monday, but it is long gone.
    let date = NaiveDate::from_ymd_opt(2020, 1, 6).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/market_listings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseRows::listing_row(
                &Uuid::new_v4().to_string(),
                &consultant_id.to_string(),
                "09:00:00",
                "12:00:00"
            )
        ])))
        .mount(&mock_server)
        .await;

    let slots = service(&mock_server)
        .await
        .available_slots(consultant_id, date, TOKEN)
        .await
        .unwrap();

    assert!(slots.is_empty());
}
