// libs/consultant-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{BookedInterval, ConsultantError, MarketListing};

/// Length of one bookable slot. Listings are booked in whole hours.
pub const SLOT_MINUTES: i64 = 60;

/// Default horizon for the unavailable-date calendar.
pub const DEFAULT_HORIZON_DAYS: u32 = 60;

/// Hourly slot-start times covering a working window. A slot is included
/// only when the full hour still fits before the closing bound; an absent
/// bound yields no slots at all.
pub fn generate_slots(from: Option<NaiveTime>, to: Option<NaiveTime>) -> Vec<NaiveTime> {
    let (from, to) = match (from, to) {
        (Some(from), Some(to)) => (from, to),
        _ => return Vec::new(),
    };

    let mut slots = Vec::new();
    let mut current = from;

    loop {
        let (slot_end, wrapped) = current.overflowing_add_signed(Duration::minutes(SLOT_MINUTES));
        if wrapped != 0 || slot_end > to {
            break;
        }
        slots.push(current);
        current = slot_end;
    }

    slots
}

/// Calendar dates in `[today, today + horizon)` that cannot be booked:
/// the weekday is not offered, or the date is not strictly in the future.
/// An empty `available_days` list makes every date unavailable.
pub fn unavailable_dates(
    listing: &MarketListing,
    horizon_days: u32,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    (0..horizon_days as i64)
        .filter_map(|offset| today.checked_add_signed(Duration::days(offset)))
        .filter(|date| *date <= today || !listing.covers_weekday(date.weekday()))
        .collect()
}

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Free hourly slots for a consultant on a given date: the listing's
    /// slot sequence minus slots overlapping pending/confirmed bookings,
    /// minus already-elapsed start times when the date is today.
    pub async fn available_slots(
        &self,
        consultant_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<NaiveTime>, ConsultantError> {
        debug!("Computing available slots for consultant {} on {}", consultant_id, date);

        let listing = self.get_active_listing(consultant_id, auth_token).await?;

        let now = Utc::now().naive_utc();
        if date < now.date() || !listing.covers_weekday(date.weekday()) {
            return Ok(Vec::new());
        }

        let booked = self
            .get_booked_intervals(consultant_id, date, auth_token)
            .await?;

        let slots = generate_slots(Some(listing.available_from), listing.available_to)
            .into_iter()
            .filter(|slot| {
                let slot_start = date.and_time(*slot);
                let slot_end = slot_start + Duration::minutes(SLOT_MINUTES);

                // Same-day slots whose start has already passed are gone.
                if slot_start <= now {
                    return false;
                }

                !booked.iter().filter(|b| b.is_active()).any(|b| {
                    let booked_start = b.date.and_time(b.time);
                    let booked_end = booked_start + Duration::minutes(b.duration_minutes as i64);
                    slot_start < booked_end && booked_start < slot_end
                })
            })
            .collect();

        Ok(slots)
    }

    /// Blacked-out dates over a bounded forward horizon, for the booking
    /// date picker.
    pub async fn unavailable_dates_for(
        &self,
        consultant_id: Uuid,
        horizon_days: u32,
        auth_token: &str,
    ) -> Result<Vec<NaiveDate>, ConsultantError> {
        let listing = self.get_active_listing(consultant_id, auth_token).await?;
        let today = Utc::now().naive_utc().date();
        Ok(unavailable_dates(&listing, horizon_days, today))
    }

    pub async fn get_active_listing(
        &self,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<MarketListing, ConsultantError> {
        let path = format!(
            "/rest/v1/market_listings?consultant_id=eq.{}&is_active=eq.true&order=created_at.desc&limit=1",
            consultant_id
        );
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

    async fn get_booked_intervals(
        &self,
        consultant_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, ConsultantError> {
        let path = format!(
            "/rest/v1/appointments?consultant_id=eq.{}&date=eq.{}&status=in.(pending,confirmed)&order=time.asc",
            consultant_id, date
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ConsultantError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BookedInterval>, _>>()
            .map_err(|e| ConsultantError::DatabaseError(format!("Failed to parse bookings: {}", e)))
    }
}
