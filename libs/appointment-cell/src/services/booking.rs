// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use consultant_cell::models::{weekday_name, ConsultantError, MarketListing};
use consultant_cell::services::availability::AvailabilityService;
use consultant_cell::services::listing::ListingService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use student_cell::models::Student;

use crate::models::{
    Appointment, AppointmentAction, AppointmentError, AppointmentStatus, BookAppointmentRequest,
    BookingRules,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{Actor, AppointmentLifecycleService};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Scheduling locks are advisory rows; anything older than this is a
/// leftover from a crashed booking attempt and may be reclaimed.
const LOCK_TTL_SECONDS: i64 = 30;

/// The single authoritative entry point for creating appointments and for
/// moving them through the lifecycle.
pub struct ConsultationBookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    availability_service: AvailabilityService,
    listing_service: ListingService,
    rules: BookingRules,
}

impl ConsultationBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let rules = BookingRules::default();

        let conflict_service = ConflictDetectionService::new(Arc::clone(&supabase));
        let lifecycle_service = AppointmentLifecycleService::new(rules.min_dispute_remark_chars);
        let availability_service = AvailabilityService::new(Arc::clone(&supabase));
        let listing_service = ListingService::new(Arc::clone(&supabase));

        Self {
            conflict_service,
            lifecycle_service,
            availability_service,
            listing_service,
            supabase,
            rules,
        }
    }

    /// Book a consultation slot for a student. Validation is fail-fast:
    /// each rejection carries its own reason, and nothing is written until
    /// every check has passed under the consultant's scheduling lock.
    pub async fn book(
        &self,
        student_id: Uuid,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking request from student {} for consultant {}",
            student_id, request.consultant_id
        );

        // **Step 1: consultant must exist, be verified, and have an active listing**
        let consultant = self
            .listing_service
            .get_consultant(request.consultant_id, auth_token)
            .await
            .map_err(from_consultant_error)?;

        if !consultant.is_verified {
            return Err(AppointmentError::ConsultantUnavailable);
        }

        let listing = self
            .availability_service
            .get_active_listing(request.consultant_id, auth_token)
            .await
            .map_err(|e| match e {
                ConsultantError::ListingNotFound => AppointmentError::ConsultantUnavailable,
                other => from_consultant_error(other),
            })?;

        // **Step 2: one pending request per consultant at a time**
        if self
            .has_pending_request(student_id, request.consultant_id, auth_token)
            .await?
        {
            return Err(AppointmentError::DuplicateRequest);
        }

        // **Step 3: formats and required fields**
        let date = NaiveDate::parse_from_str(&request.date, DATE_FORMAT).map_err(|_| {
            AppointmentError::ValidationError("Date must be in YYYY-MM-DD format".to_string())
        })?;
        let time = parse_time(&request.time)?;

        if request.topic.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "Topic is required".to_string(),
            ));
        }
        if request.duration_hours < self.rules.min_duration_hours
            || request.duration_hours > self.rules.max_duration_hours
        {
            return Err(AppointmentError::ValidationError(format!(
                "Duration must be between {} and {} whole hours",
                self.rules.min_duration_hours, self.rules.max_duration_hours
            )));
        }
        let duration_minutes = request.duration_hours * 60;

        // **Step 4: no booking in the past; same-day only while the start
        // time has not yet passed**
        let now = Utc::now().naive_utc();
        let start = date.and_time(time);
        if start <= now {
            return Err(AppointmentError::PastDate);
        }

        // **Step 5: weekday must be offered**
        if !listing.covers_weekday(date.weekday()) {
            return Err(AppointmentError::OutsideAvailability(format!(
                "consultant is not available on {}s",
                weekday_name(date.weekday())
            )));
        }

        // **Step 6: interval must sit inside the working window**
        let (window_from, window_to) = listing.working_window().ok_or_else(|| {
            AppointmentError::OutsideAvailability(
                "listing has no bookable hours".to_string(),
            )
        })?;
        let end = start + ChronoDuration::minutes(duration_minutes as i64);
        if time < window_from || end > date.and_time(window_to) {
            return Err(AppointmentError::OutsideAvailability(format!(
                "requested time is outside working hours {} to {}",
                window_from.format(TIME_FORMAT),
                window_to.format(TIME_FORMAT)
            )));
        }

        // **Step 7: no overlap for either party**
        let report = self
            .conflict_service
            .check_for_booking(
                request.consultant_id,
                student_id,
                date,
                time,
                duration_minutes,
                auth_token,
            )
            .await?;
        if report.has_conflict() {
            return Err(AppointmentError::ConflictDetected);
        }

        // **Step 8: insert under the consultant's scheduling lock**
        self.insert_with_lock(student_id, &request, &listing, date, time, duration_minutes, auth_token)
            .await
    }

    /// Apply a lifecycle action. The appointment is re-fetched and the
    /// update is guarded on its current status, so a stale actor loses the
    /// race instead of clobbering a concurrent transition.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        action: AppointmentAction,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Transition {:?} requested on appointment {}", action, appointment_id);

        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let outcome = self
            .lifecycle_service
            .evaluate(&appointment, &actor, &action, Utc::now())?;

        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(outcome.new_status.to_string()));
        if let Some(mark) = outcome.consultant_marked_as {
            update_data.insert("consultant_marked_as".to_string(), json!(mark.to_string()));
        }
        if let Some(remark) = &outcome.dispute_remark {
            update_data.insert("student_dispute_remark".to_string(), json!(remark));
        }
        if let Some(disputed_at) = outcome.disputed_at {
            update_data.insert("disputed_at".to_string(), json!(disputed_at.to_rfc3339()));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id, appointment.status
        );
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
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        // Empty result: the status changed between fetch and update.
        let updated: Appointment = match result.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
            })?,
            None => {
                warn!(
                    "Appointment {} changed status while {:?} was being applied",
                    appointment_id, action
                );
                return Err(AppointmentError::InvalidTransition(appointment.status));
            }
        };

        if outcome.assigns_consultant {
            self.adopt_student(&updated, auth_token).await?;
        }
        if outcome.completes_session {
            self.credit_completed_session(updated.student_id, auth_token)
                .await?;
        }

        info!(
            "Appointment {} moved to {} by {:?} {}",
            appointment_id, updated.status, actor.role, actor.id
        );
        Ok(updated)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn appointments_for_student(
        &self,
        student_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?student_id=eq.{}&order=date.desc,time.desc",
            student_id
        );
        self.fetch_appointments(&path, auth_token).await
    }

    pub async fn appointments_for_consultant(
        &self,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?consultant_id=eq.{}&order=date.desc,time.desc",
            consultant_id
        );
        self.fetch_appointments(&path, auth_token).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn has_pending_request(
        &self,
        student_id: Uuid,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?student_id=eq.{}&consultant_id=eq.{}&status=eq.pending&limit=1",
            student_id, consultant_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    /// The conflict check and insert must be one atomic decision per
    /// consultant. An advisory lock row keyed on (consultant, date)
    /// serializes concurrent booking attempts; the conflict check is
    /// repeated under the lock before anything is written.
    async fn insert_with_lock(
        &self,
        student_id: Uuid,
        request: &BookAppointmentRequest,
        listing: &MarketListing,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i32,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let lock_key = format!("booking:{}:{}", request.consultant_id, date);

        for attempt in 1..=self.rules.lock_retry_attempts {
            if !self
                .acquire_scheduling_lock(&lock_key, request.consultant_id, auth_token)
                .await?
            {
                debug!(
                    "Scheduling lock {} busy (attempt {}/{})",
                    lock_key, attempt, self.rules.lock_retry_attempts
                );
                tokio::time::sleep(std::time::Duration::from_millis(100 * attempt as u64)).await;
                continue;
            }

            let recheck = self
                .conflict_service
                .check_for_booking(
                    request.consultant_id,
                    student_id,
                    date,
                    time,
                    duration_minutes,
                    auth_token,
                )
                .await;

            let insert_result = match recheck {
                Ok(report) if report.has_conflict() => Err(AppointmentError::ConflictDetected),
                Ok(_) => {
                    self.insert_appointment(
                        student_id,
                        request,
                        date,
                        time,
                        duration_minutes,
                        auth_token,
                    )
                    .await
                }
                Err(e) => Err(e),
            };

            self.release_scheduling_lock(&lock_key, auth_token).await;

            if let Ok(appointment) = &insert_result {
                info!(
                    "Appointment {} booked with consultant {} at {} {} ({} PHP/hr)",
                    appointment.id, request.consultant_id, date, time, listing.rate_per_hour
                );
            }
            return insert_result;
        }

        warn!("Could not acquire scheduling lock {} after retries", lock_key);
        Err(AppointmentError::ConflictDetected)
    }

    async fn acquire_scheduling_lock(
        &self,
        lock_key: &str,
        consultant_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        // Reclaim locks left behind by crashed attempts before trying.
        let expired_path = format!(
            "/rest/v1/scheduling_locks?lock_key=eq.{}&expires_at=lt.{}",
            lock_key,
            urlencoding::encode(&Utc::now().to_rfc3339())
        );
        let _ = self
            .supabase
            .execute(Method::DELETE, &expired_path, Some(auth_token), None)
            .await;

        let now = Utc::now();
        let lock_data = json!({
            "lock_key": lock_key,
            "consultant_id": consultant_id,
            "acquired_at": now.to_rfc3339(),
            "expires_at": (now + ChronoDuration::seconds(LOCK_TTL_SECONDS)).to_rfc3339(),
            "process_id": format!("booking_{}", Uuid::new_v4())
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        // The unique constraint on lock_key makes this insert the actual
        // mutual exclusion; a conflict means someone else holds the lock.
        match self
            .supabase
            .request_with_headers::<Vec<Value>>(
                Method::POST,
                "/rest/v1/scheduling_locks",
                Some(auth_token),
                Some(lock_data),
                Some(headers),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().starts_with("Conflict") => Ok(false),
            Err(e) => Err(AppointmentError::DatabaseError(e.to_string())),
        }
    }

    async fn release_scheduling_lock(&self, lock_key: &str, auth_token: &str) {
        let path = format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key);
        if let Err(e) = self
            .supabase
            .execute(Method::DELETE, &path, Some(auth_token), None)
            .await
        {
            // The TTL reclaims it; losing the delete is not fatal.
            warn!("Failed to release scheduling lock {}: {}", lock_key, e);
        }
    }

    async fn insert_appointment(
        &self,
        student_id: Uuid,
        request: &BookAppointmentRequest,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i32,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let appointment_data = json!({
            "consultant_id": request.consultant_id,
            "student_id": student_id,
            "date": date.format(DATE_FORMAT).to_string(),
            "time": time.format("%H:%M:%S").to_string(),
            "duration_minutes": duration_minutes,
            "topic": request.topic.trim(),
            "research_title": request.research_title,
            "status": AppointmentStatus::Pending.to_string(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError(
                "Failed to create appointment".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Accepting a first request adopts the student: assign the consultant
    /// if the student has none, and backfill an undeclared program from
    /// the appointment topic.
    async fn adopt_student(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let student = self.fetch_student(appointment.student_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if student.assigned_consultant_id.is_none() {
            update_data.insert(
                "assigned_consultant_id".to_string(),
                json!(appointment.consultant_id),
            );
        }
        if !student.has_declared_program() {
            update_data.insert("program".to_string(), json!(appointment.topic));
        }

        if update_data.is_empty() {
            return Ok(());
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/students?id=eq.{}", appointment.student_id);
        self.supabase
            .execute(Method::PATCH, &path, Some(auth_token), Some(Value::Object(update_data)))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!(
            "Student {} adopted by consultant {}",
            appointment.student_id, appointment.consultant_id
        );
        Ok(())
    }

    async fn credit_completed_session(
        &self,
        student_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let student = self.fetch_student(student_id, auth_token).await?;

        let update_data = json!({
            "sessions_completed": student.sessions_completed + 1,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/students?id=eq.{}", student_id);
        self.supabase
            .execute(Method::PATCH, &path, Some(auth_token), Some(update_data))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        debug!("Session credited to student {}", student_id);
        Ok(())
    }

    async fn fetch_student(
        &self,
        student_id: Uuid,
        auth_token: &str,
    ) -> Result<Student, AppointmentError> {
        let path = format!("/rest/v1/students?id=eq.{}", student_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::StudentNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse student: {}", e)))
    }

    async fn fetch_appointments(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, AppointmentError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppointmentError::ValidationError("Time must be in HH:MM format".to_string()))
}

fn from_consultant_error(e: ConsultantError) -> AppointmentError {
    match e {
        ConsultantError::NotFound => AppointmentError::ConsultantNotFound,
        ConsultantError::ListingNotFound => AppointmentError::ConsultantUnavailable,
        ConsultantError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        other => AppointmentError::DatabaseError(other.to_string()),
    }
}
