// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::Role;

use crate::models::{
    Appointment, AppointmentAction, AppointmentError, AppointmentStatus, CompletionMark,
    ResolutionDecision,
};

/// Who is attempting a transition. Ownership is part of authorization: a
/// student may only act on their own appointments, a consultant on theirs.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub role: Role,
    pub id: Uuid,
}

/// What an accepted transition does to the appointment row and beyond.
/// The persistence layer applies exactly what is recorded here; the rules
/// in this module are the only place transitions are decided.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub new_status: AppointmentStatus,
    pub consultant_marked_as: Option<CompletionMark>,
    pub dispute_remark: Option<String>,
    pub disputed_at: Option<DateTime<Utc>>,
    /// Accepting a request adopts the student if they have no consultant.
    pub assigns_consultant: bool,
    /// Reaching `completed` credits the student's session counter once.
    pub completes_session: bool,
}

impl TransitionOutcome {
    fn to_status(new_status: AppointmentStatus) -> Self {
        Self {
            new_status,
            consultant_marked_as: None,
            dispute_remark: None,
            disputed_at: None,
            assigns_consultant: false,
            completes_session: false,
        }
    }
}

pub struct AppointmentLifecycleService {
    min_dispute_remark_chars: usize,
}

impl AppointmentLifecycleService {
    pub fn new(min_dispute_remark_chars: usize) -> Self {
        Self {
            min_dispute_remark_chars,
        }
    }

    /// Decide a requested transition against the current appointment
    /// state. Rejections are explicit errors; nothing is ever applied
    /// silently from the wrong state or by the wrong actor.
    pub fn evaluate(
        &self,
        appointment: &Appointment,
        actor: &Actor,
        action: &AppointmentAction,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, AppointmentError> {
        debug!(
            "Evaluating {:?} by {:?} {} on appointment {} ({})",
            action, actor.role, actor.id, appointment.id, appointment.status
        );

        self.authorize(appointment, actor, action)?;

        let outcome = match (appointment.status, action) {
            (AppointmentStatus::Pending, AppointmentAction::Accept) => TransitionOutcome {
                assigns_consultant: true,
                ..TransitionOutcome::to_status(AppointmentStatus::Confirmed)
            },

            (AppointmentStatus::Pending, AppointmentAction::Reject)
            | (AppointmentStatus::Pending, AppointmentAction::Cancel) => {
                TransitionOutcome::to_status(AppointmentStatus::Cancelled)
            }

            (AppointmentStatus::Confirmed, AppointmentAction::MarkCompleted) => {
                TransitionOutcome {
                    consultant_marked_as: Some(CompletionMark::Completed),
                    ..TransitionOutcome::to_status(AppointmentStatus::PendingStudentReview)
                }
            }

            (AppointmentStatus::Confirmed, AppointmentAction::MarkNotCompleted) => {
                TransitionOutcome {
                    consultant_marked_as: Some(CompletionMark::NotCompleted),
                    ..TransitionOutcome::to_status(AppointmentStatus::PendingStudentReview)
                }
            }

            (AppointmentStatus::PendingStudentReview, AppointmentAction::Confirm) => {
                // The student seconds the consultant's assessment; which
                // terminal state that lands in depends on the mark.
                match appointment.consultant_marked_as {
                    Some(CompletionMark::Completed) => TransitionOutcome {
                        completes_session: true,
                        ..TransitionOutcome::to_status(AppointmentStatus::Completed)
                    },
                    Some(CompletionMark::NotCompleted) => {
                        TransitionOutcome::to_status(AppointmentStatus::Cancelled)
                    }
                    None => {
                        warn!(
                            "Appointment {} awaiting review without a completion mark",
                            appointment.id
                        );
                        return Err(AppointmentError::InvalidTransition(appointment.status));
                    }
                }
            }

            (AppointmentStatus::PendingStudentReview, AppointmentAction::Dispute { remark }) => {
                let remark = remark.trim();
                if remark.chars().count() < self.min_dispute_remark_chars {
                    return Err(AppointmentError::ValidationError(format!(
                        "Dispute remark must be at least {} characters",
                        self.min_dispute_remark_chars
                    )));
                }
                TransitionOutcome {
                    dispute_remark: Some(remark.to_string()),
                    disputed_at: Some(now),
                    ..TransitionOutcome::to_status(AppointmentStatus::Disputed)
                }
            }

            (AppointmentStatus::Disputed, AppointmentAction::AdminResolve { decision }) => {
                match decision {
                    ResolutionDecision::MarkCompleted => TransitionOutcome {
                        completes_session: true,
                        ..TransitionOutcome::to_status(AppointmentStatus::Completed)
                    },
                    ResolutionDecision::MarkNotCompleted => {
                        TransitionOutcome::to_status(AppointmentStatus::Cancelled)
                    }
                }
            }

            _ => {
                warn!(
                    "Invalid transition attempted on appointment {}: {:?} from {}",
                    appointment.id, action, appointment.status
                );
                return Err(AppointmentError::InvalidTransition(appointment.status));
            }
        };

        Ok(outcome)
    }

    /// All statuses legally reachable from a given one; used by tests to
    /// assert closure of the transition graph.
    pub fn reachable_statuses(&self, from: AppointmentStatus) -> Vec<AppointmentStatus> {
        match from {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                // Lapse sweep may complete a past-due pending request.
                AppointmentStatus::Completed,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::PendingStudentReview,
                AppointmentStatus::Completed,
            ],
            AppointmentStatus::PendingStudentReview => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Disputed,
            ],
            AppointmentStatus::Disputed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Cancelled | AppointmentStatus::Completed => vec![],
        }
    }

    fn authorize(
        &self,
        appointment: &Appointment,
        actor: &Actor,
        action: &AppointmentAction,
    ) -> Result<(), AppointmentError> {
        let authorized = match action {
            AppointmentAction::Accept
            | AppointmentAction::Reject
            | AppointmentAction::MarkCompleted
            | AppointmentAction::MarkNotCompleted => {
                actor.role == Role::Consultant && actor.id == appointment.consultant_id
            }

            AppointmentAction::Cancel
            | AppointmentAction::Confirm
            | AppointmentAction::Dispute { .. } => {
                actor.role == Role::Student && actor.id == appointment.student_id
            }

            AppointmentAction::AdminResolve { .. } => actor.role == Role::Admin,
        };

        if !authorized {
            warn!(
                "{:?} {} is not authorized for {:?} on appointment {}",
                actor.role, actor.id, action, appointment.id
            );
            return Err(AppointmentError::Unauthorized);
        }

        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new(crate::models::BookingRules::default().min_dispute_remark_chars)
    }
}

/// Whether a past-due appointment is eligible for the lapse sweep.
pub fn is_past_due(appointment: &Appointment, now: chrono::NaiveDateTime) -> bool {
    appointment.is_active() && appointment.end_datetime() <= now
}
