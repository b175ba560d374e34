use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentAction, AppointmentError, AppointmentStatus, CompletionMark,
    ResolutionDecision,
};
use appointment_cell::services::lifecycle::{Actor, AppointmentLifecycleService};
use shared_models::auth::Role;

fn service() -> AppointmentLifecycleService {
    AppointmentLifecycleService::default()
}

fn appointment(status: AppointmentStatus, mark: Option<CompletionMark>) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        consultant_id: Uuid::new_v4(),
        student_id: Uuid::new_v4(),
        date: NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        duration_minutes: 60,
        topic: "Thesis review".to_string(),
        research_title: None,
        status,
        consultant_marked_as: mark,
        student_dispute_remark: None,
        disputed_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn consultant_of(appointment: &Appointment) -> Actor {
    Actor {
        role: Role::Consultant,
        id: appointment.consultant_id,
    }
}

fn student_of(appointment: &Appointment) -> Actor {
    Actor {
        role: Role::Student,
        id: appointment.student_id,
    }
}

fn admin() -> Actor {
    Actor {
        role: Role::Admin,
        id: Uuid::new_v4(),
    }
}

#[test]
fn consultant_accepts_pending_request() {
    let apt = appointment(AppointmentStatus::Pending, None);
    let outcome = service()
        .evaluate(&apt, &consultant_of(&apt), &AppointmentAction::Accept, Utc::now())
        .unwrap();

    assert_eq!(outcome.new_status, AppointmentStatus::Confirmed);
    assert!(outcome.assigns_consultant);
    assert!(!outcome.completes_session);
}

#[test]
fn consultant_declines_pending_request() {
    let apt = appointment(AppointmentStatus::Pending, None);
    let outcome = service()
        .evaluate(&apt, &consultant_of(&apt), &AppointmentAction::Reject, Utc::now())
        .unwrap();

    assert_eq!(outcome.new_status, AppointmentStatus::Cancelled);
    assert!(!outcome.assigns_consultant);
}

#[test]
fn student_withdraws_while_pending() {
    let apt = appointment(AppointmentStatus::Pending, None);
    let outcome = service()
        .evaluate(&apt, &student_of(&apt), &AppointmentAction::Cancel, Utc::now())
        .unwrap();

    assert_eq!(outcome.new_status, AppointmentStatus::Cancelled);
}

#[test]
fn student_cannot_withdraw_after_confirmation() {
    let apt = appointment(AppointmentStatus::Confirmed, None);
    let result = service().evaluate(&apt, &student_of(&apt), &AppointmentAction::Cancel, Utc::now());

    assert_matches!(result, Err(AppointmentError::InvalidTransition(AppointmentStatus::Confirmed)));
}

#[test]
fn student_cannot_accept_a_request() {
    let apt = appointment(AppointmentStatus::Pending, None);
    let result = service().evaluate(&apt, &student_of(&apt), &AppointmentAction::Accept, Utc::now());

    assert_matches!(result, Err(AppointmentError::Unauthorized));
}

#[test]
fn other_consultants_cannot_touch_the_appointment() {
    let apt = appointment(AppointmentStatus::Pending, None);
    let intruder = Actor {
        role: Role::Consultant,
        id: Uuid::new_v4(),
    };
    let result = service().evaluate(&apt, &intruder, &AppointmentAction::Accept, Utc::now());

    assert_matches!(result, Err(AppointmentError::Unauthorized));
}

#[test]
fn marking_completed_moves_to_student_review() {
    let apt = appointment(AppointmentStatus::Confirmed, None);
    let outcome = service()
        .evaluate(&apt, &consultant_of(&apt), &AppointmentAction::MarkCompleted, Utc::now())
        .unwrap();

    assert_eq!(outcome.new_status, AppointmentStatus::PendingStudentReview);
    assert_eq!(outcome.consultant_marked_as, Some(CompletionMark::Completed));
}

#[test]
fn marking_not_completed_moves_to_student_review() {
    let apt = appointment(AppointmentStatus::Confirmed, None);
    let outcome = service()
        .evaluate(&apt, &consultant_of(&apt), &AppointmentAction::MarkNotCompleted, Utc::now())
        .unwrap();

    assert_eq!(outcome.new_status, AppointmentStatus::PendingStudentReview);
    assert_eq!(outcome.consultant_marked_as, Some(CompletionMark::NotCompleted));
}

#[test]
fn student_confirmation_follows_the_consultant_mark() {
    let apt = appointment(
        AppointmentStatus::PendingStudentReview,
        Some(CompletionMark::Completed),
    );
    let outcome = service()
        .evaluate(&apt, &student_of(&apt), &AppointmentAction::Confirm, Utc::now())
        .unwrap();
    assert_eq!(outcome.new_status, AppointmentStatus::Completed);
    assert!(outcome.completes_session);

    let apt = appointment(
        AppointmentStatus::PendingStudentReview,
        Some(CompletionMark::NotCompleted),
    );
    let outcome = service()
        .evaluate(&apt, &student_of(&apt), &AppointmentAction::Confirm, Utc::now())
        .unwrap();
    assert_eq!(outcome.new_status, AppointmentStatus::Cancelled);
    assert!(!outcome.completes_session);
}

#[test]
fn dispute_requires_a_substantial_remark() {
    let apt = appointment(
        AppointmentStatus::PendingStudentReview,
        Some(CompletionMark::NotCompleted),
    );

    let result = service().evaluate(
        &apt,
        &student_of(&apt),
        &AppointmentAction::Dispute {
            remark: "unfair".to_string(),
        },
        Utc::now(),
    );
    assert_matches!(result, Err(AppointmentError::ValidationError(_)));

    let now = Utc::now();
    let outcome = service()
        .evaluate(
            &apt,
            &student_of(&apt),
            &AppointmentAction::Dispute {
                remark: "I did attend, consultant is mistaken".to_string(),
            },
            now,
        )
        .unwrap();
    assert_eq!(outcome.new_status, AppointmentStatus::Disputed);
    assert_eq!(outcome.disputed_at, Some(now));
    assert_eq!(
        outcome.dispute_remark.as_deref(),
        Some("I did attend, consultant is mistaken")
    );
}

#[test]
fn only_admin_clears_a_dispute() {
    let apt = appointment(AppointmentStatus::Disputed, Some(CompletionMark::NotCompleted));

    let result = service().evaluate(
        &apt,
        &consultant_of(&apt),
        &AppointmentAction::AdminResolve {
            decision: ResolutionDecision::MarkCompleted,
        },
        Utc::now(),
    );
    assert_matches!(result, Err(AppointmentError::Unauthorized));

    let outcome = service()
        .evaluate(
            &apt,
            &admin(),
            &AppointmentAction::AdminResolve {
                decision: ResolutionDecision::MarkCompleted,
            },
            Utc::now(),
        )
        .unwrap();
    assert_eq!(outcome.new_status, AppointmentStatus::Completed);
    assert!(outcome.completes_session);

    let outcome = service()
        .evaluate(
            &apt,
            &admin(),
            &AppointmentAction::AdminResolve {
                decision: ResolutionDecision::MarkNotCompleted,
            },
            Utc::now(),
        )
        .unwrap();
    assert_eq!(outcome.new_status, AppointmentStatus::Cancelled);
}

#[test]
fn terminal_states_admit_no_transitions() {
    for status in [AppointmentStatus::Completed, AppointmentStatus::Cancelled] {
        let apt = appointment(status, None);

        let accept = service().evaluate(&apt, &consultant_of(&apt), &AppointmentAction::Accept, Utc::now());
        assert_matches!(accept, Err(AppointmentError::InvalidTransition(_)));

        let cancel = service().evaluate(&apt, &student_of(&apt), &AppointmentAction::Cancel, Utc::now());
        assert_matches!(cancel, Err(AppointmentError::InvalidTransition(_)));

        let resolve = service().evaluate(
            &apt,
            &admin(),
            &AppointmentAction::AdminResolve {
                decision: ResolutionDecision::MarkCompleted,
            },
            Utc::now(),
        );
        assert_matches!(resolve, Err(AppointmentError::InvalidTransition(_)));

        assert!(service().reachable_statuses(status).is_empty());
    }
}

/// Every status an accepted transition lands in must be declared
/// reachable from the starting status.
#[test]
fn accepted_transitions_stay_within_the_graph() {
    let svc = service();
    let cases: Vec<(Appointment, Actor, AppointmentAction)> = {
        let pending = appointment(AppointmentStatus::Pending, None);
        let confirmed = appointment(AppointmentStatus::Confirmed, None);
        let review = appointment(
            AppointmentStatus::PendingStudentReview,
            Some(CompletionMark::Completed),
        );
        let disputed = appointment(AppointmentStatus::Disputed, Some(CompletionMark::NotCompleted));

        vec![
            (pending.clone(), consultant_of(&pending), AppointmentAction::Accept),
            (pending.clone(), consultant_of(&pending), AppointmentAction::Reject),
            (pending.clone(), student_of(&pending), AppointmentAction::Cancel),
            (confirmed.clone(), consultant_of(&confirmed), AppointmentAction::MarkCompleted),
            (confirmed.clone(), consultant_of(&confirmed), AppointmentAction::MarkNotCompleted),
            (review.clone(), student_of(&review), AppointmentAction::Confirm),
            (
                review.clone(),
                student_of(&review),
                AppointmentAction::Dispute {
                    remark: "the session never actually happened".to_string(),
                },
            ),
            (
                disputed.clone(),
                admin(),
                AppointmentAction::AdminResolve {
                    decision: ResolutionDecision::MarkCompleted,
                },
            ),
        ]
    };

    for (apt, actor, action) in cases {
        let outcome = svc.evaluate(&apt, &actor, &action, Utc::now()).unwrap();
        assert!(
            svc.reachable_statuses(apt.status).contains(&outcome.new_status),
            "{:?} -> {:?} is not in the declared graph",
            apt.status,
            outcome.new_status
        );
    }
}

/// The full dispute scenario: confirm, mark not completed, dispute,
/// admin overrules in the student's favor.
#[test]
fn dispute_walk_reaches_completed() {
    let svc = service();
    let mut apt = appointment(AppointmentStatus::Pending, None);

    let outcome = svc
        .evaluate(&apt, &consultant_of(&apt), &AppointmentAction::Accept, Utc::now())
        .unwrap();
    apt.status = outcome.new_status;
    assert_eq!(apt.status, AppointmentStatus::Confirmed);

    let outcome = svc
        .evaluate(&apt, &consultant_of(&apt), &AppointmentAction::MarkNotCompleted, Utc::now())
        .unwrap();
    apt.status = outcome.new_status;
    apt.consultant_marked_as = outcome.consultant_marked_as;
    assert_eq!(apt.status, AppointmentStatus::PendingStudentReview);

    let outcome = svc
        .evaluate(
            &apt,
            &student_of(&apt),
            &AppointmentAction::Dispute {
                remark: "I did attend, consultant is mistaken".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
    apt.status = outcome.new_status;
    apt.disputed_at = outcome.disputed_at;
    assert_eq!(apt.status, AppointmentStatus::Disputed);
    assert!(apt.disputed_at.is_some());

    let outcome = svc
        .evaluate(
            &apt,
            &admin(),
            &AppointmentAction::AdminResolve {
                decision: ResolutionDecision::MarkCompleted,
            },
            Utc::now(),
        )
        .unwrap();
    assert_eq!(outcome.new_status, AppointmentStatus::Completed);
    assert!(outcome.completes_session);
}
