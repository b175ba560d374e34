pub mod booking;
pub mod conflict;
pub mod feedback;
pub mod lifecycle;
pub mod maintenance;

pub use booking::ConsultationBookingService;
pub use conflict::ConflictDetectionService;
pub use feedback::FeedbackService;
pub use lifecycle::AppointmentLifecycleService;
pub use maintenance::MaintenanceService;
