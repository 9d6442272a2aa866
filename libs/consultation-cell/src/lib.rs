pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    ActionKind, AppointmentDate, Consultation, ConsultationError, ConsultationStatus, TransitionError,
    WorkflowAction,
};
pub use services::{ListingService, SchedulerService, StatsService, WorkflowPolicy, WorkflowService};
