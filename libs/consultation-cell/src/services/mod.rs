pub mod listing;
pub mod reminders;
pub mod scheduler;
pub mod stats;
pub mod workflow;

pub use listing::{paginate, ListFilter, ListQuery, ListingService, Page, StatusFilter};
pub use reminders::{follow_up_reminders, FollowUpReminder};
pub use scheduler::SchedulerService;
pub use stats::{DashboardStats, StatsService};
pub use workflow::{WorkflowPolicy, WorkflowService};
