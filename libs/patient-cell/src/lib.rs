pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Gender, Patient, PatientDetails, PatientError, PatientHistoryEntry};
pub use services::PatientService;
