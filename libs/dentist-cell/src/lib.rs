pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    AvailabilityCalendar, AvailabilityEntry, AvailabilityError, DateRange, DayStatus, Dentist,
    DentistError, DentistProfile, DentistSummary, Secretary,
};
pub use services::{AvailabilityService, DentistService, SecretaryService};
