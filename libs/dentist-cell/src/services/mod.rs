pub mod availability;
pub mod dentist;
pub mod secretary;

pub use availability::AvailabilityService;
pub use dentist::DentistService;
pub use secretary::SecretaryService;
