pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Diagnosis, DiagnosisError, DiagnosisView, ImageView};
pub use services::{full_image_url, DiagnosisService};
