pub mod diagnosis;

pub use diagnosis::{ensure_viewable, full_image_url, DiagnosisService};
