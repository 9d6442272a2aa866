use std::cmp::Ordering;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use consultation_cell::ConsultationStatus;
use shared_models::error::AppError;
use shared_utils::upload::UploadError;

pub const DIAGNOSIS_BUCKET: &str = "diagnosis-images";

/// Row of the `Diagnosis` table. The initial fields come from the
/// classifier; only the two `Final*` columns are ever edited here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: i64,
    #[serde(rename = "ConsultationId")]
    pub consultation_id: i64,
    #[serde(rename = "InitialDiagnosis", default)]
    pub initial_diagnosis: Option<String>,
    #[serde(rename = "AffectedTooth", default)]
    pub affected_tooth: Option<String>,
    #[serde(rename = "Confidence", default)]
    pub confidence: Option<f64>,
    #[serde(rename = "ImageUrl", default)]
    pub image_url: Option<String>,
    #[serde(rename = "FinalDiagnosis", default)]
    pub final_diagnosis: Option<String>,
    #[serde(rename = "FinalDiagnosisDesc", default)]
    pub final_diagnosis_desc: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Diagnosis {
    /// Creation instant; absent or unreadable timestamps count as the epoch.
    pub fn created_instant(&self) -> DateTime<Utc> {
        self.created_at
            .as_deref()
            .and_then(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
                    .or_else(|| {
                        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                            .ok()
                            .map(|naive| naive.and_utc())
                    })
            })
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Confidence as a percentage with two decimals, e.g. `87.34%`.
    pub fn confidence_display(&self) -> Option<String> {
        self.confidence.map(|c| format!("{:.2}%", c * 100.0))
    }
}

/// Newest first, ties broken by the higher id.
pub fn newest_first(a: &Diagnosis, b: &Diagnosis) -> Ordering {
    b.created_instant()
        .cmp(&a.created_instant())
        .then_with(|| b.id.cmp(&a.id))
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisView {
    #[serde(flatten)]
    pub diagnosis: Diagnosis,
    pub full_image_url: String,
    pub confidence_display: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDiagnosisRequest {
    #[serde(default)]
    pub final_diagnosis: Option<String>,
    #[serde(default)]
    pub final_diagnosis_desc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImageView {
    Available {
        url: String,
        content_type: Option<String>,
    },
    Unavailable {
        url: String,
        message: String,
    },
}

impl ImageView {
    pub fn unavailable(url: &str) -> Self {
        ImageView::Unavailable {
            url: url.to_string(),
            message: format!("Unable to load image. URL: {}", url),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedImage {
    pub image_path: String,
    pub image_url: String,
}

#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error("Diagnosis {0} not found")]
    NotFound(i64),

    #[error("Diagnoses are not available for a {0} consultation")]
    NotViewable(ConsultationStatus),

    #[error(transparent)]
    Consultation(#[from] consultation_cell::ConsultationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Error updating diagnosis: {0}")]
    Update(String),

    #[error("{0}")]
    Remote(String),
}

impl From<DiagnosisError> for AppError {
    fn from(err: DiagnosisError) -> Self {
        match err {
            DiagnosisError::NotFound(_) => AppError::NotFound(err.to_string()),
            DiagnosisError::NotViewable(_) => AppError::Conflict(err.to_string()),
            DiagnosisError::Consultation(inner) => inner.into(),
            DiagnosisError::Upload(e) => AppError::BadRequest(e.to_string()),
            DiagnosisError::Update(_) | DiagnosisError::Remote(_) => AppError::Database(err.to_string()),
        }
    }
}
