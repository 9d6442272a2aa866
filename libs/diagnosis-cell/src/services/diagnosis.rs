use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use tracing::{debug, info, warn};

use auth_cell::AccessScope;
use consultation_cell::services::workflow::ensure_owned;
use consultation_cell::{Consultation, ConsultationStatus, WorkflowService};
use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};
use shared_utils::upload::{decode_upload, FileUpload};

use crate::models::{
    newest_first, Diagnosis, DiagnosisError, DiagnosisView, ImageView, UpdateDiagnosisRequest, UploadedImage,
    DIAGNOSIS_BUCKET,
};

const TABLE: &str = "Diagnosis";

/// Absolute URL for a stored image path. Already absolute URLs come back
/// unchanged, so applying it twice is harmless.
pub fn full_image_url(storage_public_url: &str, url: &str) -> String {
    if url.is_empty() || url.starts_with("http") {
        return url.to_string();
    }

    let base = storage_public_url.trim_end_matches('/');
    format!("{}/{}", base, url.trim_start_matches('/'))
}

/// Clinicians see diagnoses once the visit happened; patients once it is complete.
pub fn ensure_viewable(consultation: &Consultation, scope: &AccessScope) -> Result<(), DiagnosisError> {
    let viewable = if scope.role.is_clinician() {
        consultation.status.allows_diagnosis_view()
    } else {
        consultation.status == ConsultationStatus::Complete
    };

    if viewable {
        Ok(())
    } else {
        warn!(
            "{} asked for diagnoses of consultation {} in status {}",
            scope.email, consultation.id, consultation.status
        );
        Err(DiagnosisError::NotViewable(consultation.status))
    }
}

pub struct DiagnosisService {
    supabase: SupabaseClient,
    consultations: WorkflowService,
    storage_public_url: String,
}

impl DiagnosisService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            consultations: WorkflowService::new(config),
            storage_public_url: config.storage_public_url.clone(),
        }
    }

    pub fn view(&self, diagnosis: Diagnosis) -> DiagnosisView {
        DiagnosisView {
            full_image_url: full_image_url(&self.storage_public_url, diagnosis.image_url.as_deref().unwrap_or_default()),
            confidence_display: diagnosis.confidence_display(),
            diagnosis,
        }
    }

    /// Diagnoses of one consultation, most recent first. A consultation with
    /// nothing recorded yet yields an empty list.
    pub async fn list_diagnoses(
        &self,
        consultation_id: i64,
        scope: &AccessScope,
        auth_token: &str,
    ) -> Result<Vec<DiagnosisView>, DiagnosisError> {
        let consultation = self.consultations.get_owned(consultation_id, scope, auth_token).await?;
        ensure_viewable(&consultation, scope)?;

        let query = PostgrestQuery::table(TABLE)
            .select("*")
            .eq("ConsultationId", consultation_id);
        let mut rows: Vec<Diagnosis> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| DiagnosisError::Remote(e.to_string()))?;

        rows.sort_by(newest_first);

        debug!("Found {} diagnoses for consultation {}", rows.len(), consultation_id);
        Ok(rows.into_iter().map(|d| self.view(d)).collect())
    }

    pub async fn get_diagnosis(&self, diagnosis_id: i64, auth_token: &str) -> Result<Diagnosis, DiagnosisError> {
        let query = PostgrestQuery::table(TABLE).select("*").eq("id", diagnosis_id);
        let rows: Vec<Diagnosis> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| DiagnosisError::Remote(e.to_string()))?;

        rows.into_iter().next().ok_or(DiagnosisError::NotFound(diagnosis_id))
    }

    /// Diagnosis plus the consultation it belongs to, after scope checks.
    async fn accessible(
        &self,
        diagnosis_id: i64,
        scope: &AccessScope,
        auth_token: &str,
    ) -> Result<Diagnosis, DiagnosisError> {
        let diagnosis = self.get_diagnosis(diagnosis_id, auth_token).await?;
        let consultation = self
            .consultations
            .get_owned(diagnosis.consultation_id, scope, auth_token)
            .await?;
        ensure_viewable(&consultation, scope)?;
        Ok(diagnosis)
    }

    /// Write the clinician's final diagnosis. Nothing else on the row changes.
    pub async fn update_diagnosis(
        &self,
        diagnosis_id: i64,
        request: UpdateDiagnosisRequest,
        scope: &AccessScope,
        auth_token: &str,
    ) -> Result<DiagnosisView, DiagnosisError> {
        self.accessible(diagnosis_id, scope, auth_token).await?;

        let blank_to_null = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let changes = json!({
            "FinalDiagnosis": blank_to_null(request.final_diagnosis),
            "FinalDiagnosisDesc": blank_to_null(request.final_diagnosis_desc),
        });

        let query = PostgrestQuery::table(TABLE).eq("id", diagnosis_id);
        let rows: Vec<Diagnosis> = self
            .supabase
            .update(&query, changes, auth_token)
            .await
            .map_err(|e| DiagnosisError::Update(e.to_string()))?;

        let updated = rows.into_iter().next().ok_or(DiagnosisError::NotFound(diagnosis_id))?;
        info!("Diagnosis {} updated by {}", diagnosis_id, scope.email);
        Ok(self.view(updated))
    }

    /// Try to fetch the diagnosis image. Failures become a fallback payload.
    pub async fn probe_image(
        &self,
        diagnosis_id: i64,
        scope: &AccessScope,
        auth_token: &str,
    ) -> Result<ImageView, DiagnosisError> {
        let diagnosis = self.accessible(diagnosis_id, scope, auth_token).await?;
        let url = full_image_url(&self.storage_public_url, diagnosis.image_url.as_deref().unwrap_or_default());
        Ok(self.probe_url(&url).await)
    }

    pub async fn probe_url(&self, url: &str) -> ImageView {
        if url.is_empty() {
            return ImageView::unavailable(url);
        }

        match self.supabase.http_client().get(url).send().await {
            Ok(response) if response.status().is_success() => ImageView::Available {
                url: url.to_string(),
                content_type: response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            },
            Ok(response) => {
                warn!("Image failed to load ({}): {}", response.status(), url);
                ImageView::unavailable(url)
            }
            Err(e) => {
                warn!("Image failed to load: {} ({})", url, e);
                ImageView::unavailable(url)
            }
        }
    }

    /// Store an image for a consultation and return where it lives.
    pub async fn upload_image(
        &self,
        consultation_id: i64,
        upload: FileUpload,
        scope: &AccessScope,
        auth_token: &str,
    ) -> Result<UploadedImage, DiagnosisError> {
        let file = decode_upload(&upload)?;
        let consultation = self.consultations.get(consultation_id, auth_token).await?;
        ensure_owned(&consultation, scope)?;

        let object_path = file.object_path(&consultation_id.to_string());
        self.supabase
            .upload_object(DIAGNOSIS_BUCKET, &object_path, file.bytes, &file.content_type, auth_token)
            .await
            .map_err(|e| DiagnosisError::Remote(e.to_string()))?;

        let image_path = format!("{}/{}", DIAGNOSIS_BUCKET, object_path);
        info!("Stored diagnosis image for consultation {} at {}", consultation_id, image_path);

        Ok(UploadedImage {
            image_url: full_image_url(&self.storage_public_url, &image_path),
            image_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://demo.supabase.co/storage/v1/object/public/";

    #[test]
    fn relative_paths_get_the_storage_prefix() {
        assert_eq!(
            full_image_url(BASE, "diagnosis-images/42/a.jpg"),
            "https://demo.supabase.co/storage/v1/object/public/diagnosis-images/42/a.jpg"
        );
        assert_eq!(
            full_image_url(BASE.trim_end_matches('/'), "/diagnosis-images/42/a.jpg"),
            "https://demo.supabase.co/storage/v1/object/public/diagnosis-images/42/a.jpg"
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        for raw in ["diagnosis-images/42/a.jpg", "https://cdn.example.com/a.jpg", "http://x/y.png", ""] {
            let once = full_image_url(BASE, raw);
            assert_eq!(full_image_url(BASE, &once), once);
        }
    }
}
