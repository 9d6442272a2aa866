use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};
use shared_utils::upload::{decode_upload, FileUpload};

use crate::models::{Dentist, DentistError, DentistProfile, DentistSummary, UpdateProfileRequest, LICENSE_BUCKET};

const PROFILE_COLUMNS: &str = "id, DentistName, ContactNo, Email, LicenseNo, Address, LicenseNoUrl";

pub struct DentistService {
    supabase: SupabaseClient,
}

impl DentistService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_dentist(&self, dentist_id: i64, auth_token: &str) -> Result<Dentist, DentistError> {
        debug!("Fetching dentist {}", dentist_id);

        let query = PostgrestQuery::table("Dentist")
            .select(PROFILE_COLUMNS)
            .eq("id", dentist_id);
        let rows: Vec<Dentist> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))?;

        rows.into_iter().next().ok_or(DentistError::NotFound)
    }

    pub async fn get_profile(&self, dentist_id: i64, auth_token: &str) -> Result<DentistProfile, DentistError> {
        Ok(self.get_dentist(dentist_id, auth_token).await?.into())
    }

    pub async fn update_profile(
        &self,
        dentist_id: i64,
        request: UpdateProfileRequest,
        auth_token: &str,
    ) -> Result<DentistProfile, DentistError> {
        request.validate()?;

        let changes = json!({
            "DentistName": request.dentist_name.trim(),
            "ContactNo": request.contact_no.trim(),
            "LicenseNo": request.license_no.as_deref().map(str::trim),
            "Address": request.address.as_deref().map(str::trim),
        });

        let query = PostgrestQuery::table("Dentist").eq("id", dentist_id);
        let rows: Vec<Dentist> = self
            .supabase
            .update(&query, changes, auth_token)
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))?;

        let dentist = rows.into_iter().next().ok_or(DentistError::NotFound)?;
        info!("Profile updated for dentist {}", dentist_id);
        Ok(dentist.into())
    }

    /// Store the license scan and point `LicenseNoUrl` at it.
    pub async fn upload_license(
        &self,
        dentist_id: i64,
        upload: FileUpload,
        auth_token: &str,
    ) -> Result<DentistProfile, DentistError> {
        let file = decode_upload(&upload)?;
        let object_path = file.object_path(&dentist_id.to_string());

        self.supabase
            .upload_object(LICENSE_BUCKET, &object_path, file.bytes, &file.content_type, auth_token)
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))?;

        let public_url = self.supabase.get_public_url(LICENSE_BUCKET, &object_path);
        debug!("License for dentist {} stored at {}", dentist_id, public_url);

        let query = PostgrestQuery::table("Dentist").eq("id", dentist_id);
        let rows: Vec<Dentist> = self
            .supabase
            .update(&query, json!({ "LicenseNoUrl": public_url }), auth_token)
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(DentistProfile::from)
            .ok_or(DentistError::NotFound)
    }

    pub async fn list_dentists(&self, auth_token: &str) -> Result<Vec<DentistSummary>, DentistError> {
        let query = PostgrestQuery::table("Dentist")
            .select("id, DentistName")
            .order("DentistName", true);

        self.supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))
    }
}
