use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{Patient, PatientDetails, PatientError, PatientHistoryEntry};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_by_email(&self, email: &str, auth_token: &str) -> Result<Option<Patient>, PatientError> {
        debug!("Fetching patient record for {}", email);

        let query = PostgrestQuery::table("Patient").select("*").eq("Email", email);
        let rows: Vec<Patient> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| PatientError::Lookup(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    /// Write `details` onto the patient row keyed by `email`, creating it on
    /// first booking.
    pub async fn upsert_by_email(
        &self,
        email: &str,
        details: &PatientDetails,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let gender = details.validate()?;

        let mut row = json!({
            "FirstName": details.first_name.trim(),
            "MiddleName": details.middle_name.as_deref().map(str::trim).filter(|m| !m.is_empty()),
            "LastName": details.last_name.trim(),
            "Age": details.age,
            "BirthDate": details.birth_date,
            "Address": details.address.trim(),
            "Gender": gender.as_str(),
            "ContactNo": details.contact_no.trim(),
        });
        row["Email"] = Value::String(email.to_string());

        let written: Vec<Patient> = match self.get_by_email(email, auth_token).await? {
            Some(existing) => {
                debug!("Updating patient {} for {}", existing.id, email);
                let query = PostgrestQuery::table("Patient").eq("id", existing.id);
                self.supabase
                    .update(&query, row, auth_token)
                    .await
                    .map_err(|e| PatientError::Update(e.to_string()))?
            }
            None => {
                debug!("Creating patient record for {}", email);
                self.supabase
                    .insert("Patient", row, auth_token)
                    .await
                    .map_err(|e| PatientError::Insert(e.to_string()))?
            }
        };

        let patient = written.into_iter().next().ok_or(PatientError::NotFound)?;
        info!("Patient {} saved for {}", patient.id, email);
        Ok(patient)
    }

    pub async fn history(&self, patient_id: i64, auth_token: &str) -> Result<Vec<PatientHistoryEntry>, PatientError> {
        let query = PostgrestQuery::table("patient_history")
            .select("*")
            .eq("patient_id", patient_id)
            .order("date", false);

        self.supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| PatientError::Lookup(e.to_string()))
    }
}
