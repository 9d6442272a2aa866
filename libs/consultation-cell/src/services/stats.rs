use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::ConsultationError;
use crate::services::workflow::TABLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_consultations: usize,
    pub total_patients: usize,
}

#[derive(Debug, Deserialize)]
struct PatientRef {
    #[serde(rename = "PatientId")]
    patient_id: i64,
}

impl DashboardStats {
    fn from_refs(refs: &[PatientRef]) -> Self {
        let patients: HashSet<i64> = refs.iter().map(|r| r.patient_id).collect();
        Self {
            total_consultations: refs.len(),
            total_patients: patients.len(),
        }
    }
}

pub struct StatsService {
    supabase: SupabaseClient,
}

impl StatsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn dashboard(&self, dentist_id: i64, auth_token: &str) -> Result<DashboardStats, ConsultationError> {
        debug!("Computing dashboard stats for dentist {}", dentist_id);

        let query = PostgrestQuery::table(TABLE)
            .select("PatientId")
            .eq("DentistId", dentist_id);
        let refs: Vec<PatientRef> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| ConsultationError::Remote(e.to_string()))?;

        Ok(DashboardStats::from_refs(&refs))
    }
}
