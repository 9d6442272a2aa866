use serde::{Deserialize, Serialize};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{Consultation, ConsultationError, ConsultationStatus};
use crate::services::workflow::TABLE;

pub const CLINICIAN_SELECT: &str = "*, Patient(FirstName, LastName), Diagnosis(*)";
pub const ACTIVE_SELECT: &str = "*, Dentist(DentistName)";
pub const COMPLETED_SELECT: &str = "*, Dentist(DentistName), Diagnosis(*)";

pub struct ListingService {
    supabase: SupabaseClient,
}

impl ListingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Every consultation of the dentist, soonest first.
    pub async fn clinician_list(&self, dentist_id: i64, auth_token: &str) -> Result<Vec<Consultation>, ConsultationError> {
        debug!("Fetching consultations for dentist {}", dentist_id);

        let query = PostgrestQuery::table(TABLE)
            .select(CLINICIAN_SELECT)
            .eq("DentistId", dentist_id)
            .order("AppointmentDate", true);
        self.fetch(&query, auth_token).await
    }

    pub async fn patient_active(&self, patient_id: i64, auth_token: &str) -> Result<Vec<Consultation>, ConsultationError> {
        let query = PostgrestQuery::table(TABLE)
            .select(ACTIVE_SELECT)
            .eq("PatientId", patient_id)
            .neq("Status", ConsultationStatus::Complete)
            .order("AppointmentDate", true);
        self.fetch(&query, auth_token).await
    }

    pub async fn patient_completed(&self, patient_id: i64, auth_token: &str) -> Result<Vec<Consultation>, ConsultationError> {
        let query = PostgrestQuery::table(TABLE)
            .select(COMPLETED_SELECT)
            .eq("PatientId", patient_id)
            .eq("Status", ConsultationStatus::Complete)
            .order("AppointmentDate", false);
        self.fetch(&query, auth_token).await
    }

    async fn fetch(&self, query: &PostgrestQuery, auth_token: &str) -> Result<Vec<Consultation>, ConsultationError> {
        self.supabase
            .select(query, auth_token)
            .await
            .map_err(|e| ConsultationError::Remote(format!("Error fetching consultations: {}", e)))
    }
}

// ==============================================================================
// FILTERING AND PAGING
// ==============================================================================

/// Query string of the clinician list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(ConsultationStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub status: StatusFilter,
    pub search: Option<String>,
}

impl ListFilter {
    pub fn from_query(query: &ListQuery) -> Result<Self, ConsultationError> {
        let status = match query.status.as_deref().map(str::trim) {
            None | Some("") => StatusFilter::All,
            Some(raw) if raw.eq_ignore_ascii_case("all") => StatusFilter::All,
            Some(raw) => StatusFilter::Only(
                raw.parse()
                    .map_err(|e: crate::models::UnknownStatus| ConsultationError::Validation(e.to_string()))?,
            ),
        };

        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        Ok(Self { status, search })
    }

    pub fn matches(&self, consultation: &Consultation) -> bool {
        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => consultation.status == status,
        };

        let search_ok = match &self.search {
            None => true,
            Some(needle) => consultation.patient_full_name().to_lowercase().contains(needle),
        };

        status_ok && search_ok
    }

    pub fn apply(&self, consultations: Vec<Consultation>) -> Vec<Consultation> {
        consultations.into_iter().filter(|c| self.matches(c)).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_records: usize,
    pub summary: String,
}

/// Slice one page out of `items`. Pages count from 1; out of range requests
/// land on the nearest existing page.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_records = items.len();
    let total_pages = total_records.div_ceil(per_page);
    let page = page.clamp(1, total_pages.max(1));

    let start = (page - 1) * per_page;
    let end = (start + per_page).min(total_records);

    let summary = if total_records == 0 {
        "Showing 0 to 0 of 0 records".to_string()
    } else {
        format!("Showing {} to {} of {} records", start + 1, end, total_records)
    };

    Page {
        items: items.into_iter().skip(start).take(per_page).collect(),
        page,
        total_pages,
        total_records,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn consultation(id: i64, first: &str, last: &str, status: &str) -> Consultation {
        serde_json::from_value(json!({
            "id": id,
            "PatientId": id,
            "DentistId": 7,
            "AppointmentDate": "2025-06-10",
            "Status": status,
            "Patient": { "FirstName": first, "LastName": last }
        }))
        .unwrap()
    }

    #[test]
    fn paging_summary_counts_from_one() {
        let page = paginate((1..=23).collect::<Vec<_>>(), 3, 10);
        assert_eq!(page.items, vec![21, 22, 23]);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.summary, "Showing 21 to 23 of 23 records");

        let first = paginate((1..=23).collect::<Vec<_>>(), 1, 10);
        assert_eq!(first.summary, "Showing 1 to 10 of 23 records");
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        assert_eq!(paginate((1..=5).collect::<Vec<_>>(), 9, 10).page, 1);
        assert_eq!(paginate((1..=5).collect::<Vec<_>>(), 0, 10).page, 1);

        let empty = paginate(Vec::<i32>::new(), 1, 10);
        assert!(empty.items.is_empty());
        assert_eq!(empty.summary, "Showing 0 to 0 of 0 records");
    }

    #[test]
    fn filter_by_status_and_patient_name() {
        let rows = vec![
            consultation(1, "Ana", "Santos", "pending"),
            consultation(2, "Ben", "Cruz", "Pending"),
            consultation(3, "Ana", "Reyes", "complete"),
        ];

        let filter = ListFilter::from_query(&ListQuery {
            status: Some("PENDING".to_string()),
            search: Some("  ana ".to_string()),
            page: None,
        })
        .unwrap();
        let ids: Vec<i64> = filter.apply(rows.clone()).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1]);

        let everything = ListFilter::from_query(&ListQuery {
            status: Some("all".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(everything.apply(rows).len(), 3);
    }

    #[test]
    fn unknown_status_filter_is_a_validation_error() {
        let result = ListFilter::from_query(&ListQuery {
            status: Some("archived".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConsultationError::Validation(_))));
    }
}
