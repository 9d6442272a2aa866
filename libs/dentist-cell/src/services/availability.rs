use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{AvailabilityCalendar, AvailabilityEntry, AvailabilityError, DateRange};

const TABLE: &str = "DentistAvailability";

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Flip the day's flag, or open the day if it has no row yet.
    ///
    /// `today` is the clinic-local date; earlier days are refused before any
    /// remote call.
    pub async fn toggle(
        &self,
        dentist_id: i64,
        date: NaiveDate,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<AvailabilityEntry, AvailabilityError> {
        if date < today {
            warn!("Dentist {} tried to toggle past date {}", dentist_id, date);
            return Err(AvailabilityError::PastDate);
        }

        let existing = self.entry(dentist_id, date, auth_token).await?;

        let written: Vec<AvailabilityEntry> = match existing {
            Some(entry) => {
                let query = PostgrestQuery::table(TABLE)
                    .eq("DentistId", dentist_id)
                    .eq("Date", date);
                self.supabase
                    .update(&query, json!({ "IsAvailable": !entry.is_available }), auth_token)
                    .await
            }
            None => {
                self.supabase
                    .insert(
                        TABLE,
                        json!({ "DentistId": dentist_id, "Date": date, "IsAvailable": true }),
                        auth_token,
                    )
                    .await
            }
        }
        .map_err(|e| AvailabilityError::Remote(e.to_string()))?;

        let entry = written
            .into_iter()
            .next()
            .ok_or_else(|| AvailabilityError::Remote("no row returned".to_string()))?;

        info!(
            "Availability for dentist {} on {} set to {}",
            dentist_id, entry.date, entry.is_available
        );
        Ok(entry)
    }

    pub async fn entry(
        &self,
        dentist_id: i64,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<AvailabilityEntry>, AvailabilityError> {
        let query = PostgrestQuery::table(TABLE)
            .select("DentistId, Date, IsAvailable")
            .eq("DentistId", dentist_id)
            .eq("Date", date);

        let rows: Vec<AvailabilityEntry> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| AvailabilityError::Remote(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    /// Whether the dentist explicitly opened `date`. Missing rows count as closed.
    pub async fn is_bookable(&self, dentist_id: i64, date: NaiveDate, auth_token: &str) -> Result<bool, AvailabilityError> {
        Ok(self
            .entry(dentist_id, date, auth_token)
            .await?
            .map(|entry| entry.is_available)
            .unwrap_or(false))
    }

    pub async fn query(
        &self,
        dentist_id: i64,
        range: DateRange,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityEntry>, AvailabilityError> {
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(AvailabilityError::InvalidRange { from, to });
            }
        }
        debug!("Fetching availability for dentist {} in {:?}", dentist_id, range);

        let mut query = PostgrestQuery::table(TABLE)
            .select("DentistId, Date, IsAvailable")
            .eq("DentistId", dentist_id);
        if let Some(from) = range.from {
            query = query.gte("Date", from);
        }
        if let Some(to) = range.to {
            query = query.lte("Date", to);
        }

        self.supabase
            .select(&query.order("Date", true), auth_token)
            .await
            .map_err(|e| AvailabilityError::Remote(e.to_string()))
    }

    pub async fn calendar(
        &self,
        dentist_id: i64,
        range: DateRange,
        auth_token: &str,
    ) -> Result<AvailabilityCalendar, AvailabilityError> {
        let entries = self.query(dentist_id, range, auth_token).await?;
        Ok(AvailabilityCalendar::from_entries(entries))
    }
}
