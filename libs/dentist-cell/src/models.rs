use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;
use shared_utils::upload::UploadError;

pub const PROFILE_WARNING: &str = "Please complete your profile by adding your name, contact number, license number, and address in the Profile section.";

pub const LICENSE_BUCKET: &str = "licenses";

/// Row of the `Dentist` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dentist {
    #[serde(rename = "id")]
    pub id: i64,
    pub dentist_name: Option<String>,
    pub contact_no: Option<String>,
    pub email: String,
    pub license_no: Option<String>,
    pub address: Option<String>,
    pub license_no_url: Option<String>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

impl Dentist {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("DentistName", &self.dentist_name),
            ("ContactNo", &self.contact_no),
            ("LicenseNo", &self.license_no),
            ("Address", &self.address),
        ]
        .into_iter()
        .filter(|(_, value)| is_blank(value))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DentistProfile {
    pub dentist: Dentist,
    pub missing_fields: Vec<&'static str>,
    pub warning: Option<&'static str>,
}

impl From<Dentist> for DentistProfile {
    fn from(dentist: Dentist) -> Self {
        let missing_fields = dentist.missing_fields();
        let warning = (!missing_fields.is_empty()).then_some(PROFILE_WARNING);
        Self {
            dentist,
            missing_fields,
            warning,
        }
    }
}

/// Entry of the patient-facing dentist picker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DentistSummary {
    pub id: i64,
    #[serde(rename = "DentistName")]
    pub dentist_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    pub dentist_name: String,
    pub contact_no: String,
    #[serde(default)]
    pub license_no: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), DentistError> {
        if self.dentist_name.trim().is_empty() || self.contact_no.trim().is_empty() {
            return Err(DentistError::Validation(
                "Please fill in both Dentist Name and Contact Number.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Row of the `Secretary` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secretary {
    pub user_id: String,
    pub dentist_id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSecretaryRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Row of the `DentistAvailability` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityEntry {
    #[serde(rename = "DentistId")]
    pub dentist_id: i64,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "IsAvailable")]
    pub is_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Available,
    Unavailable,
    /// No row for the day; never bookable.
    Unknown,
}

/// One dentist's availability rows keyed by day.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AvailabilityCalendar {
    days: BTreeMap<NaiveDate, bool>,
}

impl AvailabilityCalendar {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = AvailabilityEntry>,
    {
        Self {
            days: entries
                .into_iter()
                .map(|entry| (entry.date, entry.is_available))
                .collect(),
        }
    }

    pub fn status(&self, date: NaiveDate) -> DayStatus {
        match self.days.get(&date) {
            Some(true) => DayStatus::Available,
            Some(false) => DayStatus::Unavailable,
            None => DayStatus::Unknown,
        }
    }

    pub fn is_selectable(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date >= today && self.status(date) == DayStatus::Available
    }

    pub fn selectable_days(&self, today: NaiveDate) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days
            .range(today..)
            .filter(|(_, available)| **available)
            .map(|(date, _)| *date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleAvailabilityRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub selectable: bool,
}

#[derive(Debug, Error)]
pub enum DentistError {
    #[error("Dentist record not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("An error occurred: {0}")]
    Remote(String),
}

impl From<DentistError> for AppError {
    fn from(err: DentistError) -> Self {
        match err {
            DentistError::NotFound => AppError::NotFound(err.to_string()),
            DentistError::Validation(msg) => AppError::ValidationError(msg),
            DentistError::Upload(e) => AppError::BadRequest(e.to_string()),
            DentistError::Remote(_) => AppError::Database(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("Cannot set availability for past dates.")]
    PastDate,

    #[error("Invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("Error updating availability: {0}")]
    Remote(String),
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::PastDate | AvailabilityError::InvalidRange { .. } => {
                AppError::ValidationError(err.to_string())
            }
            AvailabilityError::Remote(_) => AppError::Database(err.to_string()),
        }
    }
}
