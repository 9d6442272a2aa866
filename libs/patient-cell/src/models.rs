use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

/// Row of the `Patient` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Patient {
    #[serde(rename = "id")]
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: String,
    pub age: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub email: String,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub contact_no: Option<String>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = PatientError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(PatientError::Validation(format!(
                "Gender must be Male, Female or Other (got '{}')",
                raw
            ))),
        }
    }
}

/// Demographics written on every booking. The email is never part of it:
/// the row is keyed by the signed-in user's email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDetails {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub age: i32,
    pub birth_date: NaiveDate,
    pub address: String,
    pub gender: String,
    pub contact_no: String,
}

impl PatientDetails {
    pub fn validate(&self) -> Result<Gender, PatientError> {
        let mut missing = Vec::new();
        if self.first_name.trim().is_empty() {
            missing.push("FirstName");
        }
        if self.last_name.trim().is_empty() {
            missing.push("LastName");
        }
        if self.address.trim().is_empty() {
            missing.push("Address");
        }
        if self.contact_no.trim().is_empty() {
            missing.push("ContactNo");
        }
        if self.gender.trim().is_empty() {
            missing.push("Gender");
        }
        if !missing.is_empty() {
            return Err(PatientError::Validation(format!(
                "Please fill in all required fields: {}",
                missing.join(", ")
            )));
        }
        if self.age <= 0 {
            return Err(PatientError::Validation("Age must be a positive number".to_string()));
        }
        self.gender.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientHistoryEntry {
    pub id: i64,
    pub patient_id: i64,
    pub date: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("Patient record not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Error checking patient: {0}")]
    Lookup(String),

    #[error("Error updating patient: {0}")]
    Update(String),

    #[error("Error inserting patient: {0}")]
    Insert(String),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::Validation(msg) => AppError::ValidationError(msg),
            PatientError::Lookup(_) | PatientError::Update(_) | PatientError::Insert(_) => {
                AppError::Database(err.to_string())
            }
        }
    }
}
