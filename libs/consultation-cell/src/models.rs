use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::auth::Role;
use shared_models::error::AppError;

// ==============================================================================
// STATUS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConsultationStatus {
    Pending,
    Approved,
    Rejected,
    PartiallyComplete,
    FollowUp,
    Complete,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 6] = [
        ConsultationStatus::Pending,
        ConsultationStatus::Approved,
        ConsultationStatus::Rejected,
        ConsultationStatus::PartiallyComplete,
        ConsultationStatus::FollowUp,
        ConsultationStatus::Complete,
    ];

    /// Value stored in the `Status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Approved => "approved",
            ConsultationStatus::Rejected => "rejected",
            ConsultationStatus::PartiallyComplete => "partially complete",
            ConsultationStatus::FollowUp => "follow-up",
            ConsultationStatus::Complete => "complete",
        }
    }

    /// Clinicians open diagnoses only once the visit has happened.
    pub fn allows_diagnosis_view(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::PartiallyComplete
                | ConsultationStatus::Complete
                | ConsultationStatus::FollowUp
        )
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown consultation status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ConsultationStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        ConsultationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(raw.to_string()))
    }
}

impl TryFrom<String> for ConsultationStatus {
    type Error = UnknownStatus;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<ConsultationStatus> for String {
    fn from(status: ConsultationStatus) -> Self {
        status.as_str().to_string()
    }
}

// ==============================================================================
// DATES
// ==============================================================================

/// A booked day, optionally with a time of day. Serializes back to exactly
/// the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppointmentDate {
    raw: String,
    day: NaiveDate,
    time: Option<NaiveTime>,
}

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

impl AppointmentDate {
    pub fn on(day: NaiveDate) -> Self {
        Self {
            raw: day.format("%Y-%m-%d").to_string(),
            day,
            time: None,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Start of the appointment; a bare day counts from midnight.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.day.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid appointment date '{0}'")]
pub struct InvalidDate(pub String);

impl FromStr for AppointmentDate {
    type Err = InvalidDate;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();

        if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Self {
                raw: trimmed.to_string(),
                day,
                time: None,
            });
        }

        let local = DATE_TIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            // Timestamps with an offset keep the wall-clock time they were written in.
            .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.naive_local()))
            .ok_or_else(|| InvalidDate(raw.to_string()))?;

        Ok(Self {
            raw: trimmed.to_string(),
            day: local.date(),
            time: Some(local.time()),
        })
    }
}

impl TryFrom<String> for AppointmentDate {
    type Error = InvalidDate;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<AppointmentDate> for String {
    fn from(date: AppointmentDate) -> Self {
        date.raw
    }
}

impl fmt::Display for AppointmentDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ==============================================================================
// ROWS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientName {
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DentistName {
    #[serde(rename = "DentistName", default)]
    pub dentist_name: Option<String>,
}

/// Row of the `Consultation` table, with whichever relations the query embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConsultationRow")]
pub struct Consultation {
    pub id: i64,
    #[serde(rename = "PatientId")]
    pub patient_id: i64,
    #[serde(rename = "DentistId")]
    pub dentist_id: i64,
    #[serde(rename = "AppointmentDate")]
    pub appointment_date: AppointmentDate,
    #[serde(rename = "Status")]
    pub status: ConsultationStatus,
    /// `Status` exactly as the row holds it, casing included. Guarded writes
    /// filter on this text.
    #[serde(skip_serializing)]
    pub stored_status: String,
    pub followupdate: Option<AppointmentDate>,
    pub rejection_reason: Option<String>,
    #[serde(rename = "Patient", skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientName>,
    #[serde(rename = "Dentist", skip_serializing_if = "Option::is_none")]
    pub dentist: Option<DentistName>,
    #[serde(rename = "Diagnosis", skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct ConsultationRow {
    id: i64,
    #[serde(rename = "PatientId")]
    patient_id: i64,
    #[serde(rename = "DentistId")]
    dentist_id: i64,
    #[serde(rename = "AppointmentDate")]
    appointment_date: AppointmentDate,
    #[serde(rename = "Status")]
    status: String,
    #[serde(default)]
    followupdate: Option<AppointmentDate>,
    #[serde(default)]
    rejection_reason: Option<String>,
    #[serde(rename = "Patient", default)]
    patient: Option<PatientName>,
    #[serde(rename = "Dentist", default)]
    dentist: Option<DentistName>,
    #[serde(rename = "Diagnosis", default)]
    diagnosis: Option<Vec<Value>>,
}

impl TryFrom<ConsultationRow> for Consultation {
    type Error = UnknownStatus;

    fn try_from(row: ConsultationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            patient_id: row.patient_id,
            dentist_id: row.dentist_id,
            appointment_date: row.appointment_date,
            status: row.status.parse()?,
            stored_status: row.status,
            followupdate: row.followupdate,
            rejection_reason: row.rejection_reason,
            patient: row.patient,
            dentist: row.dentist,
            diagnosis: row.diagnosis,
        })
    }
}

impl Consultation {
    pub fn patient_full_name(&self) -> String {
        match &self.patient {
            Some(name) => format!(
                "{} {}",
                name.first_name.as_deref().unwrap_or_default(),
                name.last_name.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string(),
            None => String::new(),
        }
    }

    pub fn has_diagnosis(&self) -> bool {
        self.diagnosis.as_ref().is_some_and(|rows| !rows.is_empty())
    }
}

// ==============================================================================
// WORKFLOW
// ==============================================================================

/// What the clinician recorded after seeing the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitOutcome {
    PartiallyComplete,
    Complete,
}

impl VisitOutcome {
    pub fn status(&self) -> ConsultationStatus {
        match self {
            VisitOutcome::PartiallyComplete => ConsultationStatus::PartiallyComplete,
            VisitOutcome::Complete => ConsultationStatus::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Approve,
    Reject,
    RecordOutcome,
    SetFollowUp,
    SetComplete,
    Cancel,
    Reschedule,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Approve,
        ActionKind::Reject,
        ActionKind::RecordOutcome,
        ActionKind::SetFollowUp,
        ActionKind::SetComplete,
        ActionKind::Cancel,
        ActionKind::Reschedule,
    ];
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Approve => "approve",
            ActionKind::Reject => "reject",
            ActionKind::RecordOutcome => "record outcome",
            ActionKind::SetFollowUp => "set follow-up",
            ActionKind::SetComplete => "set complete",
            ActionKind::Cancel => "cancel",
            ActionKind::Reschedule => "reschedule",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    Approve,
    Reject { reason: String },
    RecordOutcome { outcome: VisitOutcome },
    SetFollowUp { date: Option<AppointmentDate> },
    SetComplete { confirmed: bool },
    Cancel { confirmed: bool },
    Reschedule { dentist_id: i64, date: AppointmentDate },
}

impl WorkflowAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            WorkflowAction::Approve => ActionKind::Approve,
            WorkflowAction::Reject { .. } => ActionKind::Reject,
            WorkflowAction::RecordOutcome { .. } => ActionKind::RecordOutcome,
            WorkflowAction::SetFollowUp { .. } => ActionKind::SetFollowUp,
            WorkflowAction::SetComplete { .. } => ActionKind::SetComplete,
            WorkflowAction::Cancel { .. } => ActionKind::Cancel,
            WorkflowAction::Reschedule { .. } => ActionKind::Reschedule,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot {action} a consultation that is {from}")]
    NotAllowed { action: ActionKind, from: ConsultationStatus },

    #[error("A {role} cannot {action} consultations")]
    WrongActor { action: ActionKind, role: Role },
}

// ==============================================================================
// REQUESTS AND RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowUpRequest {
    #[serde(default)]
    pub followupdate: Option<AppointmentDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeRequest {
    pub outcome: VisitOutcome,
}

/// Booking form submitted by a patient. The patient email always comes from
/// the session.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentForm {
    #[serde(flatten)]
    pub patient: patient_cell::PatientDetails,
    pub dentist_id: Option<i64>,
    pub appointment_date: Option<AppointmentDate>,
}

/// Result of a workflow action: the row as written (absent after a cancel)
/// and the freshly fetched list it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub consultation_id: i64,
    pub status: Option<ConsultationStatus>,
    pub consultation: Option<Consultation>,
    pub consultations: Vec<Consultation>,
}

/// A list row together with what the caller may do with it.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationView {
    #[serde(flatten)]
    pub consultation: Consultation,
    pub actions: Vec<ActionKind>,
    pub can_view_diagnosis: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleOutcome {
    pub message: String,
    pub consultation: Consultation,
    pub active: Vec<Consultation>,
    pub completed: Vec<Consultation>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum ConsultationError {
    #[error("Consultation {0} not found")]
    NotFound(i64),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Consultation {id} changed while you were working on it (expected status {expected})")]
    StaleStatus { id: i64, expected: ConsultationStatus },

    #[error("Consultation {0} is outside your scope")]
    OutOfScope(i64),

    #[error("The selected dentist is not available on {0}. Please choose another date.")]
    DentistUnavailable(NaiveDate),

    #[error("{0}")]
    Remote(String),
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::NotFound(_) => AppError::NotFound(err.to_string()),
            ConsultationError::Validation(msg) => AppError::ValidationError(msg),
            ConsultationError::DentistUnavailable(_) => AppError::ValidationError(err.to_string()),
            ConsultationError::Transition(_) | ConsultationError::StaleStatus { .. } => {
                AppError::Conflict(err.to_string())
            }
            ConsultationError::OutOfScope(_) => AppError::Forbidden(err.to_string()),
            ConsultationError::Remote(msg) => AppError::Database(msg),
        }
    }
}

impl From<patient_cell::PatientError> for ConsultationError {
    fn from(err: patient_cell::PatientError) -> Self {
        match err {
            patient_cell::PatientError::Validation(msg) => ConsultationError::Validation(msg),
            other => ConsultationError::Remote(other.to_string()),
        }
    }
}

impl From<dentist_cell::AvailabilityError> for ConsultationError {
    fn from(err: dentist_cell::AvailabilityError) -> Self {
        ConsultationError::Remote(err.to_string())
    }
}
