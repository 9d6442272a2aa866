use chrono::{DateTime, FixedOffset};
use serde_json::json;
use tracing::{debug, info, warn};

use auth_cell::AccessScope;
use dentist_cell::AvailabilityService;
use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    AppointmentDate, AppointmentForm, Consultation, ConsultationError, ConsultationStatus,
    ScheduleOutcome, WorkflowAction,
};
use crate::services::listing::ListingService;
use crate::services::workflow::{write_changes, WorkflowPolicy, WorkflowService, TABLE};

pub const SCHEDULED_MESSAGE: &str = "Appointment scheduled successfully!";
pub const RESCHEDULED_MESSAGE: &str = "Appointment rescheduled successfully!";

/// Checks the booking form on its own, before anything remote happens.
/// `now` is the clinic-local current time.
pub fn validate_form(
    form: &AppointmentForm,
    now: DateTime<FixedOffset>,
) -> Result<(i64, AppointmentDate), ConsultationError> {
    form.patient.validate()?;

    let dentist_id = form
        .dentist_id
        .ok_or_else(|| ConsultationError::Validation("Please select a dentist.".to_string()))?;
    let date = form
        .appointment_date
        .clone()
        .ok_or_else(|| ConsultationError::Validation("Please select an appointment date.".to_string()))?;

    let now = now.naive_local();
    if date.day() < now.date() {
        return Err(ConsultationError::Validation(
            "Appointment date cannot be earlier than today.".to_string(),
        ));
    }
    if date.time().is_some() && date.starts_at() < now {
        return Err(ConsultationError::Validation(
            "Appointment time cannot be earlier than the current time.".to_string(),
        ));
    }

    Ok((dentist_id, date))
}

pub struct SchedulerService {
    supabase: SupabaseClient,
    patients: PatientService,
    availability: AvailabilityService,
    workflow: WorkflowService,
    listing: ListingService,
}

impl SchedulerService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            patients: PatientService::new(config),
            availability: AvailabilityService::new(config),
            workflow: WorkflowService::new(config),
            listing: ListingService::new(config),
        }
    }

    /// Book a new appointment, or move `existing` to a new dentist and date.
    ///
    /// Steps stop at the first failure. Nothing written by an earlier step is
    /// undone, so a failed consultation write can leave the patient row updated.
    pub async fn submit(
        &self,
        form: AppointmentForm,
        existing: Option<i64>,
        scope: &AccessScope,
        now: DateTime<FixedOffset>,
        auth_token: &str,
    ) -> Result<ScheduleOutcome, ConsultationError> {
        let (dentist_id, date) = validate_form(&form, now)?;

        let reschedule = match existing {
            Some(consultation_id) => {
                let action = WorkflowAction::Reschedule {
                    dentist_id,
                    date: date.clone(),
                };
                WorkflowPolicy::check_actor(action.kind(), scope.role)?;
                let current = self.workflow.get_owned(consultation_id, scope, auth_token).await?;
                let next = self
                    .workflow
                    .policy()
                    .next_status(current.status, &action)?
                    .unwrap_or(ConsultationStatus::Pending);
                Some((current, action, next))
            }
            None => None,
        };

        if !self.availability.is_bookable(dentist_id, date.day(), auth_token).await? {
            warn!("Dentist {} is not available on {}", dentist_id, date.day());
            return Err(ConsultationError::DentistUnavailable(date.day()));
        }

        let patient = self
            .patients
            .upsert_by_email(&scope.email, &form.patient, auth_token)
            .await?;

        let (consultation, message) = match reschedule {
            Some((current, action, next)) => {
                let mut changes = write_changes(&action, next);
                changes["PatientId"] = json!(patient.id);
                let written = self.workflow.write(&current, changes, auth_token).await?;
                info!(
                    "Consultation {} rescheduled to dentist {} on {}",
                    written.id, dentist_id, date
                );
                (written, RESCHEDULED_MESSAGE)
            }
            None => {
                let written = self.insert(patient.id, dentist_id, &date, auth_token).await?;
                info!(
                    "Consultation {} booked for patient {} with dentist {} on {}",
                    written.id, patient.id, dentist_id, date
                );
                (written, SCHEDULED_MESSAGE)
            }
        };

        let (active, completed) = futures::try_join!(
            self.listing.patient_active(patient.id, auth_token),
            self.listing.patient_completed(patient.id, auth_token),
        )?;

        Ok(ScheduleOutcome {
            message: message.to_string(),
            consultation,
            active,
            completed,
        })
    }

    async fn insert(
        &self,
        patient_id: i64,
        dentist_id: i64,
        date: &AppointmentDate,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        debug!("Inserting consultation for patient {}", patient_id);

        let row = json!({
            "PatientId": patient_id,
            "DentistId": dentist_id,
            "Status": ConsultationStatus::Pending,
            "AppointmentDate": date,
        });

        let rows: Vec<Consultation> = self
            .supabase
            .insert(TABLE, row, auth_token)
            .await
            .map_err(|e| ConsultationError::Remote(format!("Error inserting consultation: {}", e)))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ConsultationError::Remote("Error inserting consultation: no row returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use patient_cell::PatientDetails;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 10, 14, 0, 0)
            .unwrap()
    }

    fn form(date: Option<&str>) -> AppointmentForm {
        AppointmentForm {
            patient: PatientDetails {
                first_name: "Ana".to_string(),
                middle_name: None,
                last_name: "Santos".to_string(),
                age: 29,
                birth_date: NaiveDate::from_ymd_opt(1996, 3, 14).unwrap(),
                address: "12 Mabini St".to_string(),
                gender: "Female".to_string(),
                contact_no: "09171234567".to_string(),
            },
            dentist_id: Some(7),
            appointment_date: date.map(|d| d.parse().unwrap()),
        }
    }

    fn validation_message(result: Result<(i64, AppointmentDate), ConsultationError>) -> String {
        match result {
            Err(ConsultationError::Validation(msg)) => msg,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn today_and_later_are_accepted() {
        assert!(validate_form(&form(Some("2025-06-10")), now()).is_ok());
        assert!(validate_form(&form(Some("2025-06-10T15:30")), now()).is_ok());
        let (dentist_id, date) = validate_form(&form(Some("2025-06-11")), now()).unwrap();
        assert_eq!(dentist_id, 7);
        assert_eq!(date.as_str(), "2025-06-11");
    }

    #[test]
    fn past_dates_and_times_are_refused() {
        assert_eq!(
            validation_message(validate_form(&form(Some("2025-06-09")), now())),
            "Appointment date cannot be earlier than today."
        );
        assert_eq!(
            validation_message(validate_form(&form(Some("2025-06-10T09:00")), now())),
            "Appointment time cannot be earlier than the current time."
        );
    }

    #[test]
    fn dentist_and_date_are_required() {
        let mut no_dentist = form(Some("2025-06-11"));
        no_dentist.dentist_id = None;
        assert_eq!(validation_message(validate_form(&no_dentist, now())), "Please select a dentist.");

        assert_eq!(
            validation_message(validate_form(&form(None), now())),
            "Please select an appointment date."
        );
    }

    #[test]
    fn patient_fields_are_checked_first() {
        let mut bad = form(None);
        bad.patient.gender = "n/a".to_string();
        assert!(validation_message(validate_form(&bad, now())).starts_with("Gender must be"));
    }
}
