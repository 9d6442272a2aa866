use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::models::{AppointmentDate, Consultation, ConsultationStatus};

pub const DEFAULT_REMINDER_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowUpReminder {
    pub consultation_id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub followupdate: AppointmentDate,
    pub overdue: bool,
}

/// Follow-ups due before `now + horizon`, in the order the consultations were
/// given. Consultations without a follow-up date are skipped.
pub fn follow_up_reminders<'a, I>(
    consultations: I,
    now: NaiveDateTime,
    horizon: Duration,
) -> impl Iterator<Item = FollowUpReminder> + 'a
where
    I: IntoIterator<Item = &'a Consultation>,
    I::IntoIter: 'a,
{
    let until = now + horizon;

    consultations
        .into_iter()
        .filter(|c| c.status == ConsultationStatus::FollowUp)
        .filter_map(move |c| {
            let date = c.followupdate.as_ref()?;
            let due = date.starts_at();
            if due > until {
                return None;
            }
            Some(FollowUpReminder {
                consultation_id: c.id,
                patient_id: c.patient_id,
                patient_name: c.patient_full_name(),
                followupdate: date.clone(),
                overdue: overdue(date, now),
            })
        })
}

// A bare day stays current for the whole of that day.
fn overdue(date: &AppointmentDate, now: NaiveDateTime) -> bool {
    match date.time() {
        Some(_) => date.starts_at() < now,
        None => date.day() < now.date(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn follow_up(id: i64, status: &str, date: Option<&str>) -> Consultation {
        serde_json::from_value(json!({
            "id": id,
            "PatientId": 3,
            "DentistId": 7,
            "AppointmentDate": "2025-06-01",
            "Status": status,
            "followupdate": date,
            "Patient": { "FirstName": "Ana", "LastName": "Santos" }
        }))
        .unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn reminders_cover_the_horizon_and_flag_overdue() {
        let rows = vec![
            follow_up(1, "follow-up", Some("2025-06-08T10:00")),
            follow_up(2, "follow-up", Some("2025-06-12")),
            follow_up(3, "follow-up", Some("2025-07-30")),
            follow_up(4, "complete", Some("2025-06-11")),
            follow_up(5, "follow-up", None),
            follow_up(6, "follow-up", Some("2025-06-10")),
        ];

        let reminders: Vec<_> = follow_up_reminders(&rows, now(), Duration::days(DEFAULT_REMINDER_DAYS)).collect();
        let summary: Vec<(i64, bool)> = reminders.iter().map(|r| (r.consultation_id, r.overdue)).collect();

        assert_eq!(summary, vec![(1, true), (2, false), (6, false)]);
        assert_eq!(reminders[0].patient_name, "Ana Santos");
    }

    #[test]
    fn reminders_are_lazy() {
        let rows = vec![follow_up(1, "follow-up", Some("2025-06-11"))];
        let mut reminders = follow_up_reminders(&rows, now(), Duration::days(1));
        assert_eq!(reminders.next().map(|r| r.consultation_id), Some(1));
        assert!(reminders.next().is_none());
    }
}
