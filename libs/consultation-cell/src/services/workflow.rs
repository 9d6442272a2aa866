use serde_json::{json, Value};
use tracing::{debug, info, warn};

use auth_cell::AccessScope;
use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};
use shared_models::auth::Role;

use crate::models::{
    ActionKind, Consultation, ConsultationError, ConsultationStatus, ConsultationView,
    TransitionError, TransitionOutcome, VisitOutcome, WorkflowAction,
};
use crate::services::listing::ListingService;

pub(crate) const TABLE: &str = "Consultation";

/// The one table of legal consultation moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowPolicy {
    pub allow_follow_up_after_complete: bool,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            allow_follow_up_after_complete: true,
        }
    }
}

impl WorkflowPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            allow_follow_up_after_complete: config.allow_follow_up_after_complete,
        }
    }

    /// Statuses an action may start from.
    pub fn sources(&self, kind: ActionKind) -> Vec<ConsultationStatus> {
        use ConsultationStatus::*;

        match kind {
            ActionKind::Approve | ActionKind::Reject => vec![Pending],
            ActionKind::RecordOutcome => vec![Approved],
            ActionKind::SetFollowUp if self.allow_follow_up_after_complete => {
                vec![PartiallyComplete, Complete]
            }
            ActionKind::SetFollowUp => vec![PartiallyComplete],
            ActionKind::SetComplete => vec![FollowUp, PartiallyComplete],
            ActionKind::Cancel | ActionKind::Reschedule => vec![Pending, Approved],
        }
    }

    pub fn actors(kind: ActionKind) -> &'static [Role] {
        match kind {
            ActionKind::Approve | ActionKind::Reject | ActionKind::SetFollowUp | ActionKind::SetComplete => {
                &[Role::Dentist, Role::Secretary]
            }
            ActionKind::RecordOutcome => &[Role::Dentist],
            ActionKind::Cancel | ActionKind::Reschedule => &[Role::Patient],
        }
    }

    pub fn permits(&self, from: ConsultationStatus, kind: ActionKind) -> bool {
        self.sources(kind).contains(&from)
    }

    pub fn check_actor(kind: ActionKind, role: Role) -> Result<(), TransitionError> {
        if Self::actors(kind).contains(&role) {
            Ok(())
        } else {
            Err(TransitionError::WrongActor { action: kind, role })
        }
    }

    /// Status after `action`, or `None` when the consultation is removed.
    pub fn next_status(
        &self,
        from: ConsultationStatus,
        action: &WorkflowAction,
    ) -> Result<Option<ConsultationStatus>, TransitionError> {
        let kind = action.kind();
        if !self.permits(from, kind) {
            return Err(TransitionError::NotAllowed { action: kind, from });
        }

        let next = match action {
            WorkflowAction::Approve => Some(ConsultationStatus::Approved),
            WorkflowAction::Reject { .. } => Some(ConsultationStatus::Rejected),
            WorkflowAction::RecordOutcome { outcome } => Some(outcome.status()),
            WorkflowAction::SetFollowUp { .. } => Some(ConsultationStatus::FollowUp),
            WorkflowAction::SetComplete { .. } => Some(ConsultationStatus::Complete),
            WorkflowAction::Cancel { .. } => None,
            WorkflowAction::Reschedule { .. } => Some(ConsultationStatus::Pending),
        };
        Ok(next)
    }

    /// Buttons to show `role` for a consultation in `status`.
    pub fn available_actions(&self, status: ConsultationStatus, role: Role) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| Self::actors(*kind).contains(&role))
            .filter(|kind| self.permits(status, *kind))
            .collect()
    }

    pub fn view(&self, consultation: Consultation, role: Role) -> ConsultationView {
        let can_view_diagnosis = if role.is_clinician() {
            consultation.status.allows_diagnosis_view()
        } else {
            consultation.status == ConsultationStatus::Complete
        };

        ConsultationView {
            actions: self.available_actions(consultation.status, role),
            can_view_diagnosis,
            consultation,
        }
    }
}

/// Local checks on the action payload. Runs before anything is read remotely.
pub fn validate_action(action: &WorkflowAction) -> Result<(), ConsultationError> {
    match action {
        WorkflowAction::Reject { reason } if reason.trim().is_empty() => Err(ConsultationError::Validation(
            "Please provide a reason for rejection.".to_string(),
        )),
        WorkflowAction::SetComplete { confirmed: false } => Err(ConsultationError::Validation(
            "Please confirm marking this consultation as complete.".to_string(),
        )),
        WorkflowAction::Cancel { confirmed: false } => Err(ConsultationError::Validation(
            "Please confirm cancelling this appointment.".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Column changes written with the new status. Only `Reject` leaves a
/// `rejection_reason`; `Complete` and `Rejected` never keep a follow-up date.
pub fn write_changes(action: &WorkflowAction, next: ConsultationStatus) -> Value {
    let mut changes = json!({
        "Status": next,
        "rejection_reason": null,
    });

    match action {
        WorkflowAction::Reject { reason } => {
            changes["rejection_reason"] = json!(reason.trim());
            changes["followupdate"] = Value::Null;
        }
        WorkflowAction::SetFollowUp { date } => {
            changes["followupdate"] = json!(date);
        }
        WorkflowAction::SetComplete { .. }
        | WorkflowAction::RecordOutcome {
            outcome: VisitOutcome::Complete,
        } => {
            changes["followupdate"] = Value::Null;
        }
        WorkflowAction::Reschedule { dentist_id, date } => {
            changes["DentistId"] = json!(dentist_id);
            changes["AppointmentDate"] = json!(date);
        }
        WorkflowAction::Approve
        | WorkflowAction::RecordOutcome { .. }
        | WorkflowAction::Cancel { .. } => {}
    }

    changes
}

pub struct WorkflowService {
    supabase: SupabaseClient,
    listing: ListingService,
    policy: WorkflowPolicy,
}

impl WorkflowService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            listing: ListingService::new(config),
            policy: WorkflowPolicy::from_config(config),
        }
    }

    pub fn policy(&self) -> WorkflowPolicy {
        self.policy
    }

    pub async fn get(&self, consultation_id: i64, auth_token: &str) -> Result<Consultation, ConsultationError> {
        debug!("Fetching consultation {}", consultation_id);

        let query = PostgrestQuery::table(TABLE).select("*").eq("id", consultation_id);
        let rows: Vec<Consultation> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| ConsultationError::Remote(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(ConsultationError::NotFound(consultation_id))
    }

    /// Fetch a consultation the caller is allowed to act on.
    pub async fn get_owned(
        &self,
        consultation_id: i64,
        scope: &AccessScope,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.get(consultation_id, auth_token).await?;
        ensure_owned(&consultation, scope)?;
        Ok(consultation)
    }

    /// Run one transition end to end and hand back the refreshed list.
    pub async fn apply(
        &self,
        consultation_id: i64,
        action: WorkflowAction,
        scope: &AccessScope,
        auth_token: &str,
    ) -> Result<TransitionOutcome, ConsultationError> {
        validate_action(&action)?;
        WorkflowPolicy::check_actor(action.kind(), scope.role).map_err(|e| {
            warn!("{} denied on consultation {}: {}", scope.email, consultation_id, e);
            e
        })?;

        let current = self.get_owned(consultation_id, scope, auth_token).await?;
        let next = self.policy.next_status(current.status, &action).map_err(|e| {
            warn!("Rejected transition on consultation {}: {}", consultation_id, e);
            e
        })?;

        let written = match next {
            Some(status) => Some(
                self.write(&current, write_changes(&action, status), auth_token)
                    .await?,
            ),
            None => {
                self.remove(&current, auth_token).await?;
                None
            }
        };

        info!(
            "Consultation {} moved from {} by {} ({})",
            consultation_id,
            current.status,
            action.kind(),
            next.map(|s| s.to_string()).unwrap_or_else(|| "deleted".to_string())
        );

        let consultations = self.refreshed_list(scope, auth_token).await?;

        Ok(TransitionOutcome {
            consultation_id,
            status: next,
            consultation: written,
            consultations,
        })
    }

    /// PATCH guarded by the status text read beforehand. An empty result
    /// means someone else moved the consultation first.
    pub(crate) async fn write(
        &self,
        current: &Consultation,
        changes: Value,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let query = PostgrestQuery::table(TABLE)
            .eq("id", current.id)
            .eq("Status", current.stored_status.as_str());

        let rows: Vec<Consultation> = self
            .supabase
            .update(&query, changes, auth_token)
            .await
            .map_err(|e| ConsultationError::Remote(e.to_string()))?;

        rows.into_iter().next().ok_or(ConsultationError::StaleStatus {
            id: current.id,
            expected: current.status,
        })
    }

    async fn remove(&self, current: &Consultation, auth_token: &str) -> Result<(), ConsultationError> {
        let query = PostgrestQuery::table(TABLE)
            .eq("id", current.id)
            .eq("Status", current.stored_status.as_str());

        let rows: Vec<Value> = self
            .supabase
            .delete(&query, auth_token)
            .await
            .map_err(|e| ConsultationError::Remote(e.to_string()))?;

        if rows.is_empty() {
            return Err(ConsultationError::StaleStatus {
                id: current.id,
                expected: current.status,
            });
        }
        Ok(())
    }

    async fn refreshed_list(
        &self,
        scope: &AccessScope,
        auth_token: &str,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        if scope.role.is_clinician() {
            let dentist_id = scope.dentist_id.ok_or_else(|| {
                ConsultationError::Validation("Your account is not linked to a dentist".to_string())
            })?;
            self.listing.clinician_list(dentist_id, auth_token).await
        } else {
            match scope.patient_id {
                Some(patient_id) => self.listing.patient_active(patient_id, auth_token).await,
                None => Ok(Vec::new()),
            }
        }
    }
}

/// Clinicians act on their dentist's consultations, patients on their own.
pub fn ensure_owned(consultation: &Consultation, scope: &AccessScope) -> Result<(), ConsultationError> {
    let owned = if scope.role.is_clinician() {
        scope.dentist_id == Some(consultation.dentist_id)
    } else {
        scope.patient_id == Some(consultation.patient_id)
    };

    if owned {
        Ok(())
    } else {
        warn!("{} is outside the scope of consultation {}", scope.email, consultation.id);
        Err(ConsultationError::OutOfScope(consultation.id))
    }
}
