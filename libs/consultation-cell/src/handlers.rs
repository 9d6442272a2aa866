use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Duration;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};

use auth_cell::RoleResolver;
use dentist_cell::models::DateRange;
use dentist_cell::{AvailabilityService, DentistService};
use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentForm, ConfirmRequest, ConsultationView, FollowUpRequest, OutcomeRequest, RejectRequest,
    ScheduleOutcome, TransitionOutcome, WorkflowAction,
};
use crate::services::reminders::DEFAULT_REMINDER_DAYS;
use crate::services::workflow::validate_action;
use crate::services::{
    follow_up_reminders, paginate, ListFilter, ListQuery, ListingService, SchedulerService, StatsService,
    WorkflowPolicy, WorkflowService,
};

#[derive(Debug, Deserialize)]
pub struct ReminderQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub dentist_id: Option<i64>,
}

// Payload problems are reported before the role lookup goes out.
async fn transition(
    config: &AppConfig,
    auth_token: &str,
    user: &User,
    consultation_id: i64,
    action: WorkflowAction,
) -> Result<Json<TransitionOutcome>, AppError> {
    validate_action(&action)?;

    let scope = RoleResolver::new(config)
        .authorize(user, auth_token, WorkflowPolicy::actors(action.kind()))
        .await?;

    let outcome = WorkflowService::new(config)
        .apply(consultation_id, action, &scope, auth_token)
        .await?;
    Ok(Json(outcome))
}

// ==============================================================================
// CLINICIAN VIEWS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_consultations(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist, Role::Secretary])
        .await?;
    let filter = ListFilter::from_query(&query)?;

    let consultations = ListingService::new(&config)
        .clinician_list(scope.dentist_scope()?, auth.token())
        .await?;

    let policy = WorkflowPolicy::from_config(&config);
    let rows: Vec<ConsultationView> = filter
        .apply(consultations)
        .into_iter()
        .map(|c| policy.view(c, scope.role))
        .collect();
    let page = paginate(rows, query.page.unwrap_or(1), config.consultations_per_page);

    Ok(Json(json!({
        "consultations": page.items,
        "page": page.page,
        "total_pages": page.total_pages,
        "total_records": page.total_records,
        "summary": page.summary
    })))
}

#[axum::debug_handler]
pub async fn get_reminders(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ReminderQuery>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist, Role::Secretary])
        .await?;

    let days = query.days.unwrap_or(DEFAULT_REMINDER_DAYS);
    if days < 0 {
        return Err(AppError::ValidationError("days must not be negative".to_string()));
    }

    let consultations = ListingService::new(&config)
        .clinician_list(scope.dentist_scope()?, auth.token())
        .await?;
    let reminders: Vec<_> =
        follow_up_reminders(&consultations, config.clinic_now().naive_local(), Duration::days(days)).collect();

    Ok(Json(json!({
        "reminders": reminders,
        "total": reminders.len()
    })))
}

#[axum::debug_handler]
pub async fn get_stats(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist, Role::Secretary])
        .await?;

    let stats = StatsService::new(&config)
        .dashboard(scope.dentist_scope()?, auth.token())
        .await?;
    Ok(Json(json!(stats)))
}

// ==============================================================================
// PATIENT VIEWS
// ==============================================================================

/// Everything the patient dashboard shows, fetched side by side.
#[axum::debug_handler]
pub async fn patient_dashboard(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient])
        .await?;
    let token = auth.token();

    let listing = ListingService::new(&config);
    let patients = PatientService::new(&config);
    let dentists = DentistService::new(&config);
    let availability = AvailabilityService::new(&config);

    let (active, completed, history, dentist_list, calendar) = futures::try_join!(
        async {
            match scope.patient_id {
                Some(id) => listing.patient_active(id, token).await.map_err(AppError::from),
                None => Ok(Vec::new()),
            }
        },
        async {
            match scope.patient_id {
                Some(id) => listing.patient_completed(id, token).await.map_err(AppError::from),
                None => Ok(Vec::new()),
            }
        },
        async {
            match scope.patient_id {
                Some(id) => patients.history(id, token).await.map_err(AppError::from),
                None => Ok(Vec::new()),
            }
        },
        async { dentists.list_dentists(token).await.map_err(AppError::from) },
        async {
            match query.dentist_id {
                Some(dentist_id) => {
                    let range = DateRange {
                        from: Some(config.clinic_today()),
                        to: None,
                    };
                    availability
                        .query(dentist_id, range, token)
                        .await
                        .map(Some)
                        .map_err(AppError::from)
                }
                None => Ok(None),
            }
        },
    )?;

    let policy = WorkflowPolicy::from_config(&config);
    let active: Vec<ConsultationView> = active.into_iter().map(|c| policy.view(c, scope.role)).collect();
    let completed: Vec<ConsultationView> = completed.into_iter().map(|c| policy.view(c, scope.role)).collect();

    Ok(Json(json!({
        "active": active,
        "completed": completed,
        "history": history,
        "dentists": dentist_list,
        "availability": calendar
    })))
}

#[axum::debug_handler]
pub async fn schedule_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(form): Json<AppointmentForm>,
) -> Result<Json<ScheduleOutcome>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient])
        .await?;

    let outcome = SchedulerService::new(&config)
        .submit(form, None, &scope, config.clinic_now(), auth.token())
        .await?;
    Ok(Json(outcome))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(form): Json<AppointmentForm>,
) -> Result<Json<ScheduleOutcome>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient])
        .await?;

    let outcome = SchedulerService::new(&config)
        .submit(form, Some(consultation_id), &scope, config.clinic_now(), auth.token())
        .await?;
    Ok(Json(outcome))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(confirm): Query<ConfirmRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    transition(
        &config,
        auth.token(),
        &user,
        consultation_id,
        WorkflowAction::Cancel {
            confirmed: confirm.confirmed,
        },
    )
    .await
}

// ==============================================================================
// WORKFLOW ACTIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn approve_consultation(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<TransitionOutcome>, AppError> {
    transition(&config, auth.token(), &user, consultation_id, WorkflowAction::Approve).await
}

#[axum::debug_handler]
pub async fn reject_consultation(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    transition(
        &config,
        auth.token(),
        &user,
        consultation_id,
        WorkflowAction::Reject { reason: request.reason },
    )
    .await
}

#[axum::debug_handler]
pub async fn set_follow_up(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<FollowUpRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    transition(
        &config,
        auth.token(),
        &user,
        consultation_id,
        WorkflowAction::SetFollowUp {
            date: request.followupdate,
        },
    )
    .await
}

#[axum::debug_handler]
pub async fn set_complete(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    transition(
        &config,
        auth.token(),
        &user,
        consultation_id,
        WorkflowAction::SetComplete {
            confirmed: request.confirmed,
        },
    )
    .await
}

#[axum::debug_handler]
pub async fn record_outcome(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<OutcomeRequest>,
) -> Result<Json<TransitionOutcome>, AppError> {
    transition(
        &config,
        auth.token(),
        &user,
        consultation_id,
        WorkflowAction::RecordOutcome {
            outcome: request.outcome,
        },
    )
    .await
}
