use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use auth_cell::RoleResolver;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::upload::FileUpload;

use crate::models::{
    AvailabilityCalendar, AvailabilityEntry, CalendarDay, CreateSecretaryRequest, DateRange, DentistProfile,
    Secretary, ToggleAvailabilityRequest, UpdateProfileRequest,
};
use crate::services::{AvailabilityService, DentistService, SecretaryService};

fn calendar_days(calendar: &AvailabilityCalendar, entries: &[AvailabilityEntry], today: NaiveDate) -> Vec<CalendarDay> {
    entries
        .iter()
        .map(|entry| CalendarDay {
            date: entry.date,
            status: calendar.status(entry.date),
            selectable: calendar.is_selectable(entry.date, today),
        })
        .collect()
}

// ==============================================================================
// PROFILE
// ==============================================================================

#[axum::debug_handler]
pub async fn list_dentists(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient, Role::Dentist, Role::Secretary])
        .await?;

    let dentists = DentistService::new(&config).list_dentists(auth.token()).await?;

    Ok(Json(json!({
        "dentists": dentists,
        "total": dentists.len()
    })))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<DentistProfile>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist, Role::Secretary])
        .await?;

    let profile = DentistService::new(&config)
        .get_profile(scope.dentist_scope()?, auth.token())
        .await?;
    Ok(Json(profile))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist])
        .await?;

    let profile = DentistService::new(&config)
        .update_profile(scope.dentist_scope()?, request, auth.token())
        .await?;

    Ok(Json(json!({
        "message": "Profile updated successfully!",
        "profile": profile
    })))
}

#[axum::debug_handler]
pub async fn upload_license(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(upload): Json<FileUpload>,
) -> Result<Json<DentistProfile>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist])
        .await?;

    let profile = DentistService::new(&config)
        .upload_license(scope.dentist_scope()?, upload, auth.token())
        .await?;
    Ok(Json(profile))
}

// ==============================================================================
// SECRETARIES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_secretaries(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Secretary>>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist])
        .await?;

    let secretaries = SecretaryService::new(&config)
        .list_secretaries(scope.dentist_scope()?, auth.token())
        .await?;
    Ok(Json(secretaries))
}

#[axum::debug_handler]
pub async fn create_secretary(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSecretaryRequest>,
) -> Result<Json<Secretary>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist])
        .await?;

    let secretary = SecretaryService::new(&config)
        .create_secretary(scope.dentist_scope()?, request, auth.token())
        .await?;
    Ok(Json(secretary))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_my_availability(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(range): Query<DateRange>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist, Role::Secretary])
        .await?;
    let dentist_id = scope.dentist_scope()?;

    let entries = AvailabilityService::new(&config)
        .query(dentist_id, range, auth.token())
        .await?;
    let calendar = AvailabilityCalendar::from_entries(entries.clone());

    Ok(Json(json!({
        "dentist_id": dentist_id,
        "days": calendar_days(&calendar, &entries, config.clinic_today())
    })))
}

#[axum::debug_handler]
pub async fn toggle_availability(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ToggleAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist])
        .await?;

    let entry = AvailabilityService::new(&config)
        .toggle(scope.dentist_scope()?, request.date, config.clinic_today(), auth.token())
        .await?;

    Ok(Json(json!(entry)))
}

/// Patient-facing picker: any dentist, from the clinic's today unless told otherwise.
#[axum::debug_handler]
pub async fn get_dentist_availability(
    State(config): State<Arc<AppConfig>>,
    Path(dentist_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(range): Query<DateRange>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient, Role::Dentist, Role::Secretary])
        .await?;

    // Clinicians stay inside their own dentist's calendar.
    if scope.role.is_clinician() && scope.dentist_id != Some(dentist_id) {
        return Err(AppError::Forbidden(format!(
            "{} may not view dentist {}'s calendar",
            scope.email, dentist_id
        )));
    }

    let range = DateRange {
        from: range.from.or_else(|| Some(config.clinic_today())),
        to: range.to,
    };
    let entries = AvailabilityService::new(&config)
        .query(dentist_id, range, auth.token())
        .await?;
    let calendar = AvailabilityCalendar::from_entries(entries.clone());

    Ok(Json(json!({
        "dentist_id": dentist_id,
        "days": calendar_days(&calendar, &entries, config.clinic_today()),
        "selectable": calendar.selectable_days(config.clinic_today()).collect::<Vec<_>>()
    })))
}
