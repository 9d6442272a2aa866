use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use auth_cell::RoleResolver;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::PatientError;
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn get_my_record(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient])
        .await?;

    let patient = PatientService::new(&config)
        .get_by_email(&scope.email, auth.token())
        .await?
        .ok_or(PatientError::NotFound)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_my_history(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient])
        .await?;

    // No patient row yet means nothing has been booked, so no history.
    let history = match scope.patient_id {
        Some(patient_id) => PatientService::new(&config).history(patient_id, auth.token()).await?,
        None => Vec::new(),
    };

    Ok(Json(json!({
        "history": history,
        "total": history.len()
    })))
}
