use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use auth_cell::RoleResolver;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::upload::FileUpload;

use crate::models::{DiagnosisView, ImageView, UpdateDiagnosisRequest, UploadedImage};
use crate::services::DiagnosisService;

#[axum::debug_handler]
pub async fn list_diagnoses(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient, Role::Dentist, Role::Secretary])
        .await?;

    let diagnoses = DiagnosisService::new(&config)
        .list_diagnoses(consultation_id, &scope, auth.token())
        .await?;

    Ok(Json(json!({
        "consultation_id": consultation_id,
        "diagnoses": diagnoses,
        "total": diagnoses.len()
    })))
}

#[axum::debug_handler]
pub async fn update_diagnosis(
    State(config): State<Arc<AppConfig>>,
    Path(diagnosis_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDiagnosisRequest>,
) -> Result<Json<DiagnosisView>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist, Role::Secretary])
        .await?;

    let updated = DiagnosisService::new(&config)
        .update_diagnosis(diagnosis_id, request, &scope, auth.token())
        .await?;
    Ok(Json(updated))
}

/// Always answers 200 once access is granted; a broken image is reported in the body.
#[axum::debug_handler]
pub async fn get_image(
    State(config): State<Arc<AppConfig>>,
    Path(diagnosis_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<ImageView>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Patient, Role::Dentist, Role::Secretary])
        .await?;

    let view = DiagnosisService::new(&config)
        .probe_image(diagnosis_id, &scope, auth.token())
        .await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn upload_image(
    State(config): State<Arc<AppConfig>>,
    Path(consultation_id): Path<i64>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(upload): Json<FileUpload>,
) -> Result<Json<UploadedImage>, AppError> {
    let scope = RoleResolver::new(&config)
        .authorize(&user, auth.token(), &[Role::Dentist, Role::Secretary])
        .await?;

    let image = DiagnosisService::new(&config)
        .upload_image(consultation_id, upload, &scope, auth.token())
        .await?;
    Ok(Json(image))
}
