use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use auth_cell::router::auth_routes;
use auth_cell::AuthStateHub;
use consultation_cell::router::consultation_routes;
use dentist_cell::router::dentist_routes;
use diagnosis_cell::router::diagnosis_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>, events: AuthStateHub) -> Router {
    let configured = state.is_configured();

    Router::new()
        .route("/", get(|| async { "Dental Clinic API is running!" }))
        .route(
            "/health",
            get(move || async move { Json(health_body(configured)) }),
        )
        .nest("/auth", auth_routes(state.clone(), events))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/dentists", dentist_routes(state.clone()))
        .nest("/consultations", consultation_routes(state.clone()))
        .nest("/diagnoses", diagnosis_routes(state))
}

fn health_body(configured: bool) -> Value {
    json!({
        "status": if configured { "ok" } else { "degraded" },
        "configured": configured
    })
}
