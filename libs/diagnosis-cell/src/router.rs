use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn diagnosis_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/consultations/{consultation_id}", get(handlers::list_diagnoses))
        .route("/consultations/{consultation_id}/image", post(handlers::upload_image))
        .route("/{diagnosis_id}", put(handlers::update_diagnosis))
        .route("/{diagnosis_id}/image", get(handlers::get_image))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
