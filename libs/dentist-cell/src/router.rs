use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn dentist_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        // Profile
        .route("/", get(handlers::list_dentists))
        .route("/me", get(handlers::get_my_profile).put(handlers::update_my_profile))
        .route("/me/license", post(handlers::upload_license))
        // Secretaries
        .route("/secretaries", get(handlers::list_secretaries).post(handlers::create_secretary))
        // Availability
        .route("/availability", get(handlers::get_my_availability))
        .route("/availability/toggle", post(handlers::toggle_availability))
        .route("/{dentist_id}/availability", get(handlers::get_dentist_availability))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
