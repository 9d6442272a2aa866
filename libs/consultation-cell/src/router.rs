use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn consultation_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        // Clinician dashboard
        .route("/", get(handlers::list_consultations).post(handlers::schedule_appointment))
        .route("/reminders", get(handlers::get_reminders))
        .route("/stats", get(handlers::get_stats))
        // Patient dashboard
        .route("/mine", get(handlers::patient_dashboard))
        .route(
            "/{consultation_id}",
            put(handlers::reschedule_appointment).delete(handlers::cancel_appointment),
        )
        // Workflow
        .route("/{consultation_id}/approve", post(handlers::approve_consultation))
        .route("/{consultation_id}/reject", post(handlers::reject_consultation))
        .route("/{consultation_id}/follow-up", post(handlers::set_follow_up))
        .route("/{consultation_id}/complete", post(handlers::set_complete))
        .route("/{consultation_id}/outcome", post(handlers::record_outcome))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
