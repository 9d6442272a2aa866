use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/me", get(handlers::get_my_record))
        .route("/me/history", get(handlers::get_my_history))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
