use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::AuthStateHub;

#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AppConfig>,
    pub events: AuthStateHub,
}

pub fn auth_routes(config: Arc<AppConfig>, events: AuthStateHub) -> Router {
    let state = AuthState {
        config: config.clone(),
        events,
    };

    let public_routes = Router::new()
        .route("/signup", post(handlers::sign_up))
        .route("/signin", post(handlers::sign_in));

    let protected_routes = Router::new()
        .route("/signout", post(handlers::sign_out))
        .route("/session", get(handlers::current_session))
        .route("/scope", get(handlers::access_scope))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
