use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::routes;

use crate::models::{AccessScope, AuthStateChange, SignInRequest, SignInResponse, SignUpRequest, SignUpResponse};
use crate::router::AuthState;
use crate::services::{AuthService, RoleResolver};

#[axum::debug_handler]
pub async fn sign_up(
    State(state): State<AuthState>,
    Json(request): Json<SignUpRequest>,
) -> Result<Json<SignUpResponse>, AppError> {
    let service = AuthService::new(&state.config);
    let response = service.sign_up(request).await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn sign_in(
    State(state): State<AuthState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    let service = AuthService::new(&state.config);
    let response = service.sign_in(request).await?;

    state.events.publish(AuthStateChange::SignedIn {
        user_id: response.session.user_id.clone(),
        email: response.session.email.clone(),
        role: response.role,
    });

    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn sign_out(
    State(state): State<AuthState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&state.config);
    service.sign_out(auth.token()).await?;

    state.events.publish(AuthStateChange::SignedOut { user_id: user.id });

    Ok(Json(json!({
        "message": "Signed out",
        "redirect": routes::LOGIN
    })))
}

#[axum::debug_handler]
pub async fn current_session(
    State(state): State<AuthState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&state.config);
    let (user, role) = service.current_session(auth.token()).await?;

    Ok(Json(json!({
        "user_id": user.id,
        "email": user.email,
        "role": role,
        "redirect": role.dashboard_route()
    })))
}

#[axum::debug_handler]
pub async fn access_scope(
    State(state): State<AuthState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<AccessScope>, AppError> {
    debug!("Resolving access scope for user {}", user.id);
    let scope = RoleResolver::new(&state.config)
        .resolve_scope(&user, auth.token())
        .await?;
    Ok(Json(scope))
}
