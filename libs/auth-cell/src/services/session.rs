use std::sync::LazyLock;

use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};
use shared_models::auth::Role;
use shared_models::routes;

use crate::models::{
    AuthError, GoTrueTokenResponse, GoTrueUser, PatientProfileInput, Session, SignInRequest,
    SignInResponse, SignUpRequest, SignUpResponse,
};
use crate::services::role::RoleResolver;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const SIGNUP_SUCCESS_MESSAGE: &str =
    "Signup successful! Please check your email to verify your account, then sign in.";

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

fn looks_like_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Form checks done before anything is sent to the auth service.
pub fn validate_sign_up(request: &SignUpRequest) -> Result<Role, AuthError> {
    if !looks_like_email(request.email.trim()) {
        return Err(AuthError::Validation("Please enter a valid email address.".to_string()));
    }
    if request.password != request.confirm_password {
        return Err(AuthError::Validation("Passwords do not match!".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }

    match request.role.parse::<Role>() {
        Ok(role @ (Role::Patient | Role::Dentist)) => Ok(role),
        // Secretaries are created by their dentist, never self-registered.
        _ => Err(AuthError::Validation("User role not recognized.".to_string())),
    }
}

/// Auth-service failures keep their message; everything else is a remote error.
fn map_remote(err: anyhow::Error) -> AuthError {
    match err.downcast_ref::<SupabaseError>() {
        Some(SupabaseError::Auth { message, .. }) if message.to_lowercase().contains("not confirmed") => {
            AuthError::EmailNotConfirmed
        }
        Some(SupabaseError::Auth { message, .. }) => AuthError::InvalidCredentials(message.clone()),
        _ => AuthError::Remote(err.to_string()),
    }
}

pub struct AuthService {
    supabase: SupabaseClient,
    roles: RoleResolver,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            roles: RoleResolver::new(config),
        }
    }

    /// Register a patient or dentist. Each remote step runs in order and a
    /// failure leaves earlier steps in place.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpResponse, AuthError> {
        let role = validate_sign_up(&request)?;
        let email = request.email.trim().to_string();
        debug!("Signing up {} as {}", email, role);

        let created: Value = self
            .supabase
            .request(
                Method::POST,
                "/auth/v1/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": request.password,
                    "data": { "role": role.as_str() }
                })),
            )
            .await
            .map_err(map_remote)?;

        // With autoconfirm on, GoTrue answers with a session wrapping the user.
        let user_value = created.get("user").cloned().unwrap_or_else(|| created.clone());
        let user: GoTrueUser = serde_json::from_value(user_value)
            .map_err(|e| AuthError::Remote(format!("Unexpected sign-up response: {}", e)))?;
        let token = created
            .get("access_token")
            .and_then(Value::as_str)
            .unwrap_or(self.supabase.anon_token())
            .to_string();

        self.supabase
            .insert::<Value>("Users", json!({ "email": email, "role": role.as_str() }), &token)
            .await
            .map_err(|e| AuthError::Remote(e.to_string()))?;

        let (table, row) = match role {
            Role::Patient => ("Patient", patient_row(&email, request.profile.unwrap_or_default())),
            _ => ("Dentist", json!({ "Email": email })),
        };
        self.supabase
            .insert::<Value>(table, row, &token)
            .await
            .map_err(|e| AuthError::Remote(e.to_string()))?;

        info!("Registered {} ({})", email, role);

        let redirect = match role {
            Role::Patient => routes::PATIENT_LOGIN,
            _ => routes::LOGIN,
        };

        Ok(SignUpResponse {
            user_id: user.id,
            email,
            role,
            message: SIGNUP_SUCCESS_MESSAGE.to_string(),
            redirect: redirect.to_string(),
        })
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<SignInResponse, AuthError> {
        let email = request.email.trim().to_string();
        debug!("Signing in {}", email);

        let granted: GoTrueTokenResponse = self
            .supabase
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=password",
                None,
                Some(json!({ "email": email, "password": request.password })),
            )
            .await
            .map_err(map_remote)?;

        if granted.user.email_confirmed_at.is_none() {
            warn!("Sign-in for {} refused: email not confirmed", email);
            return Err(AuthError::EmailNotConfirmed);
        }

        let session_email = granted.user.email.clone().unwrap_or(email);
        let role = self
            .roles
            .resolve_role(&session_email, &granted.access_token)
            .await?;

        info!("{} signed in as {}", session_email, role);

        Ok(SignInResponse {
            session: Session {
                access_token: granted.access_token,
                refresh_token: granted.refresh_token,
                expires_in: granted.expires_in,
                user_id: granted.user.id,
                email: session_email,
            },
            role,
            redirect: role.dashboard_route().to_string(),
        })
    }

    pub async fn sign_out(&self, auth_token: &str) -> Result<(), AuthError> {
        self.supabase
            .request_without_content(Method::POST, "/auth/v1/logout", Some(auth_token), None)
            .await
            .map_err(map_remote)
    }

    /// The remote user behind `auth_token`, with its clinic role.
    pub async fn current_session(&self, auth_token: &str) -> Result<(GoTrueUser, Role), AuthError> {
        let profile = self
            .supabase
            .get_user_profile(auth_token)
            .await
            .map_err(|e| match map_remote(e) {
                AuthError::InvalidCredentials(_) => AuthError::MissingSession,
                other => other,
            })?;
        let user: GoTrueUser = serde_json::from_value(profile)
            .map_err(|e| AuthError::Remote(format!("Unexpected user payload: {}", e)))?;
        let email = user.email.clone().ok_or(AuthError::MissingSession)?;
        let role = self.roles.resolve_role(&email, auth_token).await?;
        Ok((user, role))
    }
}

fn patient_row(email: &str, profile: PatientProfileInput) -> Value {
    let columns = [
        ("FirstName", profile.first_name.map(Value::from)),
        ("MiddleName", profile.middle_name.map(Value::from)),
        ("LastName", profile.last_name.map(Value::from)),
        ("Age", profile.age.map(Value::from)),
        ("BirthDate", profile.birth_date.map(Value::from)),
        ("Address", profile.address.map(Value::from)),
        ("Gender", profile.gender.map(Value::from)),
        ("ContactNo", profile.contact_no.map(Value::from)),
    ];

    let mut row = serde_json::Map::new();
    row.insert("Email".to_string(), json!(email));
    for (column, value) in columns {
        if let Some(value) = value {
            row.insert(column.to_string(), value);
        }
    }
    Value::Object(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str, confirm: &str, role: &str) -> SignUpRequest {
        SignUpRequest {
            email: "ana@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
            role: role.to_string(),
            profile: None,
        }
    }

    fn message(err: AuthError) -> String {
        err.to_string()
    }

    #[test]
    fn sign_up_form_rules() {
        assert_eq!(validate_sign_up(&request("secret1", "secret1", "patient")).unwrap(), Role::Patient);
        assert_eq!(validate_sign_up(&request("secret1", "secret1", " Dentist ")).unwrap(), Role::Dentist);

        assert_eq!(
            message(validate_sign_up(&request("secret1", "secret2", "patient")).unwrap_err()),
            "Passwords do not match!"
        );
        assert_eq!(
            message(validate_sign_up(&request("abc", "abc", "patient")).unwrap_err()),
            "Password must be at least 6 characters."
        );
        assert_eq!(
            message(validate_sign_up(&request("secret1", "secret1", "secretary")).unwrap_err()),
            "User role not recognized."
        );
    }

    #[test]
    fn rejects_malformed_email() {
        let mut bad = request("secret1", "secret1", "patient");
        bad.email = "not-an-email".to_string();
        assert!(matches!(validate_sign_up(&bad), Err(AuthError::Validation(_))));

        for email in ["ana@clinic", "ana smith@example.com", "@example.com"] {
            bad.email = email.to_string();
            assert!(matches!(validate_sign_up(&bad), Err(AuthError::Validation(_))), "{email}");
        }

        bad.email = " ana.santos@example.com ".to_string();
        assert_eq!(validate_sign_up(&bad).unwrap(), Role::Patient);
    }

    #[test]
    fn patient_row_keeps_only_provided_fields() {
        let row = patient_row(
            "ana@example.com",
            PatientProfileInput {
                first_name: Some("Ana".to_string()),
                gender: Some("Female".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(row["Email"], "ana@example.com");
        assert_eq!(row["FirstName"], "Ana");
        assert!(row.get("LastName").is_none());
    }
}
