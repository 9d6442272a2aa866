use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::Role;
use shared_models::error::AppError;

/// Row of the `Users` table: the clinic role keyed by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleRecord {
    #[serde(default)]
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Who is calling and which slice of clinic data they may touch.
///
/// For secretaries `dentist_id` is the owning dentist, resolved server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessScope {
    pub email: String,
    pub role: Role,
    pub dentist_id: Option<i64>,
    pub patient_id: Option<i64>,
}

impl AccessScope {
    pub fn require(&self, allowed: &[Role]) -> Result<&Self, AuthError> {
        if allowed.contains(&self.role) {
            Ok(self)
        } else {
            Err(AuthError::RoleMismatch {
                required: allowed.to_vec(),
                actual: self.role,
            })
        }
    }

    /// Dentist whose consultations and calendar this caller works on.
    pub fn dentist_scope(&self) -> Result<i64, AuthError> {
        if !self.role.is_clinician() {
            return Err(AuthError::RoleMismatch {
                required: vec![Role::Dentist, Role::Secretary],
                actual: self.role,
            });
        }
        self.dentist_id
            .ok_or_else(|| AuthError::MissingDentistLink(self.email.clone()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientProfileInput {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub contact_no: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default = "default_signup_role")]
    pub role: String,
    /// Demographics collected by the patient sign-up form.
    #[serde(default)]
    pub profile: Option<PatientProfileInput>,
}

fn default_signup_role() -> String {
    Role::Patient.as_str().to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpResponse {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub message: String,
    pub redirect: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInResponse {
    pub session: Session,
    pub role: Role,
    pub redirect: String,
}

/// Subset of the GoTrue token grant response.
#[derive(Debug, Clone, Deserialize)]
pub struct GoTrueTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: GoTrueUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoTrueUser {
    pub id: String,
    pub email: Option<String>,
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthStateChange {
    SignedIn { user_id: String, email: String, role: Role },
    SignedOut { user_id: String },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No active session")]
    MissingSession,

    #[error("User role not found for {0}")]
    MissingRoleRecord(String),

    #[error("User role not recognized: {0}")]
    UnrecognizedRole(String),

    #[error("Role {actual} is not allowed here (requires one of {required:?})")]
    RoleMismatch { required: Vec<Role>, actual: Role },

    #[error("No dentist record is linked to {0}")]
    MissingDentistLink(String),

    #[error("Role lookup failed: {0}")]
    RoleLookupFailed(String),

    /// Message from the remote auth service, passed through unchanged.
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Email not confirmed. Please check your inbox for the verification link.")]
    EmailNotConfirmed,

    #[error("{0}")]
    Validation(String),

    #[error("Auth service error: {0}")]
    Remote(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingSession
            | AuthError::InvalidCredentials(_)
            | AuthError::EmailNotConfirmed => AppError::Auth(err.to_string()),
            AuthError::MissingRoleRecord(_)
            | AuthError::UnrecognizedRole(_)
            | AuthError::RoleMismatch { .. }
            | AuthError::MissingDentistLink(_)
            | AuthError::RoleLookupFailed(_) => AppError::Forbidden(err.to_string()),
            AuthError::Validation(msg) => AppError::ValidationError(msg),
            AuthError::Remote(msg) => AppError::ExternalService(msg),
        }
    }
}
