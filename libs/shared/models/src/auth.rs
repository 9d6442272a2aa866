use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::routes;

/// Claims carried by a Supabase access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Authenticated identity taken from a verified access token.
///
/// `role` here is the token role (usually `authenticated`); the clinic role
/// lives in the `Users` table and is resolved separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Dentist,
    Secretary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Dentist => "dentist",
            Role::Secretary => "secretary",
        }
    }

    /// Secretaries share the dentist dashboard, scoped to their dentist.
    pub fn dashboard_route(&self) -> &'static str {
        match self {
            Role::Patient => routes::PATIENT_DASHBOARD,
            Role::Dentist | Role::Secretary => routes::DENTIST_DASHBOARD,
        }
    }

    pub fn is_clinician(&self) -> bool {
        matches!(self, Role::Dentist | Role::Secretary)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "dentist" => Ok(Role::Dentist),
            "secretary" => Ok(Role::Secretary),
            _ => Err(UnknownRole(raw.to_string())),
        }
    }
}
