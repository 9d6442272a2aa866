use serde::Deserialize;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};
use shared_models::auth::{Role, User};

use crate::models::{AccessScope, AuthError, UserRoleRecord};

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct SecretaryLink {
    dentist_id: i64,
}

/// Maps an authenticated identity to its clinic role and data scope.
///
/// Every failure path denies: a lookup error is never treated as "no
/// restriction".
pub struct RoleResolver {
    supabase: SupabaseClient,
}

impl RoleResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn resolve_role(&self, email: &str, auth_token: &str) -> Result<Role, AuthError> {
        debug!("Resolving clinic role for {}", email);

        let query = PostgrestQuery::table("Users")
            .select("email, role")
            .eq("email", email);

        let rows: Vec<UserRoleRecord> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| {
                warn!("Role lookup for {} failed: {}", email, e);
                AuthError::RoleLookupFailed(e.to_string())
            })?;

        let raw = rows
            .into_iter()
            .next()
            .and_then(|row| row.role)
            .ok_or_else(|| {
                warn!("No role row for {}", email);
                AuthError::MissingRoleRecord(email.to_string())
            })?;

        raw.parse::<Role>().map_err(|_| {
            warn!("Unrecognized role '{}' for {}", raw, email);
            AuthError::UnrecognizedRole(raw.clone())
        })
    }

    pub async fn resolve_scope(&self, user: &User, auth_token: &str) -> Result<AccessScope, AuthError> {
        let email = user
            .email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .ok_or(AuthError::MissingSession)?;

        let role = self.resolve_role(email, auth_token).await?;

        let mut scope = AccessScope {
            email: email.to_string(),
            role,
            dentist_id: None,
            patient_id: None,
        };

        match role {
            Role::Dentist => {
                scope.dentist_id = self.lookup_id("Dentist", "Email", email, auth_token).await?;
            }
            Role::Secretary => {
                let query = PostgrestQuery::table("Secretary")
                    .select("dentist_id")
                    .eq("email", email);
                let links: Vec<SecretaryLink> = self
                    .supabase
                    .select(&query, auth_token)
                    .await
                    .map_err(|e| AuthError::RoleLookupFailed(e.to_string()))?;
                let link = links
                    .into_iter()
                    .next()
                    .ok_or_else(|| AuthError::MissingDentistLink(email.to_string()))?;
                scope.dentist_id = Some(link.dentist_id);
            }
            Role::Patient => {
                scope.patient_id = self.lookup_id("Patient", "Email", email, auth_token).await?;
            }
        }

        debug!("Resolved scope for {}: {:?}", email, scope);
        Ok(scope)
    }

    /// Resolve the scope and require one of `allowed`.
    pub async fn authorize(
        &self,
        user: &User,
        auth_token: &str,
        allowed: &[Role],
    ) -> Result<AccessScope, AuthError> {
        let scope = self.resolve_scope(user, auth_token).await?;
        if let Err(err) = scope.require(allowed) {
            warn!("Denied {} ({}): {}", scope.email, scope.role, err);
            return Err(err);
        }
        Ok(scope)
    }

    async fn lookup_id(
        &self,
        table: &str,
        column: &str,
        email: &str,
        auth_token: &str,
    ) -> Result<Option<i64>, AuthError> {
        let query = PostgrestQuery::table(table).select("id").eq(column, email);
        let rows: Vec<IdRow> = self
            .supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| AuthError::RoleLookupFailed(e.to_string()))?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }
}
