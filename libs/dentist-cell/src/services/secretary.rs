use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};
use shared_models::auth::Role;

use crate::models::{CreateSecretaryRequest, DentistError, Secretary};

pub struct SecretaryService {
    supabase: SupabaseClient,
}

impl SecretaryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Register a secretary account bound to `dentist_id`.
    pub async fn create_secretary(
        &self,
        dentist_id: i64,
        request: CreateSecretaryRequest,
        auth_token: &str,
    ) -> Result<Secretary, DentistError> {
        let name = request.name.trim();
        let email = request.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(DentistError::Validation("Name and email are required.".to_string()));
        }
        if request.password.chars().count() < 6 {
            return Err(DentistError::Validation(
                "Password must be at least 6 characters.".to_string(),
            ));
        }

        debug!("Dentist {} is creating secretary {}", dentist_id, email);

        let created: Value = self
            .supabase
            .request(
                Method::POST,
                "/auth/v1/signup",
                None,
                Some(json!({
                    "email": email,
                    "password": request.password,
                    "data": { "role": Role::Secretary.as_str() }
                })),
            )
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))?;

        let user_id = created
            .get("user")
            .unwrap_or(&created)
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DentistError::Remote("sign-up returned no user id".to_string()))?
            .to_string();

        self.supabase
            .insert::<Value>(
                "Users",
                json!({ "email": email, "role": Role::Secretary.as_str() }),
                auth_token,
            )
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))?;

        let rows: Vec<Secretary> = self
            .supabase
            .insert(
                "Secretary",
                json!({
                    "user_id": user_id,
                    "dentist_id": dentist_id,
                    "name": name,
                    "email": email,
                    "role": Role::Secretary.as_str()
                }),
                auth_token,
            )
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))?;

        let secretary = rows.into_iter().next().ok_or(DentistError::NotFound)?;
        info!("Secretary {} created for dentist {}", secretary.email, dentist_id);
        Ok(secretary)
    }

    pub async fn list_secretaries(&self, dentist_id: i64, auth_token: &str) -> Result<Vec<Secretary>, DentistError> {
        let query = PostgrestQuery::table("Secretary")
            .select("*")
            .eq("dentist_id", dentist_id)
            .order("name", true);

        self.supabase
            .select(&query, auth_token)
            .await
            .map_err(|e| DentistError::Remote(e.to_string()))
    }
}
