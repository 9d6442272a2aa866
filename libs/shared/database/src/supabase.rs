use anyhow::Result;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::query::PostgrestQuery;

/// Failure reported by the remote service. Carried inside `anyhow::Error`
/// so callers can `downcast_ref` when they need the category.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("{message}")]
    Auth { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl SupabaseError {
    fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_error_message(body);
        match status.as_u16() {
            400 | 401 | 403 | 422 if looks_like_auth_error(body) => SupabaseError::Auth {
                status: status.as_u16(),
                message,
            },
            401 | 403 => SupabaseError::Auth { status: status.as_u16(), message },
            404 => SupabaseError::NotFound(message),
            code => SupabaseError::Api { status: code, message },
        }
    }
}

/// GoTrue and PostgREST use different keys for the human readable message.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    body.to_string()
}

fn looks_like_auth_error(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .map(|value| value.get("error_description").is_some() || value.get("msg").is_some())
        .unwrap_or(false)
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Anonymous calls (sign-up, sign-in) authenticate with the anon key.
        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))?,
        );

        Ok(headers)
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("prefer"),
            HeaderValue::from_static("return=representation"),
        );
        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, extra_headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// For endpoints answering `204 No Content` (logout, minimal deletes).
    pub async fn request_without_content(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>)
                                         -> Result<()> {
        self.send(method, path, auth_token, body, None).await?;
        Ok(())
    }

    async fn send(&self, method: Method, path: &str, auth_token: Option<&str>,
                  body: Option<Value>, extra_headers: Option<HeaderMap>)
                  -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::from_response(status, &error_text).into());
        }

        Ok(response)
    }

    pub async fn select<T>(&self, query: &PostgrestQuery, auth_token: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request(Method::GET, &query.to_path(), Some(auth_token), None).await
    }

    pub async fn insert<T>(&self, table: &str, row: Value, auth_token: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        let path = PostgrestQuery::table(table).to_path();
        self.request_with_headers(
            Method::POST,
            &path,
            Some(auth_token),
            Some(row),
            Some(Self::representation_headers()),
        ).await
    }

    /// PATCH every row matched by `query`; returns the rows as written.
    pub async fn update<T>(&self, query: &PostgrestQuery, changes: Value, auth_token: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request_with_headers(
            Method::PATCH,
            &query.to_path(),
            Some(auth_token),
            Some(changes),
            Some(Self::representation_headers()),
        ).await
    }

    pub async fn delete<T>(&self, query: &PostgrestQuery, auth_token: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request_with_headers(
            Method::DELETE,
            &query.to_path(),
            Some(auth_token),
            None,
            Some(Self::representation_headers()),
        ).await
    }

    pub async fn get_user_profile(&self, auth_token: &str) -> Result<Value> {
        self.request::<Value>(
            Method::GET,
            "/auth/v1/user",
            Some(auth_token),
            None,
        ).await
    }

    /// Upload raw bytes to `<bucket>/<object_path>` in object storage.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        auth_token: &str,
    ) -> Result<Value> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let mut headers = self.get_headers(Some(auth_token))?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);
        headers.insert(HeaderName::from_static("x-upsert"), HeaderValue::from_static("true"));

        let response = self.client.post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Storage upload failed ({}): {}", status, error_text);
            return Err(SupabaseError::from_response(status, &error_text).into());
        }

        Ok(response.json::<Value>().await?)
    }

    /// The anon key doubles as the bearer token for calls made before a session exists.
    pub fn anon_token(&self) -> &str {
        &self.anon_key
    }

    pub fn get_public_url(&self, bucket: &str, object_path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, object_path)
    }

    pub fn http_client(&self) -> &Client {
        &self.client
    }
}
