use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, DEFAULT_CLINIC_UTC_OFFSET_MINUTES, DEFAULT_CONSULTATIONS_PER_PAGE};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub allow_follow_up_after_complete: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            allow_follow_up_after_complete: true,
        }
    }
}

impl TestConfig {
    /// Point the config at a wiremock server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_public_url: AppConfig::default_storage_public_url(&self.supabase_url),
            clinic_utc_offset_minutes: DEFAULT_CLINIC_UTC_OFFSET_MINUTES,
            allow_follow_up_after_complete: self.allow_follow_up_after_complete,
            consultations_per_page: DEFAULT_CONSULTATIONS_PER_PAGE,
            api_port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
        }
    }

    // The clinic role lives in the Users table, so these only pick a
    // recognisable email; the mocks decide what role it resolves to.
    pub fn patient(email: &str) -> Self {
        Self::new(email)
    }

    pub fn dentist(email: &str) -> Self {
        Self::new(email)
    }

    pub fn secretary(email: &str) -> Self {
        Self::new(email)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "aud": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row fixtures shaped like the clinic's PostgREST tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn user_role_row(email: &str, role: &str) -> Value {
        json!({ "email": email, "role": role })
    }

    pub fn patient_row(id: i64, email: &str) -> Value {
        json!({
            "id": id,
            "FirstName": "Ana",
            "MiddleName": null,
            "LastName": "Santos",
            "Age": 29,
            "BirthDate": "1996-03-14",
            "Email": email,
            "Address": "12 Mabini St, Quezon City",
            "Gender": "Female",
            "ContactNo": "09171234567"
        })
    }

    pub fn dentist_row(id: i64, email: &str) -> Value {
        json!({
            "id": id,
            "DentistName": "Dr. Liza Reyes",
            "ContactNo": "09180001111",
            "Email": email,
            "LicenseNo": "PRC-0042",
            "Address": "88 Katipunan Ave",
            "LicenseNoUrl": null
        })
    }

    pub fn secretary_row(dentist_id: i64, email: &str) -> Value {
        json!({
            "user_id": Uuid::new_v4(),
            "dentist_id": dentist_id,
            "name": "Mara Cruz",
            "email": email,
            "role": "secretary"
        })
    }

    pub fn availability_row(dentist_id: i64, date: &str, is_available: bool) -> Value {
        json!({
            "id": 1,
            "DentistId": dentist_id,
            "Date": date,
            "IsAvailable": is_available
        })
    }

    pub fn consultation_row(id: i64, patient_id: i64, dentist_id: i64, date: &str, status: &str) -> Value {
        json!({
            "id": id,
            "PatientId": patient_id,
            "DentistId": dentist_id,
            "AppointmentDate": date,
            "Status": status,
            "followupdate": null,
            "rejection_reason": null
        })
    }

    pub fn diagnosis_row(id: i64, consultation_id: i64, created_at: Option<&str>) -> Value {
        json!({
            "id": id,
            "ConsultationId": consultation_id,
            "InitialDiagnosis": "Dental caries",
            "AffectedTooth": "36",
            "Confidence": 0.8734,
            "ImageUrl": format!("diagnosis-images/{}.jpg", id),
            "FinalDiagnosis": null,
            "FinalDiagnosisDesc": null,
            "created_at": created_at
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert_eq!(
            app_config.storage_public_url,
            "http://localhost:54321/storage/v1/object/public/"
        );
        assert!(app_config.is_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::dentist("doc@example.com");
        let user_model = user.to_user();

        assert_eq!(user_model.email, Some("doc@example.com".to_string()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
