use std::env;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use tracing::warn;

/// Philippine Standard Time, the clinic's home timezone.
pub const DEFAULT_CLINIC_UTC_OFFSET_MINUTES: i32 = 8 * 60;
pub const DEFAULT_CONSULTATIONS_PER_PAGE: usize = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_public_url: String,
    pub clinic_utc_offset_minutes: i32,
    pub allow_follow_up_after_complete: bool,
    pub consultations_per_page: usize,
    pub api_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });

        let config = Self {
            storage_public_url: env::var("SUPABASE_STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_STORAGE_PUBLIC_URL not set, deriving from SUPABASE_URL");
                    Self::default_storage_public_url(&supabase_url)
                }),
            supabase_url,
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset_minutes: parse_env_or(
                "CLINIC_UTC_OFFSET_MINUTES",
                DEFAULT_CLINIC_UTC_OFFSET_MINUTES,
            ),
            allow_follow_up_after_complete: parse_env_or("ALLOW_FOLLOW_UP_AFTER_COMPLETE", true),
            consultations_per_page: parse_env_or(
                "CONSULTATIONS_PER_PAGE",
                DEFAULT_CONSULTATIONS_PER_PAGE,
            ),
            api_port: parse_env_or("API_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn default_storage_public_url(supabase_url: &str) -> String {
        format!("{}/storage/v1/object/public/", supabase_url.trim_end_matches('/'))
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Offset used to decide which calendar day "today" is for the clinic.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} out of range, falling back to UTC",
                self.clinic_utc_offset_minutes
            );
            Utc.fix()
        })
    }

    pub fn clinic_now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.clinic_offset())
    }

    pub fn clinic_today(&self) -> NaiveDate {
        self.clinic_now().date_naive()
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value ({}), using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
