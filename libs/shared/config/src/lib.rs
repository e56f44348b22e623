use std::env;
use tracing::warn;

pub const DEFAULT_SLOT_DURATION_MINUTES: i64 = 30;
pub const MAX_SLOT_DURATION_MINUTES: i64 = 24 * 60;
pub const DEFAULT_BOOKING_LOCK_TIMEOUT_MS: u64 = 5_000;
pub const MAX_BOOKING_LOCK_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub slot_duration_minutes: i64,
    pub booking_lock_timeout_ms: u64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, store requests will use the anon key");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            slot_duration_minutes: parse_bounded(
                "SLOT_DURATION_MINUTES",
                env::var("SLOT_DURATION_MINUTES").ok(),
                DEFAULT_SLOT_DURATION_MINUTES,
                MAX_SLOT_DURATION_MINUTES,
            ),
            booking_lock_timeout_ms: parse_bounded(
                "BOOKING_LOCK_TIMEOUT_MS",
                env::var("BOOKING_LOCK_TIMEOUT_MS").ok(),
                DEFAULT_BOOKING_LOCK_TIMEOUT_MS,
                MAX_BOOKING_LOCK_TIMEOUT_MS,
            ),
            server_port: env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key sent as the bearer token on store requests.
    pub fn store_api_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            slot_duration_minutes: DEFAULT_SLOT_DURATION_MINUTES,
            booking_lock_timeout_ms: DEFAULT_BOOKING_LOCK_TIMEOUT_MS,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

/// Positive value no larger than `max`; anything else falls back to `default`.
fn parse_bounded<T>(key: &str, raw: Option<String>, default: T, max: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display + Copy,
{
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() && value <= max => value,
        _ => {
            warn!("{} has invalid value {:?} (allowed 1..={}), using default {}", key, raw, max, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_thirty_minute_slots() {
        let config = AppConfig::default();
        assert_eq!(config.slot_duration_minutes, 30);
        assert!(!config.is_configured());
    }

    #[test]
    fn out_of_range_values_fall_back_to_default() {
        let parse = |raw: &str| {
            parse_bounded("SLOT_DURATION_MINUTES", Some(raw.to_string()), DEFAULT_SLOT_DURATION_MINUTES, MAX_SLOT_DURATION_MINUTES)
        };

        assert_eq!(parse("45"), 45);
        assert_eq!(parse(" 1440 "), MAX_SLOT_DURATION_MINUTES);
        assert_eq!(parse("1441"), DEFAULT_SLOT_DURATION_MINUTES);
        assert_eq!(parse("9223372036854775807"), DEFAULT_SLOT_DURATION_MINUTES);
        assert_eq!(parse("0"), DEFAULT_SLOT_DURATION_MINUTES);
        assert_eq!(parse("soon"), DEFAULT_SLOT_DURATION_MINUTES);
        assert_eq!(
            parse_bounded("SLOT_DURATION_MINUTES", None, DEFAULT_SLOT_DURATION_MINUTES, MAX_SLOT_DURATION_MINUTES),
            DEFAULT_SLOT_DURATION_MINUTES
        );
    }

    #[test]
    fn store_key_prefers_service_role() {
        let mut config = AppConfig {
            supabase_anon_key: "anon".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.store_api_key(), "anon");

        config.supabase_service_role_key = "service".to_string();
        assert_eq!(config.store_api_key(), "service");
    }
}
