use std::env;
use std::time::Duration;
use tracing::warn;

const DEFAULT_BOOKING_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Where appointments and availability templates are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => Some(Self::Memory),
            "supabase" | "postgrest" => Some(Self::Supabase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: Option<String>,
    pub storage_backend: StorageBackend,
    pub booking_timeout_ms: u64,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        let supabase_ready = !supabase_url.is_empty() && !supabase_anon_key.is_empty();

        let storage_backend = match env::var("SCHEDULING_STORE") {
            Ok(value) => StorageBackend::parse(&value).unwrap_or_else(|| {
                warn!("Unknown SCHEDULING_STORE '{}', falling back to in-memory store", value);
                StorageBackend::Memory
            }),
            Err(_) if supabase_ready => StorageBackend::Supabase,
            Err(_) => {
                warn!("SCHEDULING_STORE not set and Supabase not configured, using in-memory store");
                StorageBackend::Memory
            }
        };

        let booking_timeout_ms = match env::var("BOOKING_TIMEOUT_MS") {
            Ok(value) => value.parse::<u64>().unwrap_or_else(|_| {
                warn!("BOOKING_TIMEOUT_MS '{}' is not a number, using default", value);
                DEFAULT_BOOKING_TIMEOUT_MS
            }),
            Err(_) => DEFAULT_BOOKING_TIMEOUT_MS,
        };

        let bind_addr = env::var("API_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_jwt_secret,
            supabase_service_role_key,
            storage_backend,
            booking_timeout_ms,
            bind_addr,
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

    pub fn booking_timeout(&self) -> Duration {
        Duration::from_millis(self.booking_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            supabase_service_role_key: None,
            storage_backend: StorageBackend::Memory,
            booking_timeout_ms: DEFAULT_BOOKING_TIMEOUT_MS,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!(StorageBackend::parse("memory"), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::parse(" Supabase "), Some(StorageBackend::Supabase));
        assert_eq!(StorageBackend::parse("redis"), None);
    }

    #[test]
    fn test_default_config_is_not_configured() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.booking_timeout(), Duration::from_millis(5_000));
    }
}
