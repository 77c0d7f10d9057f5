//! API configuration

use serde::Deserialize;

use core_kernel::CoreError;

/// Well-known placeholder values that are never accepted as secrets
const PLACEHOLDER_SECRETS: [&str; 3] = ["change-me-in-production", "changeme", "secret"];

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for session tokens
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Shared secret the ORCID identity proxy sends with each sign-in
    pub identity_proxy_secret: String,
    /// IANA timezone of the institute, used for "today"
    pub institute_timezone: String,
    /// Upload limit for receipts and visa documents
    pub max_receipt_bytes: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: String::new(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/aim".to_string(),
            log_level: "info".to_string(),
            identity_proxy_secret: String::new(),
            institute_timezone: "America/Los_Angeles".to_string(),
            max_receipt_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_*` environment variables, falling back
    /// to the defaults for anything unset
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs as i64)?
            .set_default("database_url", defaults.database_url)?
            .set_default("log_level", defaults.log_level)?
            .set_default("identity_proxy_secret", defaults.identity_proxy_secret)?
            .set_default("institute_timezone", defaults.institute_timezone)?
            .set_default("max_receipt_bytes", defaults.max_receipt_bytes as i64)?
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Refuses to run with an unset or placeholder secret
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InsecureSecret` naming the offending variable.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_secret("API_JWT_SECRET", &self.jwt_secret)?;
        check_secret("API_IDENTITY_PROXY_SECRET", &self.identity_proxy_secret)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn check_secret(name: &str, value: &str) -> Result<(), CoreError> {
    let value = value.trim();
    if value.is_empty() || PLACEHOLDER_SECRETS.iter().any(|p| value.eq_ignore_ascii_case(p)) {
        return Err(CoreError::insecure_secret(name));
    }
    Ok(())
}
