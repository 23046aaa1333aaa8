//! Application Configuration
//!
//! Configuration for the Auth application layer, read once at startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use platform::client::TrustedProxies;
use platform::password::HashCost;
use thiserror::Error;

/// What happens to a refresh token once it has been used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshRotation {
    /// The refresh token stays valid until it expires
    #[default]
    Reuse,
    /// The presented refresh token is revoked before the new pair is issued
    RevokeOnUse,
}

impl FromStr for RefreshRotation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" => Ok(Self::Reuse),
            "revoke" | "revoke_on_use" => Ok(Self::RevokeOnUse),
            other => Err(ConfigError::Invalid {
                name: "REFRESH_ROTATION",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC-SHA256 signing secret
    pub jwt_secret: Vec<u8>,
    /// `iss` claim stamped on and required from every token
    pub jwt_issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Clock skew tolerated on `nbf`/`exp`
    pub leeway: Duration,
    /// Max login attempts per client address per hour
    pub login_ip_limit: u32,
    /// Max login attempts per identifier per 15 minutes
    pub login_user_limit: u32,
    /// Deadline for each key-value store call
    pub store_timeout: Duration,
    pub refresh_rotation: RefreshRotation,
    pub email_code_ttl: Duration,
    /// Max email code requests per client address per window
    pub email_code_limit: u32,
    pub email_code_window: Duration,
    pub audit_queue_capacity: usize,
    pub hash_cost: HashCost,
    /// Reverse proxies whose forwarding headers name the client
    pub trusted_proxies: TrustedProxies,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Vec::new(),
            jwt_issuer: "study-upc".to_string(),
            access_ttl: Duration::from_secs(3600),
            refresh_ttl: Duration::from_secs(24 * 3600),
            leeway: Duration::ZERO,
            login_ip_limit: 10,
            login_user_limit: 5,
            store_timeout: Duration::from_millis(500),
            refresh_rotation: RefreshRotation::Reuse,
            email_code_ttl: Duration::from_secs(600),
            email_code_limit: 5,
            email_code_window: Duration::from_secs(60),
            audit_queue_capacity: 1024,
            hash_cost: HashCost::default(),
            trusted_proxies: TrustedProxies::default(),
        }
    }
}

impl AuthConfig {
    /// Create config with a random signing secret (for development)
    pub fn with_random_secret() -> Self {
        Self {
            jwt_secret: platform::crypto::random_bytes(32),
            ..Default::default()
        }
    }

    /// Create config for development. Tokens do not survive a restart.
    pub fn development() -> Self {
        Self::with_random_secret()
    }

    /// Read configuration from the environment.
    ///
    /// `JWT_SECRET` is required unless `allow_random_secret` is set, in which
    /// case a random one is generated.
    pub fn from_env(allow_random_secret: bool) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret.into_bytes(),
            _ if allow_random_secret => {
                tracing::warn!("JWT_SECRET not set, using a random secret");
                platform::crypto::random_bytes(32)
            }
            _ => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        Ok(Self {
            jwt_secret,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            access_ttl: secs_var("JWT_ACCESS_TTL_SECS", defaults.access_ttl)?,
            refresh_ttl: secs_var("JWT_REFRESH_TTL_SECS", defaults.refresh_ttl)?,
            leeway: secs_var("JWT_LEEWAY_SECS", defaults.leeway)?,
            login_ip_limit: parse_var("LOGIN_IP_LIMIT", defaults.login_ip_limit)?,
            login_user_limit: parse_var("LOGIN_USER_LIMIT", defaults.login_user_limit)?,
            store_timeout: Duration::from_millis(parse_var(
                "STORE_TIMEOUT_MS",
                defaults.store_timeout.as_millis() as u64,
            )?),
            refresh_rotation: parse_var("REFRESH_ROTATION", defaults.refresh_rotation)?,
            email_code_ttl: secs_var("EMAIL_CODE_TTL_SECS", defaults.email_code_ttl)?,
            email_code_limit: parse_var("EMAIL_CODE_LIMIT", defaults.email_code_limit)?,
            email_code_window: secs_var("EMAIL_CODE_WINDOW_SECS", defaults.email_code_window)?,
            audit_queue_capacity: parse_var(
                "AUDIT_QUEUE_CAPACITY",
                defaults.audit_queue_capacity,
            )?,
            hash_cost: defaults.hash_cost,
            trusted_proxies: match env::var("TRUSTED_PROXIES") {
                Ok(value) => TrustedProxies::parse(&value).map_err(|_| ConfigError::Invalid {
                    name: "TRUSTED_PROXIES",
                    value,
                })?,
                Err(_) => defaults.trusted_proxies,
            },
        })
    }

    /// `expires_in` reported to clients
    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl.as_secs()
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn secs_var(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_var(name, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.access_ttl_secs(), 3600);
        assert_eq!(config.refresh_ttl, Duration::from_secs(86400));
        assert_eq!(config.login_ip_limit, 10);
        assert_eq!(config.login_user_limit, 5);
        assert_eq!(config.leeway, Duration::ZERO);
        assert_eq!(config.refresh_rotation, RefreshRotation::Reuse);
        assert!(config.trusted_proxies.is_empty());
    }

    #[test]
    fn test_development_has_secret() {
        assert_eq!(AuthConfig::development().jwt_secret.len(), 32);
    }

    #[test]
    fn test_refresh_rotation_from_str() {
        assert_eq!("reuse".parse::<RefreshRotation>().unwrap(), RefreshRotation::Reuse);
        assert_eq!(
            "Revoke".parse::<RefreshRotation>().unwrap(),
            RefreshRotation::RevokeOnUse
        );
        assert!("sometimes".parse::<RefreshRotation>().is_err());
    }
}
