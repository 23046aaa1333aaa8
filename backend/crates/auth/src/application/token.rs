//! Token Codec
//!
//! Issues and validates HS256-signed JWTs. Every token carries its kind
//! (`access` or `refresh`), the issuer, and `iat`/`nbf`/`exp` in unix seconds.
//! Expiry is checked against the injected [`Clock`], not the wall clock, so
//! the codec's notion of "now" is the same one the rest of the service uses.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use platform::clock::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::config::AuthConfig;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};
use crate::error::AuthError;

/// Token kind, serialized as the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub role: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Unique token id, so two tokens issued in the same second differ
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Access and refresh token issued together
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Token validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    /// Bad structure, signature, issuer, or not yet valid
    #[error("token is malformed")]
    Malformed,

    #[error("expected a {expected} token")]
    WrongKind { expected: TokenKind },

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Malformed => AuthError::TokenInvalid,
            TokenError::WrongKind { .. } => AuthError::TokenTypeWrong,
            TokenError::Signing(msg) => AuthError::Internal(msg),
        }
    }
}

/// Signs and validates tokens with one shared secret
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    leeway_secs: i64,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss"]);
        // Time checks run against our clock in `validate`
        validation.validate_exp = false;
        validation.validate_nbf = false;

        Self {
            encoding_key: EncodingKey::from_secret(&config.jwt_secret),
            decoding_key: DecodingKey::from_secret(&config.jwt_secret),
            validation,
            issuer: config.jwt_issuer.clone(),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            leeway_secs: config.leeway.as_secs() as i64,
            clock,
        }
    }

    pub fn issue_access(&self, user_id: UserId, role: UserRole) -> Result<String, TokenError> {
        self.issue(user_id, role, TokenKind::Access, self.access_ttl)
    }

    pub fn issue_refresh(&self, user_id: UserId, role: UserRole) -> Result<String, TokenError> {
        self.issue(user_id, role, TokenKind::Refresh, self.refresh_ttl)
    }

    /// Issue both tokens or neither
    pub fn issue_pair(&self, user_id: UserId, role: UserRole) -> Result<TokenPair, TokenError> {
        let access_token = self.issue_access(user_id, role)?;
        let refresh_token = self.issue_refresh(user_id, role)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl_secs(),
        })
    }

    fn issue(
        &self,
        user_id: UserId,
        role: UserRole,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = self.clock.now().timestamp();
        let claims = Claims {
            user_id,
            role: role.code().to_string(),
            kind,
            jti: platform::crypto::random_secret(16),
            iss: self.issuer.clone(),
            iat: now,
            nbf: now,
            exp: now + ttl.as_secs() as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, issuer and validity window
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected by decoder");
                TokenError::Malformed
            })?
            .claims;

        let now = self.clock.now().timestamp();
        if now >= claims.exp + self.leeway_secs {
            return Err(TokenError::Expired);
        }
        if now < claims.nbf - self.leeway_secs {
            return Err(TokenError::Malformed);
        }

        Ok(claims)
    }

    pub fn validate_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_kind(token, TokenKind::Access)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_kind(token, TokenKind::Refresh)
    }

    fn validate_kind(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;
        if claims.kind != expected {
            return Err(TokenError::WrongKind { expected });
        }
        Ok(claims)
    }

    /// Time until [`validate`](Self::validate) stops accepting the token
    /// (`exp` plus leeway), zero once it has
    pub fn remaining_ttl(&self, claims: &Claims) -> Duration {
        let remaining = claims.exp + self.leeway_secs - self.clock.now().timestamp();
        Duration::from_secs(remaining.max(0) as u64)
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::clock::ManualClock;

    fn codec() -> (TokenCodec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let config = AuthConfig {
            jwt_secret: b"test-secret-test-secret-test-sec".to_vec(),
            ..AuthConfig::default()
        };
        (TokenCodec::new(&config, clock.clone()), clock)
    }

    #[test]
    fn test_round_trip() {
        let (codec, _clock) = codec();
        let token = codec
            .issue_access(UserId::from_raw(42), UserRole::Committee)
            .unwrap();

        let claims = codec.validate(&token).unwrap();
        assert_eq!(claims.user_id.get(), 42);
        assert_eq!(claims.role, "committee");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.iss, "study-upc");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expiry_boundary() {
        let (codec, clock) = codec();
        let token = codec
            .issue_access(UserId::from_raw(1), UserRole::Student)
            .unwrap();

        clock.advance(chrono::Duration::seconds(3599));
        assert!(codec.validate(&token).is_ok());

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(codec.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_not_yet_valid_is_malformed() {
        let (codec, clock) = codec();
        let token = codec
            .issue_access(UserId::from_raw(1), UserRole::Student)
            .unwrap();

        clock.advance(chrono::Duration::seconds(-10));
        assert_eq!(codec.validate(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_leeway_extends_window() {
        let clock = Arc::new(ManualClock::starting_now());
        let config = AuthConfig {
            jwt_secret: b"secret".to_vec(),
            leeway: Duration::from_secs(30),
            ..AuthConfig::default()
        };
        let codec = TokenCodec::new(&config, clock.clone());
        let token = codec
            .issue_access(UserId::from_raw(1), UserRole::Student)
            .unwrap();

        clock.advance(chrono::Duration::seconds(3600 + 29));
        assert!(codec.validate(&token).is_ok());
        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(codec.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_kind_separation() {
        let (codec, _clock) = codec();
        let pair = codec
            .issue_pair(UserId::from_raw(7), UserRole::Admin)
            .unwrap();

        assert!(codec.validate_access(&pair.access_token).is_ok());
        assert!(codec.validate_refresh(&pair.refresh_token).is_ok());
        assert_eq!(
            codec.validate_access(&pair.refresh_token),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access
            })
        );
        assert_eq!(
            codec.validate_refresh(&pair.access_token),
            Err(TokenError::WrongKind {
                expected: TokenKind::Refresh
            })
        );
        assert_eq!(pair.expires_in, 3600);
    }

    #[test]
    fn test_refresh_ttl() {
        let (codec, clock) = codec();
        let token = codec
            .issue_refresh(UserId::from_raw(7), UserRole::Student)
            .unwrap();

        clock.advance(chrono::Duration::hours(23));
        assert!(codec.validate_refresh(&token).is_ok());
        clock.advance(chrono::Duration::hours(1));
        assert_eq!(codec.validate_refresh(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_or_issuer_is_malformed() {
        let (codec, clock) = codec();
        let token = codec
            .issue_access(UserId::from_raw(1), UserRole::Student)
            .unwrap();

        let other_secret = TokenCodec::new(
            &AuthConfig {
                jwt_secret: b"another-secret".to_vec(),
                ..AuthConfig::default()
            },
            clock.clone(),
        );
        assert_eq!(other_secret.validate(&token), Err(TokenError::Malformed));

        let other_issuer = TokenCodec::new(
            &AuthConfig {
                jwt_secret: b"test-secret-test-secret-test-sec".to_vec(),
                jwt_issuer: "someone-else".to_string(),
                ..AuthConfig::default()
            },
            clock,
        );
        assert_eq!(other_issuer.validate(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (codec, _clock) = codec();
        assert_eq!(codec.validate("not.a.jwt"), Err(TokenError::Malformed));
        assert_eq!(codec.validate(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_tokens_are_unique() {
        let (codec, _clock) = codec();
        let a = codec.issue_access(UserId::from_raw(1), UserRole::Student).unwrap();
        let b = codec.issue_access(UserId::from_raw(1), UserRole::Student).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_remaining_ttl_saturates() {
        let (codec, clock) = codec();
        let token = codec
            .issue_access(UserId::from_raw(1), UserRole::Student)
            .unwrap();
        let claims = codec.validate(&token).unwrap();

        clock.advance(chrono::Duration::seconds(600));
        assert_eq!(codec.remaining_ttl(&claims), Duration::from_secs(3000));

        clock.advance(chrono::Duration::hours(2));
        assert_eq!(codec.remaining_ttl(&claims), Duration::ZERO);
    }

    #[test]
    fn test_remaining_ttl_covers_leeway() {
        let clock = Arc::new(ManualClock::starting_now());
        let config = AuthConfig {
            jwt_secret: b"secret".to_vec(),
            leeway: Duration::from_secs(60),
            ..AuthConfig::default()
        };
        let codec = TokenCodec::new(&config, clock.clone());
        let token = codec
            .issue_access(UserId::from_raw(1), UserRole::Student)
            .unwrap();

        clock.advance(chrono::Duration::seconds(3610));
        let claims = codec.validate(&token).unwrap();
        assert_eq!(codec.remaining_ttl(&claims), Duration::from_secs(50));

        clock.advance(chrono::Duration::seconds(50));
        assert_eq!(codec.remaining_ttl(&claims), Duration::ZERO);
        assert_eq!(codec.validate(&token), Err(TokenError::Expired));
    }
}
