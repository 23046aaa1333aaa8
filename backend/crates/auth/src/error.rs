//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system. Every variant maps to
//! a stable numeric code that clients branch on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::password::{PasswordError, PasswordPolicyError};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Stable response codes
pub mod codes {
    pub const INVALID_PARAMS: u32 = 10001;
    pub const UNAUTHORIZED: u32 = 10002;
    pub const FORBIDDEN: u32 = 10003;
    pub const RATE_LIMITED: u32 = 10004;
    pub const INTERNAL: u32 = 10005;
    pub const INVALID_CREDENTIALS: u32 = 10101;
    pub const USER_DISABLED: u32 = 10102;
    pub const WRONG_PASSWORD: u32 = 10103;
    pub const INVALID_TOKEN: u32 = 10104;
    pub const USER_EXISTS: u32 = 10105;
    pub const TOO_MANY_ATTEMPTS: u32 = 10106;
    pub const USER_INACTIVE: u32 = 10107;
    pub const INVALID_EMAIL_CODE: u32 = 10108;
}

/// Why an email one-time code was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmailCodeRejection {
    #[error("verification code not found")]
    NotFound,
    #[error("verification code is incorrect")]
    Mismatch,
    #[error("verification code has already been used")]
    Used,
    #[error("verification code has expired")]
    Expired,
}

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request failed validation
    #[error("{0}")]
    Validation(String),

    /// New password violates the password policy
    #[error("{0}")]
    PasswordPolicy(#[from] PasswordPolicyError),

    /// No Authorization header
    #[error("Authorization token is required")]
    MissingToken,

    /// Authorization header is not `Bearer <token>`
    #[error("Authorization header must be 'Bearer <token>'")]
    MalformedAuthHeader,

    /// No identity attached to the request
    #[error("Authentication required")]
    Unauthenticated,

    /// Identity lacks the required role
    #[error("Insufficient permissions")]
    Forbidden,

    /// Unknown user or wrong password
    #[error("Invalid user name or password")]
    InvalidCredentials,

    /// Account is banned
    #[error("Account is disabled")]
    UserDisabled,

    /// Account is not active
    #[error("Account is not activated")]
    UserInactive,

    /// Old password did not match on password change
    #[error("Old password is incorrect")]
    WrongPassword,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token is invalid")]
    TokenInvalid,

    /// Token is on the revocation list
    #[error("Token has been revoked")]
    TokenRevoked,

    /// Refresh token presented where an access token is required, or vice versa
    #[error("Wrong token type")]
    TokenTypeWrong,

    /// Login limiter rejected the attempt
    #[error("Too many login attempts, try again in {retry_after_minutes} minutes")]
    TooManyAttempts { retry_after_minutes: u64 },

    /// Per-address request limit on a non-login endpoint
    #[error("Too many requests, please try again later")]
    RateLimited,

    /// User name or email already registered
    #[error("User name or email already exists")]
    UserExists,

    #[error("{0}")]
    InvalidEmailCode(EmailCodeRejection),

    /// Key-value store failure on a fail-closed path
    #[error("Store error: {0}")]
    Store(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        use AuthError::*;
        match self {
            Validation(_) | PasswordPolicy(_) | WrongPassword | InvalidEmailCode(_) => {
                ErrorKind::BadRequest
            }
            MissingToken | MalformedAuthHeader | Unauthenticated | InvalidCredentials
            | TokenExpired | TokenInvalid | TokenRevoked | TokenTypeWrong => {
                ErrorKind::Unauthorized
            }
            Forbidden | UserDisabled | UserInactive => ErrorKind::Forbidden,
            TooManyAttempts { .. } | RateLimited => ErrorKind::TooManyRequests,
            UserExists => ErrorKind::Conflict,
            Store(_) | Database(_) | Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable numeric response code
    pub fn code(&self) -> u32 {
        use AuthError::*;
        match self {
            Validation(_) | PasswordPolicy(_) => codes::INVALID_PARAMS,
            MissingToken | MalformedAuthHeader | Unauthenticated => codes::UNAUTHORIZED,
            Forbidden => codes::FORBIDDEN,
            InvalidCredentials => codes::INVALID_CREDENTIALS,
            UserDisabled => codes::USER_DISABLED,
            UserInactive => codes::USER_INACTIVE,
            WrongPassword => codes::WRONG_PASSWORD,
            TokenExpired | TokenInvalid | TokenRevoked | TokenTypeWrong => codes::INVALID_TOKEN,
            TooManyAttempts { .. } => codes::TOO_MANY_ATTEMPTS,
            RateLimited => codes::RATE_LIMITED,
            UserExists => codes::USER_EXISTS,
            InvalidEmailCode(_) => codes::INVALID_EMAIL_CODE,
            Store(_) | Database(_) | Internal(_) => codes::INTERNAL,
        }
    }

    /// Convert to AppError. Infrastructure details stay in the logs.
    pub fn to_app_error(&self) -> AppError {
        let message = if self.kind().is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let err = AppError::new(self.kind(), message).with_code(self.code());
        match self {
            AuthError::TooManyAttempts {
                retry_after_minutes,
            } => err.with_action(format!("Try again in {retry_after_minutes} minutes")),
            AuthError::RateLimited => err.with_action("Wait a minute before retrying"),
            _ => err,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Store(msg) => {
                tracing::error!(message = %msg, "Auth store error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::TooManyAttempts { retry_after_minutes } => {
                tracing::warn!(retry_after_minutes, "Login attempt rate limited");
            }
            AuthError::TokenRevoked => {
                tracing::warn!("Revoked token presented");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        if err.is_server_error() {
            AuthError::Internal(err.to_string())
        } else {
            AuthError::Validation(err.message().to_string())
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Policy(e) => AuthError::PasswordPolicy(e),
            PasswordError::Hash(e) => AuthError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_share_code() {
        for err in [
            AuthError::TokenExpired,
            AuthError::TokenInvalid,
            AuthError::TokenRevoked,
            AuthError::TokenTypeWrong,
        ] {
            assert_eq!(err.code(), codes::INVALID_TOKEN);
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_forbidden_and_unauthorized_codes() {
        assert_eq!(AuthError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::Forbidden.code(), 10003);
        assert_eq!(AuthError::MissingToken.code(), 10002);
        assert_eq!(AuthError::MalformedAuthHeader.code(), 10002);
    }

    #[test]
    fn test_too_many_attempts_message() {
        let err = AuthError::TooManyAttempts {
            retry_after_minutes: 15,
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(err.to_string().contains("try again in 15 minutes"));
    }

    #[test]
    fn test_rate_limits_carry_action() {
        let app = AuthError::TooManyAttempts {
            retry_after_minutes: 42,
        }
        .to_app_error();
        assert_eq!(app.code(), codes::TOO_MANY_ATTEMPTS);
        assert_eq!(app.action(), Some("Try again in 42 minutes"));

        assert!(AuthError::RateLimited.to_app_error().action().is_some());
        assert!(AuthError::InvalidCredentials.to_app_error().action().is_none());
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let app = AuthError::Store("redis: connection refused".to_string()).to_app_error();
        assert_eq!(app.status_code(), 500);
        assert_eq!(app.code(), codes::INTERNAL);
        assert!(!app.message().contains("redis"));
    }

    #[test]
    fn test_email_code_rejection_messages_are_distinct() {
        let messages: Vec<String> = [
            EmailCodeRejection::NotFound,
            EmailCodeRejection::Mismatch,
            EmailCodeRejection::Used,
            EmailCodeRejection::Expired,
        ]
        .into_iter()
        .map(|r| AuthError::InvalidEmailCode(r).to_string())
        .collect();

        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
