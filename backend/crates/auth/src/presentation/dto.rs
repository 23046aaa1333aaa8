//! API DTOs (Data Transfer Objects)

use serde::{Deserialize, Serialize};

use crate::application::sign_in::LoginOutput;
use crate::domain::entity::user::User;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole, user_status::UserStatus};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Register
// ============================================================================

/// Register request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub class: String,
    /// Email code with purpose `register`; marks the email verified
    pub code: Option<String>,
}

// ============================================================================
// Email Code
// ============================================================================

/// Email code request
#[derive(Debug, Clone, Deserialize)]
pub struct EmailCodeRequest {
    pub email: String,
    /// `register` or `login`
    pub purpose: String,
}

// ============================================================================
// Login
// ============================================================================

/// Login request
///
/// Password login sends `username` (or an email in `username`) and
/// `password`; email-code login sends `email` and `code`, optionally with a
/// password.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub code: Option<String>,
}

impl LoginRequest {
    /// Non-blank email code, if this is an email-code login
    pub fn email_code(&self) -> Option<&str> {
        self.code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Identifier counted by the per-identifier login window
    pub fn identifier(&self) -> Option<&str> {
        let candidate = if self.email_code().is_some() {
            self.email.as_deref()
        } else {
            self.username.as_deref()
        };
        candidate.map(str::trim).filter(|i| !i.is_empty())
    }
}

/// Login / refresh response
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub user: UserInfo,
}

impl From<LoginOutput> for LoginResponse {
    fn from(output: LoginOutput) -> Self {
        Self {
            access_token: output.access_token,
            refresh_token: output.refresh_token,
            expires_in: output.expires_in,
            user: UserInfo::from(&output.user),
        }
    }
}

// ============================================================================
// Refresh
// ============================================================================

/// Refresh request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// ============================================================================
// Change Password
// ============================================================================

/// Change password request
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

// ============================================================================
// User Info
// ============================================================================

/// Public user info. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub real_name: String,
    pub major: String,
    pub class: String,
    pub avatar: String,
    pub phone: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.user_name.as_str().to_string(),
            email: user.email.as_str().to_string(),
            real_name: user.real_name.clone(),
            major: user.major.clone(),
            class: user.class.clone(),
            avatar: user.avatar.clone(),
            phone: user.phone.clone(),
            role: user.role,
            status: user.status,
            email_verified: user.email_verified,
            last_login_at: user
                .last_login_at
                .map(|at| at.format(TIMESTAMP_FORMAT).to_string()),
            created_at: user.created_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_identifier_follows_flavor() {
        let password_login = LoginRequest {
            username: Some(" alice ".into()),
            password: Some("secret".into()),
            ..Default::default()
        };
        assert_eq!(password_login.email_code(), None);
        assert_eq!(password_login.identifier(), Some("alice"));

        let code_login = LoginRequest {
            email: Some("a@b.edu".into()),
            code: Some("123456".into()),
            ..Default::default()
        };
        assert_eq!(code_login.email_code(), Some("123456"));
        assert_eq!(code_login.identifier(), Some("a@b.edu"));
    }

    #[test]
    fn test_blank_code_means_password_login() {
        let req = LoginRequest {
            username: Some("alice".into()),
            code: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(req.email_code(), None);
        assert_eq!(req.identifier(), Some("alice"));
    }

    #[test]
    fn test_login_response_omits_missing_refresh_token() {
        let response = LoginResponse {
            access_token: "a".into(),
            refresh_token: None,
            expires_in: 3600,
            user: UserInfo {
                id: UserId::from_raw(1),
                username: "alice".into(),
                email: "a@b.edu".into(),
                real_name: String::new(),
                major: String::new(),
                class: String::new(),
                avatar: String::new(),
                phone: String::new(),
                role: UserRole::Student,
                status: UserStatus::Active,
                email_verified: false,
                last_login_at: None,
                created_at: "2025-01-01 00:00:00".into(),
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("refresh_token").is_none());
        assert_eq!(json["user"]["role"], "student");
        assert_eq!(json["user"]["id"], 1);
    }
}
