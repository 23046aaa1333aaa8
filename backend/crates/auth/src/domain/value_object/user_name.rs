//! User Name Value Object
//!
//! ログインと画面表示に使うハンドル。
//!
//! ## 不変条件
//! - ASCII英数字のみ（a-z, A-Z, 0-9）
//! - 長さ: 3〜50文字
//! - 前後の空白は除去してから検証する

use kernel::error::app_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum length for user name (in characters)
pub const USER_NAME_MIN_LENGTH: usize = 3;

/// Maximum length for user name (in characters)
pub const USER_NAME_MAX_LENGTH: usize = 50;

/// Validated user name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
    pub fn new(raw: impl AsRef<str>) -> AppResult<Self> {
        let name = raw.as_ref().trim();
        let len = name.chars().count();

        if len < USER_NAME_MIN_LENGTH || len > USER_NAME_MAX_LENGTH {
            return Err(AppError::bad_request(format!(
                "User name must be {USER_NAME_MIN_LENGTH}-{USER_NAME_MAX_LENGTH} characters"
            )));
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::bad_request(
                "User name may only contain letters and digits",
            ));
        }

        Ok(Self(name.to_string()))
    }

    /// Create from database value (assumed already validated)
    pub fn from_db(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_user_names() {
        assert!(UserName::new("abc").is_ok());
        assert!(UserName::new("Student2024").is_ok());
        assert!(UserName::new("a".repeat(50)).is_ok());
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(UserName::new("  alice ").unwrap().as_str(), "alice");
    }

    #[test]
    fn test_length_bounds() {
        assert!(UserName::new("ab").is_err());
        assert!(UserName::new("a".repeat(51)).is_err());
        assert!(UserName::new("").is_err());
    }

    #[test]
    fn test_rejects_symbols_and_non_ascii() {
        assert!(UserName::new("alice_b").is_err());
        assert!(UserName::new("al ice").is_err());
        assert!(UserName::new("user@example.com").is_err());
        assert!(UserName::new("ユーザー名").is_err());
    }
}
