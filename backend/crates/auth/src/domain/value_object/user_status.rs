//! User Status Value Object
//!
//! - **Active**: normal account, can log in
//! - **Inactive**: not yet activated or deactivated, cannot log in
//! - **Banned**: disabled by an administrator, cannot log in

use serde::{Deserialize, Serialize};
use std::fmt;

/// User account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Banned,
}

impl UserStatus {
    /// Get string code for storage/API
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Banned => "banned",
        }
    }

    /// Check if login is allowed
    #[inline]
    pub const fn can_login(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Create from string code
    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "banned" => Some(Self::Banned),
            _ => None,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_active() {
        assert_eq!(UserStatus::default(), UserStatus::Active);
    }

    #[test]
    fn test_can_login() {
        assert!(UserStatus::Active.can_login());
        assert!(!UserStatus::Inactive.can_login());
        assert!(!UserStatus::Banned.can_login());
    }

    #[test]
    fn test_code_round_trip() {
        for status in [UserStatus::Active, UserStatus::Inactive, UserStatus::Banned] {
            assert_eq!(UserStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(UserStatus::from_code("disabled"), None);
    }
}
