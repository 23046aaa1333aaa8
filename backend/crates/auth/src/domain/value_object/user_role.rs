use serde::{Deserialize, Serialize};
use std::fmt;

/// Role carried in tokens and checked by the role gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Committee,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Student, UserRole::Committee, UserRole::Admin];

    #[inline]
    pub const fn code(&self) -> &'static str {
        use UserRole::*;
        match self {
            Student => "student",
            Committee => "committee",
            Admin => "admin",
        }
    }

    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    #[inline]
    pub const fn is_committee_or_higher(&self) -> bool {
        use UserRole::*;
        matches!(self, Committee | Admin)
    }

    /// Parse a role code. Unknown codes yield `None` so a token carrying a
    /// foreign role is rejected instead of panicking.
    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        use UserRole::*;
        match code {
            "student" => Some(Student),
            "committee" => Some(Committee),
            "admin" => Some(Admin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_from_code() {
        assert_eq!(UserRole::from_code("student"), Some(UserRole::Student));
        assert_eq!(UserRole::from_code("committee"), Some(UserRole::Committee));
        assert_eq!(UserRole::from_code("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_code("super_admin"), None);
        assert_eq!(UserRole::from_code("Admin"), None);
    }

    #[test]
    fn test_user_role_display_round_trip() {
        for role in UserRole::ALL {
            assert_eq!(UserRole::from_code(&role.to_string()), Some(role));
        }
    }

    #[test]
    fn test_user_role_checks() {
        assert!(!UserRole::Student.is_committee_or_higher());
        assert!(UserRole::Committee.is_committee_or_higher());
        assert!(UserRole::Admin.is_committee_or_higher());
        assert!(!UserRole::Student.is_admin());
        assert!(!UserRole::Committee.is_admin());
        assert!(UserRole::Admin.is_admin());
    }

    #[test]
    fn test_user_role_serde() {
        assert_eq!(
            serde_json::to_string(&UserRole::Committee).unwrap(),
            "\"committee\""
        );
        assert_eq!(UserRole::default(), UserRole::Student);
    }
}
