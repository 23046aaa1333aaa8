//! Email Value Object
//!
//! Addresses are stored trimmed and lowercased, so `Alice@Campus.edu` and
//! `alice@campus.edu` name the same account. Only the shape is checked here;
//! ownership is proven with a one-time email code.

use std::fmt;
use std::str::FromStr;

use kernel::error::app_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// RFC 5321 path limit
const MAX_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn new(email: impl AsRef<str>) -> AppResult<Self> {
        let email = email.as_ref().trim().to_lowercase();

        if email.is_empty() {
            return Err(AppError::bad_request("email is required"));
        }
        if email.len() > MAX_LEN {
            return Err(AppError::bad_request(format!(
                "email must be at most {MAX_LEN} characters"
            )));
        }

        let (local, domain) = email
            .split_once('@')
            .ok_or_else(|| AppError::bad_request("email must contain '@'"))?;

        if local.is_empty()
            || local.len() > MAX_LOCAL_LEN
            || local.chars().any(char::is_whitespace)
            || !is_domain(domain)
        {
            return Err(AppError::bad_request("invalid email address"));
        }

        Ok(Self(email))
    }

    /// Wrap a value read back from storage
    pub fn from_db(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Dot-separated labels of letters, digits and inner hyphens, at least two
/// labels long
fn is_domain(domain: &str) -> bool {
    let mut labels = 0;
    for label in domain.split('.') {
        let valid = !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return false;
        }
        labels += 1;
    }
    labels >= 2
}

impl FromStr for Email {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campus_addresses_accepted() {
        for email in [
            "student@upc.edu.cn",
            "s2021001@s.upc.edu.cn",
            "first.last+notes@campus.edu",
            "club-admin@mail-host.org",
        ] {
            assert!(Email::new(email).is_ok(), "{email} should be accepted");
        }
    }

    #[test]
    fn test_malformed_addresses_rejected() {
        for email in [
            "",
            "   ",
            "upc.edu.cn",
            "student@",
            "@upc.edu.cn",
            "a@b@upc.edu.cn",
            "student@localhost",
            "student@upc..edu",
            "student@-upc.edu",
            "student@upc_edu.cn",
            "stu dent@upc.edu.cn",
        ] {
            assert!(Email::new(email).is_err(), "{email:?} should be rejected");
        }
    }

    #[test]
    fn test_length_limits() {
        let local = "a".repeat(MAX_LOCAL_LEN + 1);
        assert!(Email::new(format!("{local}@upc.edu.cn")).is_err());

        let domain = format!("{}.cn", "d".repeat(MAX_LEN));
        assert!(Email::new(format!("a@{domain}")).is_err());
    }

    #[test]
    fn test_normalized_to_lowercase_and_trimmed() {
        let email: Email = "  Student@UPC.edu.cn ".parse().unwrap();
        assert_eq!(email.as_str(), "student@upc.edu.cn");
        assert_eq!(email.to_string(), "student@upc.edu.cn");
        assert_eq!(email, Email::new("student@upc.edu.cn").unwrap());
    }
}
