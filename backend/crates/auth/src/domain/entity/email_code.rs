//! Email One-Time Code Entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::value_object::email::Email;

/// Number of digits in a one-time code
pub const EMAIL_CODE_LENGTH: usize = 6;

/// What a code may be redeemed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailCodePurpose {
    Register,
    Login,
}

impl EmailCodePurpose {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "register" => Some(Self::Register),
            "login" => Some(Self::Login),
            _ => None,
        }
    }
}

impl fmt::Display for EmailCodePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Stored one-time code
#[derive(Debug, Clone)]
pub struct EmailCode {
    pub id: i64,
    pub email: Email,
    pub code: String,
    pub purpose: EmailCodePurpose,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EmailCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Code to be stored. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewEmailCode {
    pub email: Email,
    pub code: String,
    pub purpose: EmailCodePurpose,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewEmailCode {
    pub fn into_code(self, id: i64) -> EmailCode {
        EmailCode {
            id,
            email: self.email,
            code: self.code,
            purpose: self.purpose,
            expires_at: self.expires_at,
            used: false,
            used_at: None,
            created_at: self.created_at,
        }
    }
}
