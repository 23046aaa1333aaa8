//! Login Audit Record

use chrono::{DateTime, Utc};

use crate::domain::value_object::user_id::UserId;

/// One login attempt, successful or not
#[derive(Debug, Clone)]
pub struct LoginRecord {
    /// Resolved user, if the identifier matched one
    pub user_id: Option<UserId>,
    /// Submitted user name or email
    pub identifier: String,
    pub ip: String,
    pub user_agent: Option<String>,
    pub success: bool,
    /// Error code of the failure, if any
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
