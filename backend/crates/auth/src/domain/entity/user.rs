//! User Entity
//!
//! Credential record plus the profile fields shown by `/me`. Users are never
//! physically deleted; all mutation goes through [`UserPatch`].

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;

use crate::domain::value_object::{
    email::Email, user_id::UserId, user_name::UserName, user_role::UserRole,
    user_status::UserStatus,
};

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    /// Unique login handle
    pub user_name: UserName,
    /// Unique email address
    pub email: Email,
    pub real_name: String,
    pub major: String,
    pub class: String,
    pub avatar: String,
    pub phone: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
    /// Argon2id PHC string
    pub password_hash: HashedPassword,
    /// Last successful login time
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check if user can login
    pub fn can_login(&self) -> bool {
        self.status.can_login()
    }

    /// Apply a patch in place, stamping `updated_at`
    pub fn apply(&mut self, patch: &UserPatch, at: DateTime<Utc>) {
        if let Some(hash) = &patch.password_hash {
            self.password_hash = hash.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(verified) = patch.email_verified {
            self.email_verified = verified;
        }
        if let Some(at) = patch.last_login_at {
            self.last_login_at = Some(at);
        }
        if let Some(avatar) = &patch.avatar {
            self.avatar = avatar.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        self.updated_at = at;
    }
}

/// Fields needed to create a user. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: UserName,
    pub email: Email,
    pub real_name: String,
    pub major: String,
    pub class: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
    pub password_hash: HashedPassword,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    /// Materialize with the id chosen by the store
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            user_name: self.user_name,
            email: self.email,
            real_name: self.real_name,
            major: self.major,
            class: self.class,
            avatar: String::new(),
            phone: String::new(),
            role: self.role,
            status: self.status,
            email_verified: self.email_verified,
            password_hash: self.password_hash,
            last_login_at: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Closed set of updatable user fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub password_hash: Option<HashedPassword>,
    pub status: Option<UserStatus>,
    pub role: Option<UserRole>,
    pub email_verified: Option<bool>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
}

impl UserPatch {
    pub fn password(hash: HashedPassword) -> Self {
        Self {
            password_hash: Some(hash),
            ..Self::default()
        }
    }

    pub fn last_login(at: DateTime<Utc>) -> Self {
        Self {
            last_login_at: Some(at),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none()
            && self.status.is_none()
            && self.role.is_none()
            && self.email_verified.is_none()
            && self.last_login_at.is_none()
            && self.avatar.is_none()
            && self.phone.is_none()
    }
}
