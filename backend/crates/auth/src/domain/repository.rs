//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the
//! infrastructure layer. Method names are unique across the traits so a
//! single store can implement all of them without call-site ambiguity.

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    email_code::{EmailCode, EmailCodePurpose, NewEmailCode},
    login_record::LoginRecord,
    user::{NewUser, User, UserPatch},
};
use crate::domain::value_object::{email::Email, user_id::UserId, user_name::UserName};
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Create a new user. Fails with `UserExists` if the user name or email
    /// is already taken.
    async fn create_user(&self, user: NewUser) -> AuthResult<User>;

    /// Find user by ID
    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;

    /// Find user by user name
    async fn find_user_by_name(&self, user_name: &UserName) -> AuthResult<Option<User>>;

    /// Find user by email
    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// Check if user name exists
    async fn user_name_exists(&self, user_name: &UserName) -> AuthResult<bool>;

    /// Check if email exists
    async fn email_exists(&self, email: &Email) -> AuthResult<bool>;

    /// Apply a patch. Missing users are ignored.
    async fn update_user(
        &self,
        user_id: UserId,
        patch: &UserPatch,
        at: DateTime<Utc>,
    ) -> AuthResult<()>;
}

/// Email one-time code repository trait
#[trait_variant::make(EmailCodeRepository: Send)]
pub trait LocalEmailCodeRepository {
    /// Delete earlier codes for the email and store the new one
    async fn replace_email_code(&self, code: NewEmailCode) -> AuthResult<EmailCode>;

    /// Most recently issued code for the email and purpose
    async fn latest_email_code(
        &self,
        email: &Email,
        purpose: EmailCodePurpose,
    ) -> AuthResult<Option<EmailCode>>;

    /// Mark a code used if it is still unused.
    ///
    /// Returns `false` when another request consumed it first.
    async fn consume_email_code(&self, code_id: i64, at: DateTime<Utc>) -> AuthResult<bool>;
}

/// Login audit repository trait
#[trait_variant::make(LoginRecordRepository: Send)]
pub trait LocalLoginRecordRepository {
    async fn insert_login_record(&self, record: &LoginRecord) -> AuthResult<()>;
}

/// Everything the auth use cases need from persistence
pub trait AuthStore:
    UserRepository + EmailCodeRepository + LoginRecordRepository + Clone + Send + Sync + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository + EmailCodeRepository + LoginRecordRepository + Clone + Send + Sync + 'static
{
}
