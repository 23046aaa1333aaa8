//! Sign Up Use Case
//!
//! Creates a new student account.

use std::sync::Arc;

use platform::clock::Clock;
use platform::password::PasswordHasher;

use crate::application::email_code::redeem_email_code;
use crate::domain::entity::{
    email_code::EmailCodePurpose,
    user::{NewUser, User},
};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::{
    email::Email, user_name::UserName, user_role::UserRole, user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};

/// Maximum length of free-text profile fields
const PROFILE_FIELD_MAX_LENGTH: usize = 50;

/// Sign up input
pub struct SignUpInput {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub real_name: String,
    pub major: String,
    pub class: String,
    /// Register-purpose email code; marks the email as verified
    pub code: Option<String>,
}

/// Sign up use case
pub struct SignUpUseCase<R>
where
    R: AuthStore,
{
    repo: Arc<R>,
    hasher: Arc<PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl<R> SignUpUseCase<R>
where
    R: AuthStore,
{
    pub fn new(repo: Arc<R>, hasher: Arc<PasswordHasher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            hasher,
            clock,
        }
    }

    pub async fn execute(&self, input: SignUpInput) -> AuthResult<User> {
        let user_name = UserName::new(&input.user_name)?;
        let email = Email::new(&input.email)?;
        let real_name = profile_field("real_name", &input.real_name)?;
        let major = profile_field("major", &input.major)?;
        let class = profile_field("class", &input.class)?;

        // Validate and hash before touching the store
        let password_hash = self.hasher.hash_plaintext(&input.password)?;

        if self.repo.user_name_exists(&user_name).await? || self.repo.email_exists(&email).await? {
            return Err(AuthError::UserExists);
        }

        let email_verified = match input.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                redeem_email_code(
                    &*self.repo,
                    &*self.clock,
                    &email,
                    code,
                    EmailCodePurpose::Register,
                )
                .await?;
                true
            }
            _ => false,
        };

        let user = self
            .repo
            .create_user(NewUser {
                user_name,
                email,
                real_name,
                major,
                class,
                role: UserRole::Student,
                status: UserStatus::Active,
                email_verified,
                password_hash,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!(
            user_id = %user.id,
            user_name = %user.user_name,
            email_verified,
            "User signed up"
        );

        Ok(user)
    }
}

fn profile_field(name: &str, value: &str) -> AuthResult<String> {
    let value = value.trim();
    if value.chars().count() > PROFILE_FIELD_MAX_LENGTH {
        return Err(AuthError::Validation(format!(
            "{name} must be at most {PROFILE_FIELD_MAX_LENGTH} characters"
        )));
    }
    Ok(value.to_string())
}
