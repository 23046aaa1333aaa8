//! Change Password Use Case
//!
//! Outstanding tokens stay valid after a password change.

use std::sync::Arc;

use platform::clock::Clock;
use platform::password::PasswordHasher;

use crate::domain::entity::user::UserPatch;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::user_id::UserId;
use crate::error::{AuthError, AuthResult};

/// Change password input
pub struct ChangePasswordInput {
    pub user_id: UserId,
    pub old_password: String,
    pub new_password: String,
}

/// Change password use case
pub struct ChangePasswordUseCase<R>
where
    R: AuthStore,
{
    repo: Arc<R>,
    hasher: Arc<PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl<R> ChangePasswordUseCase<R>
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

    pub async fn execute(&self, input: ChangePasswordInput) -> AuthResult<()> {
        let user = self
            .repo
            .find_user_by_id(input.user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        if !self.hasher.verify(&input.old_password, &user.password_hash) {
            return Err(AuthError::WrongPassword);
        }

        let hash = self.hasher.hash_plaintext(&input.new_password)?;
        self.repo
            .update_user(user.id, &UserPatch::password(hash), self.clock.now())
            .await?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }
}
