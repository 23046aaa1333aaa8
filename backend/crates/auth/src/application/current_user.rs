//! Current User Use Case

use std::sync::Arc;

use crate::domain::entity::user::User;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::user_id::UserId;
use crate::error::{AuthError, AuthResult};

/// Loads the profile behind an authenticated identity
pub struct CurrentUserUseCase<R>
where
    R: AuthStore,
{
    repo: Arc<R>,
}

impl<R> CurrentUserUseCase<R>
where
    R: AuthStore,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, user_id: UserId) -> AuthResult<User> {
        self.repo
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)
    }
}
