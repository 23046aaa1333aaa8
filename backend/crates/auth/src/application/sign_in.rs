//! Sign In Use Case
//!
//! Authenticates a user by user name (or email) and password and issues an
//! access/refresh token pair.

use std::sync::Arc;

use platform::clock::Clock;
use platform::password::PasswordHasher;

use crate::application::audit::{AuditQueue, ClientContext};
use crate::application::token::TokenCodec;
use crate::domain::entity::user::{User, UserPatch};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::{
    email::Email, user_id::UserId, user_name::UserName, user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    /// User name or email
    pub identifier: String,
    pub password: String,
    pub client: ClientContext,
}

/// Tokens and profile returned by every login flavor
#[derive(Debug, Clone)]
pub struct LoginOutput {
    pub access_token: String,
    /// Absent for email-code logins
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user: User,
}

/// Reject accounts that may not log in
pub(crate) fn ensure_can_login(user: &User) -> AuthResult<()> {
    match user.status {
        UserStatus::Active => Ok(()),
        UserStatus::Banned => Err(AuthError::UserDisabled),
        UserStatus::Inactive => Err(AuthError::UserInactive),
    }
}

/// Sign in use case
pub struct SignInUseCase<R>
where
    R: AuthStore,
{
    repo: Arc<R>,
    codec: Arc<TokenCodec>,
    hasher: Arc<PasswordHasher>,
    audit: AuditQueue,
    clock: Arc<dyn Clock>,
}

impl<R> SignInUseCase<R>
where
    R: AuthStore,
{
    pub fn new(
        repo: Arc<R>,
        codec: Arc<TokenCodec>,
        hasher: Arc<PasswordHasher>,
        audit: AuditQueue,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            codec,
            hasher,
            audit,
            clock,
        }
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<LoginOutput> {
        let identifier = input.identifier.trim();
        let result = self.authenticate(identifier, &input.password).await;

        let now = self.clock.now();
        let record = match &result {
            Ok(output) => input
                .client
                .login_record(identifier, Some(output.user.id), None, now),
            Err((error, user_id)) => input
                .client
                .login_record(identifier, *user_id, Some(error), now),
        };
        self.audit.record(record);

        let output = result.map_err(|(error, _)| error)?;

        tracing::info!(
            user_id = %output.user.id,
            ip = %input.client.ip,
            "User signed in"
        );

        Ok(output)
    }

    async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<LoginOutput, (AuthError, Option<UserId>)> {
        let user = self
            .find_user(identifier)
            .await
            .map_err(|e| (e, None))?
            .ok_or((AuthError::InvalidCredentials, None))?;

        ensure_can_login(&user).map_err(|e| (e, Some(user.id)))?;

        if !self.hasher.verify(password, &user.password_hash) {
            return Err((AuthError::InvalidCredentials, Some(user.id)));
        }

        let tokens = self
            .codec
            .issue_pair(user.id, user.role)
            .map_err(|e| (AuthError::Internal(e.to_string()), Some(user.id)))?;

        self.rehash_if_needed(&user, password).await;

        Ok(LoginOutput {
            access_token: tokens.access_token,
            refresh_token: Some(tokens.refresh_token),
            expires_in: tokens.expires_in,
            user,
        })
    }

    /// Identifiers containing `@` are emails, everything else a user name.
    /// Identifiers that fail validation cannot match any account.
    async fn find_user(&self, identifier: &str) -> AuthResult<Option<User>> {
        if identifier.contains('@') {
            match Email::new(identifier) {
                Ok(email) => self.repo.find_user_by_email(&email).await,
                Err(_) => Ok(None),
            }
        } else {
            match UserName::new(identifier) {
                Ok(user_name) => self.repo.find_user_by_name(&user_name).await,
                Err(_) => Ok(None),
            }
        }
    }

    /// Upgrade the stored hash to the current cost parameters. Failure only
    /// costs the upgrade, never the login.
    async fn rehash_if_needed(&self, user: &User, password: &str) {
        if !self.hasher.needs_rehash(&user.password_hash) {
            return;
        }

        let hash = match self.hasher.hash_plaintext(password) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user.id, "Password rehash failed");
                return;
            }
        };

        let patch = UserPatch::password(hash);
        match self.repo.update_user(user.id, &patch, self.clock.now()).await {
            Ok(()) => tracing::info!(user_id = %user.id, "Password hash upgraded"),
            Err(e) => tracing::warn!(error = %e, user_id = %user.id, "Password rehash not saved"),
        }
    }
}
