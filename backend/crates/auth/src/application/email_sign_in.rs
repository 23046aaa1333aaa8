//! Email Code Sign In Use Case
//!
//! Logs a user in with a one-time code sent to their email. The password is
//! optional here; when supplied it must match. Only an access token is
//! issued.

use std::sync::Arc;

use platform::clock::Clock;
use platform::password::PasswordHasher;

use crate::application::audit::{AuditQueue, ClientContext};
use crate::application::email_code::redeem_email_code;
use crate::application::sign_in::{LoginOutput, ensure_can_login};
use crate::application::token::TokenCodec;
use crate::domain::entity::email_code::EmailCodePurpose;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::{email::Email, user_id::UserId};
use crate::error::{AuthError, AuthResult};

/// Email code sign in input
pub struct EmailSignInInput {
    pub email: String,
    pub code: String,
    /// Blank means code-only login
    pub password: Option<String>,
    pub client: ClientContext,
}

/// Email code sign in use case
pub struct EmailSignInUseCase<R>
where
    R: AuthStore,
{
    repo: Arc<R>,
    codec: Arc<TokenCodec>,
    hasher: Arc<PasswordHasher>,
    audit: AuditQueue,
    clock: Arc<dyn Clock>,
}

impl<R> EmailSignInUseCase<R>
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

    pub async fn execute(&self, input: EmailSignInInput) -> AuthResult<LoginOutput> {
        let identifier = input.email.trim();
        let result = self
            .authenticate(identifier, &input.code, input.password.as_deref())
            .await;

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
            "User signed in with email code"
        );

        Ok(output)
    }

    async fn authenticate(
        &self,
        email: &str,
        code: &str,
        password: Option<&str>,
    ) -> Result<LoginOutput, (AuthError, Option<UserId>)> {
        let email = Email::new(email).map_err(|e| (AuthError::from(e), None))?;

        redeem_email_code(
            &*self.repo,
            &*self.clock,
            &email,
            code,
            EmailCodePurpose::Login,
        )
        .await
        .map_err(|e| (e, None))?;

        let user = self
            .repo
            .find_user_by_email(&email)
            .await
            .map_err(|e| (e, None))?
            .ok_or((AuthError::InvalidCredentials, None))?;

        if let Some(password) = password.filter(|p| !p.is_empty()) {
            if !self.hasher.verify(password, &user.password_hash) {
                return Err((AuthError::InvalidCredentials, Some(user.id)));
            }
        }

        ensure_can_login(&user).map_err(|e| (e, Some(user.id)))?;

        let access_token = self
            .codec
            .issue_access(user.id, user.role)
            .map_err(|e| (AuthError::Internal(e.to_string()), Some(user.id)))?;

        Ok(LoginOutput {
            access_token,
            refresh_token: None,
            expires_in: self.codec.access_ttl_secs(),
            user,
        })
    }
}
