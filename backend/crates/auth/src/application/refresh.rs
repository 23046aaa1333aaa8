//! Refresh Token Use Case
//!
//! Exchanges a refresh token for a new access/refresh pair carrying the
//! user's current role.

use std::sync::Arc;

use platform::kv::KeyValueStore;

use crate::application::config::RefreshRotation;
use crate::application::revocation::RevocationStore;
use crate::application::sign_in::{LoginOutput, ensure_can_login};
use crate::application::token::TokenCodec;
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};

/// Refresh token use case
pub struct RefreshTokenUseCase<R, S>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    repo: Arc<R>,
    codec: Arc<TokenCodec>,
    revocation: RevocationStore<S>,
    rotation: RefreshRotation,
}

impl<R, S> RefreshTokenUseCase<R, S>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        codec: Arc<TokenCodec>,
        revocation: RevocationStore<S>,
        rotation: RefreshRotation,
    ) -> Self {
        Self {
            repo,
            codec,
            revocation,
            rotation,
        }
    }

    pub async fn execute(&self, refresh_token: &str) -> AuthResult<LoginOutput> {
        let claims = self.codec.validate_refresh(refresh_token)?;

        if self.revocation.is_revoked(refresh_token).await? {
            return Err(AuthError::TokenRevoked);
        }

        let user = self
            .repo
            .find_user_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        ensure_can_login(&user)?;

        if self.rotation == RefreshRotation::RevokeOnUse {
            let remaining = self.codec.remaining_ttl(&claims);
            // Losing the race means another request already rotated it
            if !self.revocation.revoke(refresh_token, remaining).await? {
                return Err(AuthError::TokenRevoked);
            }
        }

        let tokens = self.codec.issue_pair(user.id, user.role)?;

        tracing::info!(user_id = %user.id, "Tokens refreshed");

        Ok(LoginOutput {
            access_token: tokens.access_token,
            refresh_token: Some(tokens.refresh_token),
            expires_in: tokens.expires_in,
            user,
        })
    }
}
