//! Sign Out Use Case
//!
//! Revokes the presented access token for the rest of its lifetime.

use std::sync::Arc;

use platform::kv::KeyValueStore;

use crate::application::revocation::RevocationStore;
use crate::application::token::TokenCodec;
use crate::error::AuthResult;

/// Sign out use case
pub struct SignOutUseCase<S>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    codec: Arc<TokenCodec>,
    revocation: RevocationStore<S>,
}

impl<S> SignOutUseCase<S>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    pub fn new(codec: Arc<TokenCodec>, revocation: RevocationStore<S>) -> Self {
        Self { codec, revocation }
    }

    pub async fn execute(&self, access_token: &str) -> AuthResult<()> {
        let claims = self.codec.validate_access(access_token)?;
        let remaining = self.codec.remaining_ttl(&claims);

        let newly_revoked = self.revocation.revoke(access_token, remaining).await?;

        tracing::info!(user_id = %claims.user_id, newly_revoked, "User signed out");
        Ok(())
    }
}
