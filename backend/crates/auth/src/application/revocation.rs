//! Token Revocation Store
//!
//! Revoked tokens are kept under `auth:blacklist:<token>` until the token
//! would have expired anyway. Callers treat any store failure as "cannot
//! prove the token is live" and reject the request.

use std::sync::Arc;
use std::time::Duration;

use platform::kv::{KeyValueStore, KvError, with_deadline};
use thiserror::Error;

use crate::error::AuthError;

const KEY_PREFIX: &str = "auth:blacklist:";

#[derive(Debug, Error)]
#[error("revocation store unavailable: {0}")]
pub struct RevocationError(#[from] KvError);

impl From<RevocationError> for AuthError {
    fn from(err: RevocationError) -> Self {
        AuthError::Store(err.to_string())
    }
}

/// Blacklist of revoked raw tokens
pub struct RevocationStore<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> Clone for RevocationStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S> RevocationStore<S>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    fn key(token: &str) -> String {
        format!("{KEY_PREFIX}{token}")
    }

    /// Revoke `token` for `remaining`.
    ///
    /// Returns `true` if this call created the entry. Revoking an already
    /// revoked token, or one with no lifetime left, returns `false`.
    pub async fn revoke(
        &self,
        token: &str,
        remaining: Duration,
    ) -> Result<bool, RevocationError> {
        if remaining.is_zero() {
            return Ok(false);
        }
        let key = Self::key(token);
        let created =
            with_deadline(self.timeout, self.store.set_nx_ex(&key, "1", remaining)).await?;
        Ok(created)
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        let key = Self::key(token);
        Ok(with_deadline(self.timeout, self.store.exists(&key)).await?)
    }
}
