//! Auth Middleware
//!
//! Access gate (bearer token → [`AuthenticatedUser`]), role gate and the
//! per-address request limiter for non-login endpoints.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::{HeaderMap, header, request::Parts};
use axum::middleware::Next;
use axum::response::Response;
use platform::client::{TrustedProxies, client_ip_key};
use platform::kv::{KeyValueStore, with_deadline};
use platform::rate_limit::{RateLimitConfig, RateLimitStore};

use crate::application::revocation::RevocationStore;
use crate::application::token::TokenCodec;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

// ============================================================================
// Request identity
// ============================================================================

/// Identity attached to a request by [`require_auth`] / [`optional_auth`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: UserRole,
}

impl<St> FromRequestParts<St> for AuthenticatedUser
where
    St: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or(AuthError::Unauthenticated)
    }
}

impl<St> OptionalFromRequestParts<St> for AuthenticatedUser
where
    St: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &St,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().copied())
    }
}

/// Client address key.
///
/// The socket peer, unless the peer is one of the [`TrustedProxies`] found in
/// the request extensions, in which case the forwarding headers win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<St> FromRequestParts<St> for ClientIp
where
    St: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let direct = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        let trusted = parts
            .extensions
            .get::<TrustedProxies>()
            .cloned()
            .unwrap_or_default();
        Ok(Self(client_ip_key(&parts.headers, direct, &trusted)))
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedAuthHeader)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedAuthHeader),
    }
}

// ============================================================================
// Access gate
// ============================================================================

/// Middleware state for the access gate
pub struct AccessGate<S> {
    codec: Arc<TokenCodec>,
    revocation: RevocationStore<S>,
}

impl<S> Clone for AccessGate<S> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            revocation: self.revocation.clone(),
        }
    }
}

impl<S> AccessGate<S>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    pub fn new(codec: Arc<TokenCodec>, revocation: RevocationStore<S>) -> Self {
        Self { codec, revocation }
    }

    /// Resolve the bearer token on `headers` to an identity.
    ///
    /// A revocation lookup failure is an error, never a pass.
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<AuthenticatedUser> {
        let token = bearer_token(headers)?;
        let claims = self.codec.validate_access(token)?;
        let role = UserRole::from_code(&claims.role).ok_or(AuthError::TokenInvalid)?;

        if self.revocation.is_revoked(token).await? {
            return Err(AuthError::TokenRevoked);
        }

        Ok(AuthenticatedUser {
            user_id: claims.user_id,
            role,
        })
    }
}

/// Middleware that requires a valid, unrevoked access token
pub async fn require_auth<S>(
    State(gate): State<AccessGate<S>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    let user = gate.authenticate(req.headers()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Middleware that attaches an identity when one is present and valid,
/// and lets the request through either way
pub async fn optional_auth<S>(
    State(gate): State<AccessGate<S>>,
    mut req: Request,
    next: Next,
) -> Response
where
    S: KeyValueStore + Send + Sync + 'static,
{
    match gate.authenticate(req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
        }
        Err(e) => {
            tracing::debug!(error = %e, "Proceeding without identity");
        }
    }
    next.run(req).await
}

// ============================================================================
// Role gate
// ============================================================================

/// Set of roles admitted by [`require_roles`]
#[derive(Debug, Clone, Copy)]
pub struct RoleGate {
    roles: &'static [UserRole],
}

impl RoleGate {
    pub const ADMIN: Self = Self::new(&[UserRole::Admin]);
    pub const COMMITTEE: Self = Self::new(&[UserRole::Committee, UserRole::Admin]);
    pub const MEMBER: Self = Self::new(&UserRole::ALL);

    pub const fn new(roles: &'static [UserRole]) -> Self {
        Self { roles }
    }

    pub fn allows(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }
}

/// Middleware that admits only the gate's roles. Runs after [`require_auth`].
pub async fn require_roles(
    State(gate): State<RoleGate>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .copied()
        .ok_or(AuthError::Unauthenticated)?;

    if !gate.allows(user.role) {
        tracing::warn!(user_id = %user.user_id, role = %user.role, "Role not permitted");
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(req).await)
}

// ============================================================================
// General rate limit
// ============================================================================

/// Per-address fixed-window limit for a group of routes
pub struct GeneralRateLimit<S> {
    store: Arc<S>,
    prefix: &'static str,
    config: RateLimitConfig,
    timeout: Duration,
}

impl<S> Clone for GeneralRateLimit<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            prefix: self.prefix,
            config: self.config,
            timeout: self.timeout,
        }
    }
}

impl<S> GeneralRateLimit<S> {
    pub fn new(
        store: Arc<S>,
        prefix: &'static str,
        config: RateLimitConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            prefix,
            config,
            timeout,
        }
    }
}

/// Middleware enforcing [`GeneralRateLimit`]. Store failures let the
/// request through.
pub async fn general_rate_limit<S>(
    State(limit): State<GeneralRateLimit<S>>,
    ClientIp(ip): ClientIp,
    req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    S: KeyValueStore + Send + Sync + 'static,
{
    let key = format!("{}:{}", limit.prefix, ip);
    let checked = with_deadline(
        limit.timeout,
        limit.store.check_and_increment(&key, &limit.config),
    )
    .await;

    match checked {
        Ok(result) if !result.allowed => {
            tracing::warn!(
                ip = %ip,
                prefix = limit.prefix,
                count = result.count,
                "Request rate limit exceeded"
            );
            return Err(AuthError::RateLimited);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(
                error = %e,
                prefix = limit.prefix,
                "Rate limit store unavailable, allowing request"
            );
        }
    }

    Ok(next.run(req).await)
}
