//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use platform::clock::Clock;
use platform::kv::KeyValueStore;
use platform::password::PasswordHasher;
use tokio::task::JoinHandle;

use crate::application::config::AuthConfig;
use crate::application::login_limiter::LimitDecision;
use crate::application::{
    AuditQueue, ChangePasswordInput, ChangePasswordUseCase, ClientContext, CurrentUserUseCase,
    EmailCodeSender, EmailSignInInput, EmailSignInUseCase, LoginLimiter, LoginOutput,
    RefreshTokenUseCase, RevocationStore, SendEmailCodeInput, SendEmailCodeUseCase, SignInInput,
    SignInUseCase, SignOutUseCase, SignUpInput, SignUpUseCase, TokenCodec,
};
use crate::domain::entity::email_code::EmailCodePurpose;
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    ChangePasswordRequest, EmailCodeRequest, LoginRequest, LoginResponse, RefreshRequest,
    RegisterRequest, UserInfo,
};
use crate::presentation::middleware::{AccessGate, AuthenticatedUser, ClientIp, bearer_token};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared state for auth handlers
///
/// Every collaborator is built once at startup and injected here; use cases
/// are assembled per request from these handles.
pub struct AuthAppState<R, S> {
    pub repo: Arc<R>,
    pub kv: Arc<S>,
    pub codec: Arc<TokenCodec>,
    pub revocation: RevocationStore<S>,
    pub limiter: LoginLimiter<S>,
    pub hasher: Arc<PasswordHasher>,
    pub audit: AuditQueue,
    pub email_sender: Arc<dyn EmailCodeSender>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<AuthConfig>,
}

impl<R, S> Clone for AuthAppState<R, S> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            kv: self.kv.clone(),
            codec: self.codec.clone(),
            revocation: self.revocation.clone(),
            limiter: self.limiter.clone(),
            hasher: self.hasher.clone(),
            audit: self.audit.clone(),
            email_sender: self.email_sender.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R, S> AuthAppState<R, S>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    /// Wire up the auth services and start the login audit worker.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        repo: R,
        kv: S,
        config: AuthConfig,
        clock: Arc<dyn Clock>,
        email_sender: Arc<dyn EmailCodeSender>,
    ) -> AuthResult<(Self, JoinHandle<()>)> {
        let repo = Arc::new(repo);
        let kv = Arc::new(kv);
        let hasher = PasswordHasher::new(config.hash_cost)
            .map_err(|e| AuthError::Internal(format!("password hasher: {e}")))?;
        let codec = Arc::new(TokenCodec::new(&config, clock.clone()));
        let revocation = RevocationStore::new(kv.clone(), config.store_timeout);
        let limiter = LoginLimiter::new(kv.clone(), &config, clock.clone());
        let (audit, worker) = AuditQueue::spawn(repo.clone(), config.audit_queue_capacity);

        let state = Self {
            repo,
            kv,
            codec,
            revocation,
            limiter,
            hasher: Arc::new(hasher),
            audit,
            email_sender,
            clock,
            config: Arc::new(config),
        };

        Ok((state, worker))
    }

    /// Access gate sharing this state's codec and revocation store
    pub fn access_gate(&self) -> AccessGate<S> {
        AccessGate::new(self.codec.clone(), self.revocation.clone())
    }
}

fn client_context(ip: String, headers: &HeaderMap) -> ClientContext {
    ClientContext {
        ip,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

// ============================================================================
// Register
// ============================================================================

/// POST /api/auth/register
pub async fn register<R, S>(
    State(state): State<AuthAppState<R, S>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<Json<UserInfo>>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    let use_case =
        SignUpUseCase::new(state.repo.clone(), state.hasher.clone(), state.clock.clone());

    let input = SignUpInput {
        user_name: req.username,
        email: req.email,
        password: req.password,
        real_name: req.real_name,
        major: req.major,
        class: req.class,
        code: req.code,
    };

    let user = use_case.execute(input).await?;

    Ok(Json(UserInfo::from(&user)))
}

// ============================================================================
// Email Code
// ============================================================================

/// POST /api/auth/email-code
pub async fn email_code<R, S>(
    State(state): State<AuthAppState<R, S>>,
    Json(req): Json<EmailCodeRequest>,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    let purpose = EmailCodePurpose::from_code(req.purpose.trim()).ok_or_else(|| {
        AuthError::Validation("purpose must be 'register' or 'login'".to_string())
    })?;

    let use_case = SendEmailCodeUseCase::new(
        state.repo.clone(),
        state.email_sender.clone(),
        state.clock.clone(),
        state.config.clone(),
    );

    use_case
        .execute(SendEmailCodeInput {
            email: req.email,
            purpose,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Login
// ============================================================================

/// POST /api/auth/login
///
/// Counts the attempt against the login limiter before touching
/// credentials. Limiter headers are attached to every response once the
/// address window has been counted.
pub async fn login<R, S>(
    State(state): State<AuthAppState<R, S>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Response
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    let decision = state.limiter.check(&ip, req.identifier()).await;

    let mut response = match decision.blocked {
        Some(blocked) => {
            let mut response = AuthError::TooManyAttempts {
                retry_after_minutes: blocked.retry_after_minutes(),
            }
            .into_response();
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(blocked.retry_after.as_secs().max(1)),
            );
            response
        }
        None => match authenticate(&state, client_context(ip, &headers), req).await {
            Ok(output) => Json(LoginResponse::from(output)).into_response(),
            Err(e) => e.into_response(),
        },
    };

    apply_limit_headers(response.headers_mut(), &decision);
    response
}

async fn authenticate<R, S>(
    state: &AuthAppState<R, S>,
    client: ClientContext,
    req: LoginRequest,
) -> AuthResult<LoginOutput>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    if let Some(code) = req.email_code() {
        let email = req
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::Validation("email is required".to_string()))?;

        let use_case = EmailSignInUseCase::new(
            state.repo.clone(),
            state.codec.clone(),
            state.hasher.clone(),
            state.audit.clone(),
            state.clock.clone(),
        );

        return use_case
            .execute(EmailSignInInput {
                email: email.to_string(),
                code: code.to_string(),
                password: req.password,
                client,
            })
            .await;
    }

    let (identifier, password) = match (req.username, req.password) {
        (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => (u, p),
        _ => {
            return Err(AuthError::Validation(
                "username and password are required".to_string(),
            ));
        }
    };

    let use_case = SignInUseCase::new(
        state.repo.clone(),
        state.codec.clone(),
        state.hasher.clone(),
        state.audit.clone(),
        state.clock.clone(),
    );

    use_case
        .execute(SignInInput {
            identifier,
            password,
            client,
        })
        .await
}

fn apply_limit_headers(headers: &mut HeaderMap, decision: &LimitDecision) {
    let Some(window) = &decision.address else {
        return;
    };
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(window.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(window.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(window.reset_at));
}

// ============================================================================
// Refresh
// ============================================================================

/// POST /api/auth/refresh
pub async fn refresh<R, S>(
    State(state): State<AuthAppState<R, S>>,
    Json(req): Json<RefreshRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    let use_case = RefreshTokenUseCase::new(
        state.repo.clone(),
        state.codec.clone(),
        state.revocation.clone(),
        state.config.refresh_rotation,
    );

    let output = use_case.execute(req.refresh_token.trim()).await?;

    Ok(Json(LoginResponse::from(output)))
}

// ============================================================================
// Logout
// ============================================================================

/// POST /api/auth/logout
pub async fn logout<R, S>(
    State(state): State<AuthAppState<R, S>>,
    user: AuthenticatedUser,
    headers: HeaderMap,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    let token = bearer_token(&headers)?;

    let use_case = SignOutUseCase::new(state.codec.clone(), state.revocation.clone());
    use_case.execute(token).await?;

    tracing::info!(user_id = %user.user_id, "User logged out");

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Change Password
// ============================================================================

/// POST /api/auth/password
pub async fn change_password<R, S>(
    State(state): State<AuthAppState<R, S>>,
    user: AuthenticatedUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    let use_case =
        ChangePasswordUseCase::new(state.repo.clone(), state.hasher.clone(), state.clock.clone());

    use_case
        .execute(ChangePasswordInput {
            user_id: user.user_id,
            old_password: req.old_password,
            new_password: req.new_password,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Current User
// ============================================================================

/// GET /api/auth/me
pub async fn me<R, S>(
    State(state): State<AuthAppState<R, S>>,
    user: AuthenticatedUser,
) -> AuthResult<Json<UserInfo>>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    let use_case = CurrentUserUseCase::new(state.repo.clone());
    let user = use_case.execute(user.user_id).await?;

    Ok(Json(UserInfo::from(&user)))
}
