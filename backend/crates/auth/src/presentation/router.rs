//! Auth Router

use axum::{
    Extension, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use platform::kv::KeyValueStore;
use platform::rate_limit::RateLimitConfig;

use crate::domain::repository::AuthStore;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{
    AccessGate, GeneralRateLimit, RoleGate, general_rate_limit, require_auth, require_roles,
};

const EMAIL_CODE_LIMIT_PREFIX: &str = "ratelimit:email-code";

/// Create the Auth router, to be nested under `/api/auth`
pub fn auth_router<R, S>(state: AuthAppState<R, S>) -> Router
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    let email_code_limit = GeneralRateLimit::new(
        state.kv.clone(),
        EMAIL_CODE_LIMIT_PREFIX,
        RateLimitConfig {
            max_requests: state.config.email_code_limit,
            window: state.config.email_code_window,
        },
        state.config.store_timeout,
    );

    let public = Router::new()
        .route("/register", post(handlers::register::<R, S>))
        .route(
            "/email-code",
            post(handlers::email_code::<R, S>).route_layer(from_fn_with_state(
                email_code_limit,
                general_rate_limit::<S>,
            )),
        )
        .route("/login", post(handlers::login::<R, S>))
        .route("/refresh", post(handlers::refresh::<R, S>));

    let authenticated = Router::new()
        .route("/logout", post(handlers::logout::<R, S>))
        .route("/password", post(handlers::change_password::<R, S>))
        .route("/me", get(handlers::me::<R, S>))
        .route_layer(from_fn_with_state(state.access_gate(), require_auth::<S>));

    let trusted_proxies = state.config.trusted_proxies.clone();

    public
        .merge(authenticated)
        .layer(Extension(trusted_proxies))
        .with_state(state)
}

/// Guard every route of `router` with the access gate followed by `roles`
pub fn restrict<St, S>(router: Router<St>, gate: AccessGate<S>, roles: RoleGate) -> Router<St>
where
    St: Clone + Send + Sync + 'static,
    S: KeyValueStore + Send + Sync + 'static,
{
    router
        .route_layer(from_fn_with_state(roles, require_roles))
        .route_layer(from_fn_with_state(gate, require_auth::<S>))
}
