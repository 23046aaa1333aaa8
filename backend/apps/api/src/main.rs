//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use auth::{
    AuthAppState, AuthConfig, AuthStore, InMemoryAuthRepository, LogEmailCodeSender,
    PgAuthRepository, auth_router,
};
use axum::{
    Router,
    http::{Method, header},
    response::{IntoResponse, Response},
};
use kernel::error::app_error::AppError;
use platform::clock::{Clock, SystemClock};
use platform::kv::{KeyValueStore, MemoryStore, RedisStore};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

const INTERNAL_ERROR_CODE: u32 = 10005;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,platform=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env()?;
    let auth_config = AuthConfig::from_env(cfg!(debug_assertions))?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cors = CorsLayer::new()
        .allow_origin(server.frontend_origins.clone())
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    let kv = match &server.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            tracing::info!("Connected to Redis");
            Some(store)
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process key-value store");
            None
        }
    };

    let repo = match &server.database_url {
        Some(url) => Some(connect_database(url, clock.as_ref()).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory user store");
            None
        }
    };

    let auth = match (repo, kv) {
        (Some(repo), Some(kv)) => build_auth(repo, kv, auth_config, clock)?,
        (Some(repo), None) => {
            build_auth(repo, MemoryStore::new(clock.clone()), auth_config, clock)?
        }
        (None, Some(kv)) => build_auth(InMemoryAuthRepository::new(), kv, auth_config, clock)?,
        (None, None) => build_auth(
            InMemoryAuthRepository::new(),
            MemoryStore::new(clock.clone()),
            auth_config,
            clock,
        )?,
    };

    // Build router
    let app = Router::new()
        .nest("/api/auth", auth)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], server.port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn connect_database(url: &str, clock: &dyn Clock) -> anyhow::Result<PgAuthRepository> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let repo = PgAuthRepository::new(pool);

    // Errors here should not prevent server startup
    if let Err(e) = repo.cleanup_expired_codes(clock.now()).await {
        tracing::warn!(
            error = %e,
            "Email code cleanup failed, continuing anyway"
        );
    }

    Ok(repo)
}

fn build_auth<R, S>(
    repo: R,
    kv: S,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Router>
where
    R: AuthStore,
    S: KeyValueStore + Send + Sync + 'static,
{
    // The audit worker lives as long as the runtime
    let (state, _audit_worker) =
        AuthAppState::new(repo, kv, config, clock, Arc::new(LogEmailCodeSender))?;
    Ok(auth_router(state))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "Handler panicked");

    AppError::internal("Internal server error")
        .with_code(INTERNAL_ERROR_CODE)
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_handler_renders_problem_json() {
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(handle_panic));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], 10005);
        assert_eq!(body["detail"], "Internal server error");
    }

    #[tokio::test]
    async fn test_default_stack_serves_auth_routes() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let auth = build_auth(
            InMemoryAuthRepository::new(),
            MemoryStore::new(clock.clone()),
            AuthConfig::development(),
            clock,
        )
        .unwrap();
        let app = Router::new().nest("/api/auth", auth);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
