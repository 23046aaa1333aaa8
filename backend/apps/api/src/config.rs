//! Server Configuration

use std::env;

use anyhow::Context;
use axum::http::HeaderValue;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_FRONTEND_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Process-level settings; auth settings live in `auth::AuthConfig`
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Shared key-value store; in-process store when unset
    pub redis_url: Option<String>,
    /// PostgreSQL; in-memory repository when unset
    pub database_url: Option<String>,
    pub frontend_origins: Vec<HeaderValue>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match non_empty("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        let origins =
            non_empty("FRONTEND_ORIGINS").unwrap_or_else(|| DEFAULT_FRONTEND_ORIGINS.to_string());

        Ok(Self {
            port,
            redis_url: non_empty("REDIS_URL"),
            database_url: non_empty("DATABASE_URL"),
            frontend_origins: parse_origins(&origins),
        })
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect()
}
