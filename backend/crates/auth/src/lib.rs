//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Token codec, revocation, login limiter, use cases
//! - `infra/` - PostgreSQL and in-memory repositories
//! - `presentation/` - HTTP handlers, DTOs, access/role gates, router
//!
//! ## Features
//! - Registration and login with user name (or email) + password
//! - Email one-time code login and verified registration
//! - Stateless JWT access/refresh tokens with a revocation list
//! - Per-address and per-identifier login attempt limits
//! - Role-based access (Student, Committee, Admin)
//!
//! ## Security Model
//! - Passwords hashed with Argon2id
//! - Revocation lookups fail closed; login limiting fails open
//! - Login attempts are audited through a bounded queue

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::{AuthConfig, ConfigError, RefreshRotation};
pub use domain::repository::AuthStore;
pub use application::email_code::{EmailCodeSender, LogEmailCodeSender};
pub use error::{AuthError, AuthResult};
pub use infra::{memory::InMemoryAuthRepository, postgres::PgAuthRepository};
pub use presentation::handlers::AuthAppState;
pub use presentation::middleware::{AuthenticatedUser, RoleGate};
pub use presentation::router::{auth_router, restrict};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
