//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::AuthAppState;
pub use middleware::{
    AccessGate, AuthenticatedUser, ClientIp, GeneralRateLimit, RoleGate, optional_auth,
    require_auth, require_roles,
};
pub use router::{auth_router, restrict};
