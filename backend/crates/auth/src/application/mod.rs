//! Application Layer
//!
//! Use cases and application services.

pub mod audit;
pub mod change_password;
pub mod config;
pub mod current_user;
pub mod email_code;
pub mod email_sign_in;
pub mod login_limiter;
pub mod refresh;
pub mod revocation;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod token;

// Re-exports
pub use audit::{AuditQueue, ClientContext};
pub use change_password::{ChangePasswordInput, ChangePasswordUseCase};
pub use config::{AuthConfig, ConfigError, RefreshRotation};
pub use current_user::CurrentUserUseCase;
pub use email_code::{
    EmailCodeSender, LogEmailCodeSender, SendEmailCodeInput, SendEmailCodeUseCase,
};
pub use email_sign_in::{EmailSignInInput, EmailSignInUseCase};
pub use login_limiter::{LimitDecision, LoginLimiter};
pub use refresh::RefreshTokenUseCase;
pub use revocation::RevocationStore;
pub use sign_in::{LoginOutput, SignInInput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpUseCase};
pub use token::{Claims, TokenCodec, TokenError, TokenKind, TokenPair};
